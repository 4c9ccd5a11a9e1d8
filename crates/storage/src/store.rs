// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-operation state documents.
//!
//! One JSON file per operation, written by materializing the whole
//! document to a sibling temp file and renaming over the target, so
//! readers never observe a torn write. Each operation has exactly one
//! owning process at a time (enforced by the phase guards and daemon
//! singleton locks), so no cross-process lock is taken here.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use v0_core::{BuildPaths, Clock, OpEvent, Operation, SCHEMA_VERSION};

/// Rotate the event log once it exceeds this size.
const MAX_EVENT_LOG_BYTES: u64 = 100 * 1024;

/// Generations kept when rotating: `events.log`, `.1`, `.2`.
const EVENT_LOG_GENERATIONS: u32 = 3;

/// Errors from state document operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The operation has no state document.
    #[error("operation not found: {0}")]
    NotFound(String),
    #[error("operation already exists: {0}")]
    AlreadyExists(String),
    /// Malformed JSON: refuse to mutate, require operator intervention.
    #[error("corrupt state document {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("field {field} missing from {operation}")]
    MissingField { operation: String, field: String },
}

/// Store of per-operation state documents under `operations/`.
#[derive(Debug, Clone)]
pub struct OperationStore<C> {
    paths: BuildPaths,
    clock: C,
}

impl<C: Clock> OperationStore<C> {
    pub fn new(paths: BuildPaths, clock: C) -> Self {
        Self { paths, clock }
    }

    pub fn paths(&self) -> &BuildPaths {
        &self.paths
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn exists(&self, name: &str) -> bool {
        self.paths.state_file(name).is_file()
    }

    /// Names of every operation with a state document, sorted.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.paths.operations_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|source| io_err(&dir, source))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| io_err(&dir, source))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.exists(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Create the state document for a new operation.
    pub fn create(&self, op: &Operation) -> Result<(), StoreError> {
        if self.exists(&op.name) {
            return Err(StoreError::AlreadyExists(op.name.clone()));
        }
        self.save(op)
    }

    /// Rewrite the whole document.
    pub fn save(&self, op: &Operation) -> Result<(), StoreError> {
        let value = serde_json::to_value(op)
            .map_err(|source| StoreError::Corrupt { path: self.paths.state_file(&op.name), source })?;
        self.write_value(&op.name, &value)
    }

    /// Read the whole document into a typed operation.
    ///
    /// A document at an older schema version is migrated in place before
    /// deserialization, so callers always see the current schema.
    pub fn read_all(&self, name: &str) -> Result<Operation, StoreError> {
        let mut value = self.read_value(name)?;
        if doc_version(&value) < SCHEMA_VERSION {
            value = self.migrate_value(name, value)?;
        }
        let path = self.paths.state_file(name);
        serde_json::from_value(value).map_err(|source| StoreError::Corrupt { path, source })
    }

    /// Read a single field as raw JSON (`null` when absent).
    pub fn read(&self, name: &str, field: &str) -> Result<Value, StoreError> {
        let value = self.read_value(name)?;
        Ok(value.get(field).cloned().unwrap_or(Value::Null))
    }

    /// Batched field read; absent fields come back as `null`.
    pub fn read_fields(&self, name: &str, fields: &[&str]) -> Result<Vec<Value>, StoreError> {
        let value = self.read_value(name)?;
        Ok(fields.iter().map(|f| value.get(*f).cloned().unwrap_or(Value::Null)).collect())
    }

    /// Update a single field.
    pub fn update(&self, name: &str, field: &str, value: Value) -> Result<(), StoreError> {
        self.bulk_update(name, [(field, value)])
    }

    /// Apply several field changes in one rewrite so the file stays
    /// internally consistent.
    pub fn bulk_update<'a>(
        &self,
        name: &str,
        changes: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> Result<(), StoreError> {
        let mut value = self.read_value(name)?;
        let Some(doc) = value.as_object_mut() else {
            return Err(StoreError::Corrupt {
                path: self.paths.state_file(name),
                source: serde_json::Error::io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "state document is not a JSON object",
                )),
            });
        };
        for (field, new) in changes {
            if new.is_null() {
                doc.remove(field);
            } else {
                doc.insert(field.to_string(), new);
            }
        }
        self.write_value(name, &value)
    }

    /// Schema version of the stored document.
    pub fn version(&self, name: &str) -> Result<u32, StoreError> {
        Ok(doc_version(&self.read_value(name)?))
    }

    /// Migrate the document to the current schema. Idempotent; stamps
    /// `_migrated_at` when a migration actually ran.
    pub fn migrate(&self, name: &str) -> Result<(), StoreError> {
        let value = self.read_value(name)?;
        if doc_version(&value) < SCHEMA_VERSION {
            self.migrate_value(name, value)?;
        }
        Ok(())
    }

    /// Remove the operation's state directory. Prune-only.
    pub fn delete(&self, name: &str) -> Result<(), StoreError> {
        if !self.exists(name) {
            return Err(StoreError::NotFound(name.to_string()));
        }
        let dir = self.paths.operation_dir(name);
        fs::remove_dir_all(&dir).map_err(|source| io_err(&dir, source))
    }

    /// Append to the operation's event log, rotating when oversized.
    ///
    /// Never fails the caller; a lost event line must not break a
    /// transition that already happened.
    pub fn emit_event(&self, name: &str, event: OpEvent, details: &str) {
        if let Err(e) = self.append_event(name, event, details) {
            tracing::warn!(operation = name, event = %event, error = %e, "failed to write event log");
        }
    }

    fn append_event(&self, name: &str, event: OpEvent, details: &str) -> std::io::Result<()> {
        let path = self.paths.events_log(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        rotate_if_oversized(&path)?;
        let stamp = self.clock.now_utc().to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "[{stamp}] event:{event}: {details}")
    }

    /// v1 → v2: `blocked_on` became `after`, and the hold/merge fields
    /// gained explicit defaults.
    fn migrate_value(&self, name: &str, mut value: Value) -> Result<Value, StoreError> {
        let from = doc_version(&value);
        let path = self.paths.state_file(name);
        let Some(doc) = value.as_object_mut() else {
            return Err(StoreError::Corrupt {
                path,
                source: serde_json::Error::io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "state document is not a JSON object",
                )),
            });
        };

        if from < 2 {
            if let Some(after) = doc.remove("blocked_on") {
                doc.entry("after").or_insert(after);
            }
            doc.entry("held").or_insert(Value::Bool(false));
            doc.entry("merge_queued").or_insert(Value::Bool(false));
        }

        doc.insert("_schema_version".to_string(), Value::from(SCHEMA_VERSION));
        doc.insert(
            "_migrated_at".to_string(),
            Value::from(self.clock.now_utc().to_rfc3339_opts(SecondsFormat::Secs, true)),
        );

        self.write_value(name, &value)?;
        self.emit_event(name, OpEvent::Migrate, &format!("v{from} -> v{SCHEMA_VERSION}"));
        Ok(value)
    }

    fn read_value(&self, name: &str) -> Result<Value, StoreError> {
        let path = self.paths.state_file(name);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()))
            }
            Err(source) => return Err(io_err(&path, source)),
        };
        serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt { path, source })
    }

    fn write_value(&self, name: &str, value: &Value) -> Result<(), StoreError> {
        let path = self.paths.state_file(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| io_err(parent, source))?;
        }
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(value)
            .map_err(|source| StoreError::Corrupt { path: path.clone(), source })?;
        fs::write(&tmp, body).map_err(|source| io_err(&tmp, source))?;
        fs::rename(&tmp, &path).map_err(|source| io_err(&path, source))
    }
}

fn doc_version(value: &Value) -> u32 {
    value.get("_schema_version").and_then(Value::as_u64).unwrap_or(1) as u32
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io { path: path.to_path_buf(), source }
}

/// Shift `events.log` through numbered generations once it crosses the
/// size threshold. The oldest generation falls off.
fn rotate_if_oversized(path: &Path) -> std::io::Result<()> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if size < MAX_EVENT_LOG_BYTES {
        return Ok(());
    }

    let gen = |n: u32| -> PathBuf {
        if n == 0 {
            path.to_path_buf()
        } else {
            path.with_extension(format!("log.{n}"))
        }
    };

    let oldest = gen(EVENT_LOG_GENERATIONS - 1);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (0..EVENT_LOG_GENERATIONS - 1).rev() {
        let src = gen(n);
        if src.exists() {
            fs::rename(&src, gen(n + 1))?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
