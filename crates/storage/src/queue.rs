// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The merge queue file.
//!
//! A single JSON document (`{version, entries[]}`) holding an ordered
//! FIFO of merge requests. Any process may enqueue; only the merge daemon
//! dequeues. Every mutation runs under an exclusive lock on a sibling
//! lock file (not the document itself; the atomic-rename write would
//! detach the lock), then rewrites the document via temp-file + rename.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::lock::{LockError, LockedFile};

/// Queue document format version.
pub const QUEUE_VERSION: u32 = 1;

/// How long terminal entries linger before pruning.
pub const QUEUE_RETENTION: Duration = Duration::hours(6);

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt queue file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no queue entry with seq {0}")]
    UnknownEntry(u64),
}

/// Status of one queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Processing,
    Completed,
    Conflict,
    Failed,
}

impl EntryStatus {
    /// Terminal entries are eligible for retention pruning.
    pub fn is_terminal(self) -> bool {
        matches!(self, EntryStatus::Completed | EntryStatus::Conflict | EntryStatus::Failed)
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Processing => "processing",
            EntryStatus::Completed => "completed",
            EntryStatus::Conflict => "conflict",
            EntryStatus::Failed => "failed",
        })
    }
}

/// One merge request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Monotonically increasing sequence number; processing order
    pub seq: u64,
    pub operation: String,
    pub status: EntryStatus,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Why the entry was requeued or failed, for `status` output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct QueueDocument {
    version: u32,
    next_seq: u64,
    entries: Vec<QueueEntry>,
}

impl Default for QueueDocument {
    fn default() -> Self {
        Self { version: QUEUE_VERSION, next_seq: 1, entries: Vec::new() }
    }
}

/// Handle to the merge queue file.
#[derive(Debug, Clone)]
pub struct MergeQueue {
    file: PathBuf,
    lock: PathBuf,
}

impl MergeQueue {
    pub fn new(file: impl Into<PathBuf>, lock: impl Into<PathBuf>) -> Self {
        Self { file: file.into(), lock: lock.into() }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Append a pending entry for the operation.
    ///
    /// Idempotent while an entry for the same operation is still pending
    /// or processing; the existing seq is returned instead of appending
    /// a duplicate.
    pub fn enqueue(&self, operation: &str, now: DateTime<Utc>) -> Result<u64, QueueError> {
        self.with_doc(|doc| {
            if let Some(existing) = doc
                .entries
                .iter()
                .find(|e| e.operation == operation && !e.status.is_terminal())
            {
                return Ok(existing.seq);
            }
            let seq = doc.next_seq;
            doc.next_seq += 1;
            doc.entries.push(QueueEntry {
                seq,
                operation: operation.to_string(),
                status: EntryStatus::Pending,
                enqueued_at: now,
                updated_at: None,
                reason: None,
            });
            Ok(seq)
        })
    }

    /// Pop the earliest pending entry, marking it `processing`.
    pub fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<QueueEntry>, QueueError> {
        self.with_doc(|doc| {
            let Some(entry) = doc
                .entries
                .iter_mut()
                .filter(|e| e.status == EntryStatus::Pending)
                .min_by_key(|e| e.seq)
            else {
                return Ok(None);
            };
            entry.status = EntryStatus::Processing;
            entry.updated_at = Some(now);
            Ok(Some(entry.clone()))
        })
    }

    /// Set an entry's status, with an optional reason.
    pub fn mark(
        &self,
        seq: u64,
        status: EntryStatus,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        self.with_doc(|doc| {
            let entry = doc
                .entries
                .iter_mut()
                .find(|e| e.seq == seq)
                .ok_or(QueueError::UnknownEntry(seq))?;
            entry.status = status;
            entry.reason = reason.map(str::to_string);
            entry.updated_at = Some(now);
            Ok(())
        })
    }

    /// Put a processing entry back to pending (not yet ready), keeping
    /// its seq so it retries in original order.
    pub fn requeue(&self, seq: u64, reason: &str, now: DateTime<Utc>) -> Result<(), QueueError> {
        self.mark(seq, EntryStatus::Pending, Some(reason), now)
    }

    /// Read-only snapshot of all entries, in seq order.
    pub fn entries(&self) -> Result<Vec<QueueEntry>, QueueError> {
        let _guard = LockedFile::exclusive(&self.lock)?;
        let mut doc = self.read_doc()?;
        doc.entries.sort_by_key(|e| e.seq);
        Ok(doc.entries)
    }

    /// Drop terminal entries older than the retention horizon. Returns
    /// how many were removed.
    pub fn prune(&self, retention: Duration, now: DateTime<Utc>) -> Result<usize, QueueError> {
        self.with_doc(|doc| {
            let before = doc.entries.len();
            doc.entries.retain(|e| {
                if !e.status.is_terminal() {
                    return true;
                }
                let age_basis = e.updated_at.unwrap_or(e.enqueued_at);
                now - age_basis < retention
            });
            Ok(before - doc.entries.len())
        })
    }

    fn with_doc<T>(
        &self,
        f: impl FnOnce(&mut QueueDocument) -> Result<T, QueueError>,
    ) -> Result<T, QueueError> {
        let _guard = LockedFile::exclusive(&self.lock)?;
        let mut doc = self.read_doc()?;
        let result = f(&mut doc)?;
        self.write_doc(&doc)?;
        Ok(result)
    }

    fn read_doc(&self) -> Result<QueueDocument, QueueError> {
        let contents = match fs::read_to_string(&self.file) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(QueueDocument::default())
            }
            Err(source) => return Err(QueueError::Io { path: self.file.clone(), source }),
        };
        serde_json::from_str(&contents)
            .map_err(|source| QueueError::Corrupt { path: self.file.clone(), source })
    }

    fn write_doc(&self, doc: &QueueDocument) -> Result<(), QueueError> {
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| QueueError::Io { path: parent.to_path_buf(), source })?;
        }
        let tmp = self.file.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(doc)
            .map_err(|source| QueueError::Corrupt { path: self.file.clone(), source })?;
        fs::write(&tmp, body).map_err(|source| QueueError::Io { path: tmp.clone(), source })?;
        fs::rename(&tmp, &self.file)
            .map_err(|source| QueueError::Io { path: self.file.clone(), source })
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
