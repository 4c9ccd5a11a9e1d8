// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent session-journal reading.
//!
//! The Agent appends a newline-delimited JSON record per turn to a
//! per-project journal file. The idle-session nudger reads the latest
//! record to decide whether a still-attached session has actually
//! finished. The record format belongs to the Agent vendor, so the
//! interpretation is a pluggable strategy.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What the journal says about a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalVerdict {
    /// Ended its turn without tool use and has been quiet: reap it.
    IdleDone,
    /// The Agent hit an API/auth/limit error; surface an error state.
    Errored(String),
    /// Working, or unreadable: leave alone.
    Active,
}

/// Strategy for mapping a worktree's journal to a verdict.
pub trait JournalStrategy: Send + Sync + 'static {
    fn classify(&self, worktree: &Path) -> JournalVerdict;
}

/// One journal record, in the fields the default strategy consults.
/// Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct TurnRecord {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    tool_use: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Default strategy: read the final record of the journal file.
///
/// A session is idle-done when its last turn stopped with `end_turn`,
/// used no tools, and the journal has not been touched for
/// `stale_after`. An `error` field (or an `error`-typed record) is
/// surfaced as [`JournalVerdict::Errored`].
pub struct StopRecordStrategy {
    journal_root: PathBuf,
    stale_after: Duration,
}

impl StopRecordStrategy {
    /// Journal quiet-time before an idle session is reaped.
    pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(90);

    pub fn new(journal_root: impl Into<PathBuf>) -> Self {
        Self { journal_root: journal_root.into(), stale_after: Self::DEFAULT_STALE_AFTER }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// The journal file for a worktree: the Agent slugs the absolute
    /// worktree path into one flat filename under its project directory.
    pub fn journal_path(&self, worktree: &Path) -> PathBuf {
        let slug = worktree.display().to_string().replace(['/', '\\'], "-");
        self.journal_root.join(format!("{slug}.jsonl"))
    }

    fn last_record(path: &Path) -> Option<TurnRecord> {
        let contents = std::fs::read_to_string(path).ok()?;
        let line = contents.lines().rev().find(|l| !l.trim().is_empty())?;
        serde_json::from_str(line).ok()
    }

    fn is_stale(&self, path: &Path) -> bool {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|mtime| mtime.elapsed().ok())
            .map(|age| age >= self.stale_after)
            .unwrap_or(false)
    }
}

impl JournalStrategy for StopRecordStrategy {
    fn classify(&self, worktree: &Path) -> JournalVerdict {
        let path = self.journal_path(worktree);
        let Some(record) = Self::last_record(&path) else {
            return JournalVerdict::Active;
        };

        if let Some(error) = record.error {
            return JournalVerdict::Errored(error);
        }
        if record.kind.as_deref() == Some("error") {
            return JournalVerdict::Errored("agent reported an error".to_string());
        }

        let turn_ended = record.stop_reason.as_deref() == Some("end_turn") && !record.tool_use;
        if turn_ended && self.is_stale(&path) {
            JournalVerdict::IdleDone
        } else {
            JournalVerdict::Active
        }
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
