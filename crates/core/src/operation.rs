// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The operation state document.
//!
//! One JSON document per operation, schema-versioned, owned by exactly one
//! process at a time. Fields absent from older documents deserialize as
//! their defaults so readers tolerate documents written by any schema
//! version at or below [`SCHEMA_VERSION`].

use crate::clock::Clock;
use crate::phase::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Current schema version stamped into new documents.
pub const SCHEMA_VERSION: u32 = 2;

/// What kind of work an operation tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Feature,
    Fix,
    Chore,
    Roadmap,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Feature => "feature",
            OperationKind::Fix => "fix",
            OperationKind::Chore => "chore",
            OperationKind::Roadmap => "roadmap",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feature" => Ok(OperationKind::Feature),
            "fix" => Ok(OperationKind::Fix),
            "chore" => Ok(OperationKind::Chore),
            "roadmap" => Ok(OperationKind::Roadmap),
            other => Err(format!("unknown operation kind: {other}")),
        }
    }
}

/// Where an operation sits in the merge queue, if it is in it at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    Pending,
    Processing,
    Merged,
    Conflict,
    Failed,
}

impl std::fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MergeStatus::Pending => "pending",
            MergeStatus::Processing => "processing",
            MergeStatus::Merged => "merged",
            MergeStatus::Conflict => "conflict",
            MergeStatus::Failed => "failed",
        })
    }
}

/// A named unit of work with its own state document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Human-chosen name, unique per project
    pub name: String,
    pub kind: OperationKind,
    pub phase: Phase,
    /// Host name stamped at creation; other hosts refuse to drive it
    pub machine: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub held_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Initial human request
    pub prompt: String,
    /// Repo-relative plan path once planning produced one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_file: Option<String>,
    /// Issue-store id tracking this operation and its blockers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epic_id: Option<String>,
    /// Absolute path of the per-operation worktree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree: Option<PathBuf>,
    /// Session name of the currently-hosting agent session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmux_session: Option<String>,
    /// Name of the operation this one depends on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    /// Phase to resume into when unblocked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_phase: Option<Phase>,
    /// User-requested pause; suppresses scheduler progression, not cancel
    #[serde(default)]
    pub held: bool,
    #[serde(default)]
    pub merge_queued: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_status: Option<MergeStatus>,
    /// Set by `resume --force`: schedulers skip the blocker check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_blockers: Option<bool>,
    #[serde(rename = "_schema_version")]
    pub schema_version: u32,
    #[serde(rename = "_migrated_at", default, skip_serializing_if = "Option::is_none")]
    pub migrated_at: Option<DateTime<Utc>>,
}

impl Operation {
    /// Create a fresh operation document in `init`.
    pub fn new(
        name: impl Into<String>,
        kind: OperationKind,
        prompt: impl Into<String>,
        machine: impl Into<String>,
        clock: &impl Clock,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            phase: Phase::Init,
            machine: machine.into(),
            created_at: clock.now_utc(),
            completed_at: None,
            merged_at: None,
            held_at: None,
            cancelled_at: None,
            prompt: prompt.into(),
            plan_file: None,
            epic_id: None,
            worktree: None,
            tmux_session: None,
            after: None,
            blocked_phase: None,
            held: false,
            merge_queued: false,
            merge_status: None,
            ignore_blockers: None,
            schema_version: SCHEMA_VERSION,
            migrated_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Phase a failed/interrupted operation resumes into: furthest point
    /// whose artifacts still exist.
    pub fn resume_phase(&self) -> Phase {
        if self.phase == Phase::Blocked {
            return self.blocked_phase.unwrap_or(Phase::Init);
        }
        if self.epic_id.is_some() {
            Phase::Queued
        } else if self.plan_file.is_some() {
            Phase::Planned
        } else {
            Phase::Init
        }
    }

    /// True when schedulers must skip the blocker check.
    pub fn ignores_blockers(&self) -> bool {
        self.ignore_blockers.unwrap_or(false)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub struct OperationBuilder {
    op: Operation,
}

#[cfg(any(test, feature = "test-support"))]
impl OperationBuilder {
    pub fn phase(mut self, phase: Phase) -> Self {
        self.op.phase = phase;
        self
    }

    pub fn kind(mut self, kind: OperationKind) -> Self {
        self.op.kind = kind;
        self
    }

    pub fn plan_file(mut self, path: impl Into<String>) -> Self {
        self.op.plan_file = Some(path.into());
        self
    }

    pub fn epic_id(mut self, id: impl Into<String>) -> Self {
        self.op.epic_id = Some(id.into());
        self
    }

    pub fn worktree(mut self, path: impl Into<PathBuf>) -> Self {
        self.op.worktree = Some(path.into());
        self
    }

    pub fn tmux_session(mut self, session: impl Into<String>) -> Self {
        self.op.tmux_session = Some(session.into());
        self
    }

    pub fn after(mut self, name: impl Into<String>) -> Self {
        self.op.after = Some(name.into());
        self
    }

    pub fn blocked_phase(mut self, phase: Phase) -> Self {
        self.op.blocked_phase = Some(phase);
        self
    }

    pub fn held(mut self, held: bool) -> Self {
        self.op.held = held;
        self
    }

    pub fn merge_status(mut self, status: MergeStatus) -> Self {
        self.op.merge_status = Some(status);
        self
    }

    pub fn schema_version(mut self, version: u32) -> Self {
        self.op.schema_version = version;
        self
    }

    pub fn build(self) -> Operation {
        self.op
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Operation {
    /// Builder with test defaults: a feature named `test-op` in `init`.
    pub fn builder(name: impl Into<String>) -> OperationBuilder {
        OperationBuilder {
            op: Operation::new(
                name,
                OperationKind::Feature,
                "test prompt",
                "test-host",
                &crate::clock::FakeClock::new(),
            ),
        }
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
