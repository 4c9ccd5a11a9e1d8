// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk layout.
//!
//! Two path families: [`BuildPaths`] under the project root (state
//! documents, logs, the merge queue) and [`StatePaths`] under the user's
//! XDG state dir (worktrees, the merge workspace, daemon pid files).
//! Everything that knows a literal path component lives here.

use crate::operation::OperationKind;
use std::path::{Path, PathBuf};

/// Paths under `{root}/{build_dir}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPaths {
    build_root: PathBuf,
}

impl BuildPaths {
    pub fn new(build_root: impl Into<PathBuf>) -> Self {
        Self { build_root: build_root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.build_root
    }

    pub fn operations_dir(&self) -> PathBuf {
        self.build_root.join("operations")
    }

    pub fn operation_dir(&self, name: &str) -> PathBuf {
        self.operations_dir().join(name)
    }

    /// The operation state document (JSON, schema v2).
    pub fn state_file(&self, name: &str) -> PathBuf {
        self.operation_dir(name).join("state.json")
    }

    pub fn operation_logs_dir(&self, name: &str) -> PathBuf {
        self.operation_dir(name).join("logs")
    }

    /// Append-only event log for one operation.
    pub fn events_log(&self, name: &str) -> PathBuf {
        self.operation_logs_dir(name).join("events.log")
    }

    /// Per-session logs: `feature`, `claude`, `plan`.
    pub fn session_log(&self, name: &str, log: &str) -> PathBuf {
        self.operation_logs_dir(name).join(format!("{log}.log"))
    }

    pub fn mergeq_dir(&self) -> PathBuf {
        self.build_root.join("mergeq")
    }

    /// The merge queue document (`{version, entries[]}`).
    pub fn queue_file(&self) -> PathBuf {
        self.mergeq_dir().join("queue.json")
    }

    /// Lock file guarding queue mutations (enqueue/dequeue).
    pub fn queue_lock(&self) -> PathBuf {
        self.mergeq_dir().join("queue.lock")
    }

    /// Lock held by the queue processor for its whole lifetime.
    pub fn queue_processor_lock(&self) -> PathBuf {
        self.mergeq_dir().join("processor.lock")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.build_root.join("logs")
    }

    /// Project-level daemon log.
    pub fn project_log(&self) -> PathBuf {
        self.logs_dir().join("v0.log")
    }

    pub fn trace_log(&self) -> PathBuf {
        self.logs_dir().join("trace.log")
    }
}

/// Paths under `${XDG_STATE_HOME:-~/.local/state}/v0/{project}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    state_root: PathBuf,
}

impl StatePaths {
    /// Resolve the per-project state root from the environment.
    pub fn resolve(project: &str) -> Self {
        let base = std::env::var_os("XDG_STATE_HOME")
            .map(PathBuf::from)
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| dirs::home_dir().map(|h| h.join(".local/state")))
            .unwrap_or_else(|| PathBuf::from(".local/state"));
        Self { state_root: base.join("v0").join(project) }
    }

    /// Explicit state root; used by tests and by `status --all` walking
    /// sibling projects.
    pub fn at(state_root: impl Into<PathBuf>) -> Self {
        Self { state_root: state_root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.state_root
    }

    pub fn tree_dir(&self) -> PathBuf {
        self.state_root.join("tree")
    }

    /// Worktree directory for a branch: `tree/{branch}/{repo-name}`.
    ///
    /// The branch expansion may contain slashes (`feature/auth`), which
    /// nest naturally under `tree/`.
    pub fn worktree_dir(&self, branch: &str, repo_name: &str) -> PathBuf {
        self.tree_dir().join(branch).join(repo_name)
    }

    /// Reverse-lookup marker written next to the worktree: session name →
    /// worktree directory.
    pub fn session_marker(&self, branch: &str) -> PathBuf {
        self.tree_dir().join(branch).join(".tmux-session")
    }

    /// The merge workspace checkout, used only by the merge daemon.
    pub fn workspace_dir(&self) -> PathBuf {
        self.state_root.join("workspace")
    }

    /// Back-pointer to the project root for `status --all`.
    pub fn root_marker(&self) -> PathBuf {
        self.state_root.join(".v0.root")
    }

    pub fn nudge_pid(&self) -> PathBuf {
        self.state_root.join(".nudge.pid")
    }

    pub fn prune_daemon_pid(&self) -> PathBuf {
        self.state_root.join(".prune-daemon.pid")
    }

    /// Singleton pid file for a fix/chore poller.
    pub fn worker_pid(&self, kind: OperationKind) -> PathBuf {
        self.state_root.join(format!(".worker-{kind}.pid"))
    }

    /// Singleton pid file for the merge queue daemon.
    pub fn mergeq_pid(&self) -> PathBuf {
        self.state_root.join(".mergeq.pid")
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
