// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-operation worktrees.
//!
//! Each operation gets a private git worktree at
//! `{state}/tree/{branch}/{repo-name}` on a branch expanded from the
//! configured template. The user's checkout is never touched; deletion
//! happens only on prune of terminal operations or after a merge.

use std::path::{Path, PathBuf};
use tokio::process::Command;

use v0_adapters::subprocess::{run_with_timeout, HOOK_TIMEOUT};
use v0_core::{OperationKind, ProjectConfig, StatePaths};

use crate::error::EngineError;
use crate::git;

pub struct WorktreeManager<'a> {
    config: &'a ProjectConfig,
    state: &'a StatePaths,
}

impl<'a> WorktreeManager<'a> {
    pub fn new(config: &'a ProjectConfig, state: &'a StatePaths) -> Self {
        Self { config, state }
    }

    /// Last component of the project root; worktrees nest under the
    /// branch directory with this name.
    pub fn repo_name(&self) -> &str {
        self.config
            .root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("repo")
    }

    /// Branch for an operation, from the kind's template.
    pub fn branch_for(&self, kind: OperationKind, name_or_id: &str) -> String {
        self.config.branch_pattern(kind).expand(name_or_id)
    }

    /// Worktree directory for a branch.
    pub fn path_for(&self, branch: &str) -> PathBuf {
        self.state.worktree_dir(branch, self.repo_name())
    }

    /// Create the worktree on a new branch off `base`. Idempotent: an
    /// existing worktree directory is returned as-is so resumed
    /// operations keep their checkout.
    pub async fn create(&self, branch: &str, base: &str) -> Result<PathBuf, EngineError> {
        let path = self.path_for(branch);
        if path.is_dir() {
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EngineError::Git(format!("create worktree parent: {e}")))?;
        }

        let path_str = path.display().to_string();
        let mut args = vec!["worktree", "add"];
        if git::branch_exists(&self.config.root, branch).await {
            // Resuming after the worktree dir was lost: reattach to the
            // existing branch instead of failing on -b
            args.extend(["--force", &path_str, branch]);
        } else {
            args.extend(["-b", branch, &path_str, base]);
        }
        git::git(&self.config.root, &args).await?;

        self.run_init_hook(&path).await;
        Ok(path)
    }

    /// Run the configured `V0_WORKTREE_INIT` hook once in the new
    /// worktree. Best-effort: a failed cache-priming hook must not fail
    /// the operation.
    async fn run_init_hook(&self, worktree: &Path) {
        let Some(hook) = &self.config.worktree_init else {
            return;
        };
        let mut cmd = Command::new("sh");
        cmd.args(["-c", hook]).current_dir(worktree);
        match run_with_timeout(cmd, HOOK_TIMEOUT, "worktree init hook").await {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                tracing::warn!(
                    hook,
                    status = %output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "worktree init hook failed"
                );
            }
            Err(e) => {
                tracing::warn!(hook, error = %e, "worktree init hook did not run");
            }
        }
    }

    /// Record which session hosts this worktree, for reverse lookup.
    pub fn write_session_marker(&self, branch: &str, session: &str) -> Result<(), EngineError> {
        let marker = self.state.session_marker(branch);
        if let Some(parent) = marker.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EngineError::Git(format!("create marker dir: {e}")))?;
        }
        std::fs::write(&marker, format!("{session}\n"))
            .map_err(|e| EngineError::Git(format!("write session marker: {e}")))
    }

    /// Remove the worktree, its branch, and any leftover directory.
    /// Best-effort throughout; the worktree may already be half-gone.
    pub async fn remove(&self, branch: &str) {
        let path = self.path_for(branch);

        if path.is_dir() {
            let _ = git::git(
                &self.config.root,
                &["worktree", "remove", "--force", &path.display().to_string()],
            )
            .await;
        }
        let _ = git::git(&self.config.root, &["worktree", "prune"]).await;
        if git::branch_exists(&self.config.root, branch).await {
            let _ = git::git(&self.config.root, &["branch", "-D", branch]).await;
        }

        if path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove worktree dir");
            }
        }
        // Drop the branch dir (marker and all) if nothing else lives there
        if let Some(branch_dir) = path.parent() {
            let _ = std::fs::remove_file(self.state.session_marker(branch));
            let _ = std::fs::remove_dir(branch_dir);
        }
    }
}

/// All session markers under the state tree: `(session, worktree)`.
///
/// Used by the nudger to map sessions back to worktrees when no
/// operation records the session (poller-owned sessions).
pub fn session_markers(state: &StatePaths) -> Vec<(String, PathBuf)> {
    let mut found = Vec::new();
    collect_markers(&state.tree_dir(), &mut found);
    found
}

fn collect_markers(dir: &Path, found: &mut Vec<(String, PathBuf)>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_markers(&path, found);
        } else if path.file_name().and_then(|n| n.to_str()) == Some(".tmux-session") {
            if let Ok(session) = std::fs::read_to_string(&path) {
                let session = session.trim().to_string();
                // The worktree is the only directory sibling of the marker
                let worktree = path
                    .parent()
                    .and_then(|dir| std::fs::read_dir(dir).ok())
                    .and_then(|mut entries| {
                        entries.find_map(|e| {
                            let p = e.ok()?.path();
                            p.is_dir().then_some(p)
                        })
                    });
                if let Some(worktree) = worktree {
                    found.push((session, worktree));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
