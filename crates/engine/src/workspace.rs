// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The merge workspace.
//!
//! A single long-lived checkout at `{state}/workspace/`, mutated only by
//! the merge daemon. Clone mode backs it with the project remote; in
//! worktree mode it is an extra worktree off the project's git dir (used
//! when the develop branch is agent-only and never checked out by the
//! user). Created lazily, validated before every merge, recreated when
//! corrupt. `push`/`pull` never touch it.

use std::path::PathBuf;

use v0_core::{ProjectConfig, StatePaths, WorkspaceMode};

use crate::error::EngineError;
use crate::git;

/// Result of a merge attempt in the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAttempt {
    Merged,
    Conflict,
}

pub struct MergeWorkspace<'a> {
    config: &'a ProjectConfig,
    state: &'a StatePaths,
}

impl<'a> MergeWorkspace<'a> {
    pub fn new(config: &'a ProjectConfig, state: &'a StatePaths) -> Self {
        Self { config, state }
    }

    pub fn path(&self) -> PathBuf {
        self.state.workspace_dir()
    }

    /// Ensure a healthy workspace exists, creating or recreating as
    /// needed. Idempotent.
    pub async fn ensure(&self) -> Result<PathBuf, EngineError> {
        let path = self.path();
        if path.is_dir() {
            if self.validate(&path).await {
                return Ok(path);
            }
            tracing::warn!(path = %path.display(), "merge workspace failed validation, recreating");
            self.destroy().await;
        }
        self.create(&path).await?;
        Ok(path)
    }

    /// Healthy: HEAD resolves, develop is checked out, tree is clean.
    async fn validate(&self, path: &std::path::Path) -> bool {
        if !git::head_resolves(path).await {
            return false;
        }
        match git::current_branch(path).await {
            Ok(branch) if branch == self.config.develop_branch => {}
            _ => return false,
        }
        git::is_clean(path).await.unwrap_or(false)
    }

    async fn create(&self, path: &std::path::Path) -> Result<(), EngineError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EngineError::Git(format!("create workspace parent: {e}")))?;
        }
        let develop = &self.config.develop_branch;
        match self.config.effective_workspace_mode() {
            WorkspaceMode::Clone => {
                let url = git::remote_url(&self.config.root, &self.config.git_remote).await?;
                git::git(
                    &self.config.root,
                    &["clone", "--branch", develop, &url, &path.display().to_string()],
                )
                .await?;
            }
            WorkspaceMode::Worktree => {
                git::git(
                    &self.config.root,
                    &["worktree", "add", &path.display().to_string(), develop],
                )
                .await?;
            }
        }
        tracing::info!(
            path = %path.display(),
            mode = %self.config.effective_workspace_mode(),
            "merge workspace created"
        );
        Ok(())
    }

    /// Tear the workspace down completely.
    pub async fn destroy(&self) {
        let path = self.path();
        if self.config.effective_workspace_mode() == WorkspaceMode::Worktree {
            let _ = git::git(
                &self.config.root,
                &["worktree", "remove", "--force", &path.display().to_string()],
            )
            .await;
            let _ = git::git(&self.config.root, &["worktree", "prune"]).await;
        }
        if path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove workspace");
            }
        }
    }

    /// Merge an operation branch into develop and push. The workspace
    /// must have been `ensure`d first.
    pub async fn merge_branch(&self, branch: &str) -> Result<MergeAttempt, EngineError> {
        let path = self.path();
        let remote = &self.config.git_remote;
        let develop = &self.config.develop_branch;

        let _ = git::fetch(&path, remote).await;
        git::git(&path, &["checkout", develop]).await?;
        // Catch develop up with the remote before merging, so the push
        // below is fast-forward
        if git::remote_branch_exists(&path, remote, develop).await {
            let _ = git::git(&path, &["merge", "--ff-only", &format!("{remote}/{develop}")]).await;
        }

        let merge_ref = if git::branch_exists(&path, branch).await {
            branch.to_string()
        } else if git::remote_branch_exists(&path, remote, branch).await {
            format!("{remote}/{branch}")
        } else {
            return Err(EngineError::Git(format!("branch {branch} not found for merge")));
        };

        let merged = git::git(&path, &["merge", "--no-edit", &merge_ref]).await;
        match merged {
            Ok(_) => {
                git::push(&path, remote, develop).await?;
                Ok(MergeAttempt::Merged)
            }
            Err(_) if git::git_ok(&path, &["rev-parse", "--verify", "MERGE_HEAD"]).await => {
                // Conflicted merge: abort so the workspace stays clean
                // for the next entry
                let _ = git::git(&path, &["merge", "--abort"]).await;
                Ok(MergeAttempt::Conflict)
            }
            Err(e) => Err(e),
        }
    }

    /// Whether the operation's branch exists anywhere we could merge it
    /// from. Used by the readiness check to decide pending-vs-failed.
    pub async fn branch_recoverable(&self, branch: &str) -> bool {
        git::branch_exists(&self.config.root, branch).await
            || git::remote_branch_exists(&self.config.root, &self.config.git_remote, branch).await
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
