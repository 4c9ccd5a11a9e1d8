// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git plumbing.
//!
//! Everything runs `git -C <repo>` through the shared subprocess helper
//! with `GIT_DIR`/`GIT_WORK_TREE` scrubbed, so an agent's exported git
//! environment can never redirect our commands into its own checkout.

use std::path::Path;
use tokio::process::Command;

use v0_adapters::subprocess::{run_with_timeout, GIT_TIMEOUT};

use crate::error::EngineError;

fn git_cmd(repo: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new("git");
    cmd.arg("-C")
        .arg(repo)
        .args(args)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE");
    cmd
}

/// Run git, failing on non-zero exit with stderr in the error.
pub async fn git(repo: &Path, args: &[&str]) -> Result<String, EngineError> {
    let output = run_with_timeout(git_cmd(repo, args), GIT_TIMEOUT, "git")
        .await
        .map_err(|e| EngineError::Git(e.to_string()))?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(EngineError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

/// Run git, reporting only whether it succeeded.
pub async fn git_ok(repo: &Path, args: &[&str]) -> bool {
    match run_with_timeout(git_cmd(repo, args), GIT_TIMEOUT, "git").await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

pub async fn current_branch(repo: &Path) -> Result<String, EngineError> {
    git(repo, &["rev-parse", "--abbrev-ref", "HEAD"]).await
}

pub async fn head_resolves(repo: &Path) -> bool {
    git_ok(repo, &["rev-parse", "--verify", "HEAD"]).await
}

pub async fn is_clean(repo: &Path) -> Result<bool, EngineError> {
    Ok(git(repo, &["status", "--porcelain"]).await?.is_empty())
}

pub async fn branch_exists(repo: &Path, branch: &str) -> bool {
    git_ok(repo, &["rev-parse", "--verify", &format!("refs/heads/{branch}")]).await
}

pub async fn remote_branch_exists(repo: &Path, remote: &str, branch: &str) -> bool {
    git_ok(repo, &["rev-parse", "--verify", &format!("refs/remotes/{remote}/{branch}")]).await
}

pub async fn remote_url(repo: &Path, remote: &str) -> Result<String, EngineError> {
    git(repo, &["remote", "get-url", remote]).await
}

/// Whether the worktree's HEAD has commits not on `base`.
pub async fn has_commits_ahead(repo: &Path, base: &str) -> Result<bool, EngineError> {
    let count = git(repo, &["rev-list", "--count", &format!("{base}..HEAD")]).await?;
    Ok(count.parse::<u64>().unwrap_or(0) > 0)
}

pub async fn fetch(repo: &Path, remote: &str) -> Result<(), EngineError> {
    git(repo, &["fetch", "--prune", remote]).await.map(drop)
}

pub async fn push(repo: &Path, remote: &str, branch: &str) -> Result<(), EngineError> {
    git(repo, &["push", "-u", remote, branch]).await.map(drop)
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
