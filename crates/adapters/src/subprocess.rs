// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution with timeouts.
//!
//! Every external command v0 runs (git, tmux, the issue store CLI) goes
//! through [`run_with_timeout`] so a hung subprocess can never wedge a
//! daemon loop.

use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Timeout for git worktree/clone/fetch operations.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for tmux control commands (new-session, kill-session, …).
pub const TMUX_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for issue-store CLI invocations.
pub const ISSUE_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for user-supplied hooks (worktree init).
pub const HOOK_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{name} timed out after {timeout:?}")]
    Timeout { name: &'static str, timeout: Duration },
    #[error("{name} failed to spawn: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Run a command to completion, killing it at the timeout.
///
/// `name` labels the command in errors and trace logs; callers still
/// inspect `output.status` themselves; a non-zero exit is not an error
/// at this layer.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    name: &'static str,
) -> Result<Output, SubprocessError> {
    cmd.kill_on_drop(true);
    let started = std::time::Instant::now();
    let result = tokio::time::timeout(timeout, cmd.output()).await;
    match result {
        Ok(Ok(output)) => {
            tracing::trace!(
                command = name,
                status = %output.status,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "subprocess finished"
            );
            Ok(output)
        }
        Ok(Err(source)) => Err(SubprocessError::Spawn { name, source }),
        Err(_) => {
            tracing::warn!(command = name, ?timeout, "subprocess timed out");
            Err(SubprocessError::Timeout { name, timeout })
        }
    }
}

/// Convenience for callers that treat non-zero exit as failure: returns
/// trimmed stdout on success, the trimmed stderr as the error otherwise.
pub async fn run_checked(
    cmd: Command,
    timeout: Duration,
    name: &'static str,
) -> Result<String, String> {
    let output = run_with_timeout(cmd, timeout, name).await.map_err(|e| e.to_string())?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(format!(
            "{name} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
