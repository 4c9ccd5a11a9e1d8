// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The in-session supervisor.
//!
//! The tmux session does not run the Agent directly; it runs
//! `v0 supervise … -- <agent cmd>`, which exports the v0 environment,
//! spawns the Agent as a child, records its pid to
//! `{worktree}/.claude.pid` for external tooling, waits, and on exit
//! removes the pid file and records the exit status. Keeping the
//! supervisor in-process (rather than a shell wrapper) is what lets the
//! host track the child directly while the pid file stays a fallback.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::session::pid_file;

/// Arguments for one supervised Agent run.
#[derive(Debug, Clone)]
pub struct SupervisorArgs {
    pub operation: String,
    /// Project root, exported as `V0_ROOT`
    pub root: PathBuf,
    pub remote: String,
    pub develop_branch: String,
    /// Agent argv; the working directory is the session's (the worktree)
    pub agent_cmd: Vec<String>,
}

/// Run the Agent under supervision. Returns the exit code to propagate.
///
/// Runs synchronously; this IS the session process; nothing else
/// happens in it. The worktree is the session's working directory.
pub fn run(args: &SupervisorArgs) -> i32 {
    let worktree = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("v0 supervise: cannot determine worktree: {e}");
            return 1;
        }
    };
    run_in(args, &worktree)
}

pub fn run_in(args: &SupervisorArgs, worktree: &Path) -> i32 {
    let Some((agent_bin, agent_args)) = args.agent_cmd.split_first() else {
        eprintln!("v0 supervise: no agent command given");
        return 2;
    };

    let mut child = match Command::new(agent_bin)
        .args(agent_args)
        .current_dir(worktree)
        .env("V0_OP", &args.operation)
        .env("V0_ROOT", &args.root)
        .env("V0_GIT_REMOTE", &args.remote)
        .env("V0_DEVELOP_BRANCH", &args.develop_branch)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            eprintln!("v0 supervise: failed to launch {agent_bin}: {e}");
            return 1;
        }
    };

    let pid_path = pid_file(worktree);
    if let Err(e) = std::fs::write(&pid_path, format!("{}\n", child.id())) {
        eprintln!("v0 supervise: cannot write pid file: {e}");
    }

    let status = child.wait();
    let code = match &status {
        Ok(status) => status.code().unwrap_or(128),
        Err(_) => 1,
    };

    // Orderly completion hook: drop the pid file, leave the exit status
    // where the worker can read it
    let _ = std::fs::remove_file(&pid_path);
    record_exit(worktree, code);
    code
}

fn record_exit(worktree: &Path, code: i32) {
    let dir = worktree.join(".v0");
    if std::fs::create_dir_all(&dir).is_ok() {
        let _ = std::fs::write(dir.join("exit-status"), format!("{code}\n"));
    }
}

/// Exit status recorded by the last supervised run, if any.
pub fn last_exit_status(worktree: &Path) -> Option<i32> {
    std::fs::read_to_string(worktree.join(".v0/exit-status"))
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
