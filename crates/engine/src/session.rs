// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent session host.
//!
//! Launches one Agent invocation inside a tmux session bound to a
//! worktree, supervised by our own binary (see [`crate::supervisor`]).
//! The supervisor writes the Agent's pid to `{worktree}/.claude.pid` as
//! a fallback for external tooling; the outcome scripts installed in
//! `.v0/bin/` let the Agent signal how the session ended.

use std::path::{Path, PathBuf};
use std::time::Duration;

use v0_adapters::SessionAdapter;
use v0_core::{OperationKind, ProjectConfig, StatePaths};

use crate::error::EngineError;

/// Which template and log a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    Plan,
    Execute,
    Fix,
    Chore,
    Resolve,
}

impl AgentRole {
    /// Session-log file name under `operations/{name}/logs/`.
    pub fn log_name(self) -> &'static str {
        match self {
            AgentRole::Plan => "plan",
            AgentRole::Execute => "feature",
            AgentRole::Fix | AgentRole::Chore | AgentRole::Resolve => "claude",
        }
    }
}

/// How a session ended, as signalled by the outcome scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// `.v0/bin/done`: work complete, branch pushed
    Done,
    /// `.v0/bin/fixed`: issue fixed, branch pushed
    Fixed,
    /// `.v0/bin/incomplete`: agent gave up cleanly
    Incomplete,
    /// Session ended without an outcome signal
    Unknown,
}

/// One session to run.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub session: String,
    pub operation: String,
    pub worktree: PathBuf,
    pub branch: String,
    pub prompt: String,
    pub role: AgentRole,
}

/// Session name: `v0-{project}-{suffix}-{kind}`. The project component
/// scopes every lookup, so parallel projects never see each other's
/// sessions.
pub fn session_name(project: &str, suffix: &str, kind: OperationKind) -> String {
    format!("v0-{project}-{suffix}-{kind}")
}

/// Prefix matching every session of a project.
pub fn project_session_prefix(project: &str) -> String {
    format!("v0-{project}-")
}

/// Name of a poller's one-at-a-time worker session.
pub fn worker_session_name(project: &str, kind: OperationKind) -> String {
    format!("v0-{project}-worker-{kind}")
}

pub struct SessionHost<'a, S> {
    config: &'a ProjectConfig,
    state: &'a StatePaths,
    sessions: &'a S,
    agent_bin: String,
    poll: Duration,
}

impl<'a, S: SessionAdapter> SessionHost<'a, S> {
    pub fn new(config: &'a ProjectConfig, state: &'a StatePaths, sessions: &'a S) -> Self {
        Self {
            config,
            state,
            sessions,
            agent_bin: std::env::var("V0_AGENT_BIN").unwrap_or_else(|_| "claude".to_string()),
            poll: Duration::from_secs(2),
        }
    }

    pub fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Launch the session, wait for it to exit, and report the outcome.
    pub async fn run(&self, spec: &SessionSpec) -> Result<SessionOutcome, EngineError> {
        install_outcome_scripts(&spec.worktree, &self.config.git_remote)
            .map_err(|e| EngineError::Other(format!("install outcome scripts: {e}")))?;
        let _ = std::fs::remove_file(outcome_file(&spec.worktree));

        // Reverse-lookup marker: session name → worktree
        let marker = self.state.session_marker(&spec.branch);
        if let Some(parent) = marker.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = std::fs::write(&marker, format!("{}\n", spec.session));

        let command = self.supervise_command(spec);
        self.sessions.start(&spec.session, &spec.worktree, &command).await?;
        self.append_session_log(spec, "started");
        tracing::info!(
            session = spec.session,
            operation = spec.operation,
            role = ?spec.role,
            "agent session started"
        );

        self.sessions.wait_exit(&spec.session, self.poll).await;

        // The supervisor removes the pid file on orderly exit; anything
        // left behind is an orphan to clean up
        kill_agent(&spec.worktree).await;

        let outcome = read_worktree_outcome(&spec.worktree);
        self.append_session_log(spec, &format!("exited {outcome:?}"));
        Ok(outcome)
    }

    /// Kill the hosting session and its Agent process.
    pub async fn kill(&self, session: &str, worktree: &Path) -> Result<(), EngineError> {
        self.sessions.kill(session).await?;
        kill_agent(worktree).await;
        Ok(())
    }

    /// Timestamped line in the role's session log
    /// (`operations/{name}/logs/{plan,feature,claude}.log`). Best-effort.
    fn append_session_log(&self, spec: &SessionSpec, message: &str) {
        use std::io::Write;

        let build = v0_core::BuildPaths::new(self.config.build_root());
        let path = build.session_log(&spec.operation, spec.role.log_name());
        let Some(parent) = path.parent() else {
            return;
        };
        if std::fs::create_dir_all(parent).is_err() {
            return;
        }
        if let Ok(mut file) =
            std::fs::OpenOptions::new().create(true).append(true).open(&path)
        {
            let stamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
            let _ = writeln!(file, "{stamp} [{}] {message}", spec.session);
        }
    }

    /// The command line the tmux session runs: our own binary in
    /// supervise mode, wrapping the Agent.
    fn supervise_command(&self, spec: &SessionSpec) -> String {
        let exe = std::env::current_exe()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "v0".to_string());
        format!(
            "{} supervise --operation {} --root {} --remote {} --develop {} -- {} {}",
            shell_quote(&exe),
            shell_quote(&spec.operation),
            shell_quote(&self.config.root.display().to_string()),
            shell_quote(&self.config.git_remote),
            shell_quote(&self.config.develop_branch),
            shell_quote(&self.agent_bin),
            shell_quote(&spec.prompt),
        )
    }
}

/// Path of the outcome file the scripts write.
fn outcome_file(worktree: &Path) -> PathBuf {
    worktree.join(".v0/outcome")
}

/// Path of the Agent pid file inside a worktree.
pub fn pid_file(worktree: &Path) -> PathBuf {
    worktree.join(".claude.pid")
}

/// Outcome recorded in a worktree by the last session's scripts.
pub fn read_worktree_outcome(worktree: &Path) -> SessionOutcome {
    match std::fs::read_to_string(outcome_file(worktree)) {
        Ok(contents) => match contents.trim() {
            "done" => SessionOutcome::Done,
            "fixed" => SessionOutcome::Fixed,
            "incomplete" => SessionOutcome::Incomplete,
            _ => SessionOutcome::Unknown,
        },
        Err(_) => SessionOutcome::Unknown,
    }
}

/// Write the `done`/`fixed`/`incomplete` scripts into `.v0/bin/`.
///
/// Each records the outcome, pushes the branch where that makes sense,
/// and terminates the Agent gracefully via its pid file.
fn install_outcome_scripts(worktree: &Path, remote: &str) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let bin = worktree.join(".v0/bin");
    std::fs::create_dir_all(&bin)?;

    let push_and_signal = |outcome: &str, push: bool| {
        let push_line = if push {
            format!(
                "branch=$(git rev-parse --abbrev-ref HEAD)\n\
                 git push -u \"${{V0_GIT_REMOTE:-{remote}}}\" \"$branch\"\n"
            )
        } else {
            String::new()
        };
        format!(
            "#!/bin/sh\n\
             set -eu\n\
             cd \"$(dirname \"$0\")/../..\"\n\
             {push_line}\
             echo {outcome} > .v0/outcome\n\
             if [ -f .claude.pid ]; then\n\
             \tkill -TERM \"$(cat .claude.pid)\" 2>/dev/null || true\n\
             fi\n"
        )
    };

    for (name, outcome, push) in [
        ("done", "done", true),
        ("fixed", "fixed", true),
        ("incomplete", "incomplete", false),
    ] {
        let path = bin.join(name);
        std::fs::write(&path, push_and_signal(outcome, push))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

/// Grace between SIGTERM and SIGKILL.
const KILL_GRACE: Duration = Duration::from_millis(1500);

/// Terminate an orphaned Agent recorded in the worktree's pid file.
///
/// Validates that the candidate process actually runs inside the
/// worktree before signalling; pids get recycled, and killing an
/// innocent process would be far worse than leaking an agent.
pub async fn kill_agent(worktree: &Path) {
    let pid_path = pid_file(worktree);
    let Some(pid) = std::fs::read_to_string(&pid_path)
        .ok()
        .and_then(|s| s.trim().parse::<i32>().ok())
    else {
        return;
    };

    if !process_in_worktree(pid, worktree) {
        tracing::warn!(pid, worktree = %worktree.display(), "stale pid file, not killing");
        let _ = std::fs::remove_file(&pid_path);
        return;
    }

    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    let target = Pid::from_raw(pid);

    let _ = kill(target, Signal::SIGTERM);
    let deadline = std::time::Instant::now() + KILL_GRACE;
    while std::time::Instant::now() < deadline {
        if kill(target, None).is_err() {
            let _ = std::fs::remove_file(&pid_path);
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    tracing::warn!(pid, "agent ignored SIGTERM, escalating");
    let _ = kill(target, Signal::SIGKILL);
    let _ = std::fs::remove_file(&pid_path);
}

/// Best-effort check that the process's working directory is inside the
/// worktree. Only /proc platforms can answer; elsewhere the pid file
/// existing in the worktree is taken as ownership.
fn process_in_worktree(pid: i32, worktree: &Path) -> bool {
    let proc_cwd = PathBuf::from(format!("/proc/{pid}/cwd"));
    if !proc_cwd.exists() {
        // No /proc entry: either not Linux, or the process is gone.
        // A dead pid is safe to "kill".
        return cfg!(not(target_os = "linux"));
    }
    let Ok(cwd) = std::fs::read_link(&proc_cwd) else {
        return false;
    };
    let canonical = worktree.canonicalize().unwrap_or_else(|_| worktree.to_path_buf());
    cwd.starts_with(&canonical)
}

/// Single-quote a string for the shell.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
