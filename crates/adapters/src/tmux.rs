// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal-multiplexer sessions.
//!
//! v0 hosts every Agent invocation inside a tmux session so the user can
//! attach to running work. The adapter covers exactly the operations the
//! engine needs; session naming and prompt assembly stay in the engine.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::subprocess::{run_with_timeout, SubprocessError, TMUX_TIMEOUT};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("tmux failed: {0}")]
    Tmux(String),
    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
}

/// Adapter for hosting agent sessions.
#[async_trait]
pub trait SessionAdapter: Clone + Send + Sync + 'static {
    /// Start a detached session running `command` with `cwd` as its
    /// working directory.
    async fn start(&self, session: &str, cwd: &Path, command: &str) -> Result<(), SessionError>;

    /// Whether the session currently exists.
    async fn is_live(&self, session: &str) -> bool;

    /// Names of live sessions starting with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, SessionError>;

    /// Kill the session. Succeeds if it is already gone.
    async fn kill(&self, session: &str) -> Result<(), SessionError>;

    /// Block until the session exits, polling at `poll`.
    async fn wait_exit(&self, session: &str, poll: Duration) {
        while self.is_live(session).await {
            tokio::time::sleep(poll).await;
        }
    }
}

/// Production adapter shelling out to tmux.
#[derive(Debug, Clone, Copy, Default)]
pub struct TmuxSessions;

impl TmuxSessions {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionAdapter for TmuxSessions {
    async fn start(&self, session: &str, cwd: &Path, command: &str) -> Result<(), SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.args(["new-session", "-d", "-s", session, "-c"])
            .arg(cwd)
            .arg(command);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux new-session").await?;
        if !output.status.success() {
            return Err(SessionError::Tmux(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }

    async fn is_live(&self, session: &str) -> bool {
        let mut cmd = Command::new("tmux");
        // Exact-name match: tmux -t prefix-matches without the = sigil
        cmd.args(["has-session", "-t", &format!("={session}")]);
        match run_with_timeout(cmd, TMUX_TIMEOUT, "tmux has-session").await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.args(["list-sessions", "-F", "#{session_name}"]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux list-sessions").await?;
        if !output.status.success() {
            // tmux exits non-zero when no server is running; that is an
            // empty list, not an error
            return Ok(Vec::new());
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|name| name.starts_with(prefix))
            .map(str::to_string)
            .collect())
    }

    async fn kill(&self, session: &str) -> Result<(), SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.args(["kill-session", "-t", &format!("={session}")]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux kill-session").await?;
        if !output.status.success() && self.is_live(session).await {
            return Err(SessionError::Tmux(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{SessionAdapter, SessionError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::BTreeSet;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    /// Recorded session operation
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SessionCall {
        Start { session: String, cwd: PathBuf, command: String },
        Kill { session: String },
    }

    #[derive(Default)]
    struct FakeSessionsState {
        live: BTreeSet<String>,
        calls: Vec<SessionCall>,
        /// Sessions that exit the moment they start (the common test case)
        exit_immediately: bool,
    }

    /// Fake session adapter with scripted liveness.
    #[derive(Clone, Default)]
    pub struct FakeSessions {
        inner: Arc<Mutex<FakeSessionsState>>,
    }

    impl FakeSessions {
        pub fn new() -> Self {
            Self::default()
        }

        /// Sessions exit as soon as they are started; `wait_exit` returns
        /// immediately. This models an Agent that finishes its work.
        pub fn exiting_immediately() -> Self {
            let fake = Self::default();
            fake.inner.lock().exit_immediately = true;
            fake
        }

        /// Mark a session as exited.
        pub fn finish(&self, session: &str) {
            self.inner.lock().live.remove(session);
        }

        /// Sessions currently live.
        pub fn live(&self) -> Vec<String> {
            self.inner.lock().live.iter().cloned().collect()
        }

        /// All recorded operations.
        pub fn calls(&self) -> Vec<SessionCall> {
            self.inner.lock().calls.clone()
        }

        pub fn started(&self, session: &str) -> bool {
            self.inner
                .lock()
                .calls
                .iter()
                .any(|c| matches!(c, SessionCall::Start { session: s, .. } if s == session))
        }
    }

    #[async_trait]
    impl SessionAdapter for FakeSessions {
        async fn start(
            &self,
            session: &str,
            cwd: &Path,
            command: &str,
        ) -> Result<(), SessionError> {
            let mut state = self.inner.lock();
            state.calls.push(SessionCall::Start {
                session: session.to_string(),
                cwd: cwd.to_path_buf(),
                command: command.to_string(),
            });
            if !state.exit_immediately {
                state.live.insert(session.to_string());
            }
            Ok(())
        }

        async fn is_live(&self, session: &str) -> bool {
            self.inner.lock().live.contains(session)
        }

        async fn list(&self, prefix: &str) -> Result<Vec<String>, SessionError> {
            Ok(self
                .inner
                .lock()
                .live
                .iter()
                .filter(|name| name.starts_with(prefix))
                .cloned()
                .collect())
        }

        async fn kill(&self, session: &str) -> Result<(), SessionError> {
            let mut state = self.inner.lock();
            state.calls.push(SessionCall::Kill { session: session.to_string() });
            state.live.remove(session);
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSessions, SessionCall};

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
