// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The idle-session nudger.
//!
//! Agents sometimes finish semantically but keep their multiplexer
//! session attached. The nudger walks the project's sessions, reads each
//! Agent's session journal through a pluggable strategy, and reaps
//! sessions whose Agent has ended its turn and gone quiet. Journal
//! errors (auth, credit, API) reap the session too; those never resolve
//! on their own, and the error is recorded on the operation.

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use v0_adapters::{JournalStrategy, JournalVerdict, SessionAdapter};
use v0_core::{Clock, OpEvent, Phase, ProjectConfig, StatePaths};
use v0_storage::{OperationStore, PidFile};

use crate::error::EngineError;
use crate::session::{kill_agent, project_session_prefix};
use crate::transitions;
use crate::worktree::session_markers;

/// Default sweep interval.
pub const NUDGE_INTERVAL: Duration = Duration::from_secs(30);

/// What the nudger did to one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NudgeAction {
    /// Idle-done: session and agent killed
    Reaped,
    /// Journal reported an agent error; session reaped, operation failed
    Errored(String),
    /// Working, or no evidence either way
    LeftAlone,
    /// No operation, no marker: an orphan with nothing owning it
    Orphan,
}

pub struct Nudger<'a, S, C> {
    config: &'a ProjectConfig,
    state: &'a StatePaths,
    store: &'a OperationStore<C>,
    sessions: &'a S,
    strategy: &'a dyn JournalStrategy,
    interval: Duration,
}

impl<'a, S, C> Nudger<'a, S, C>
where
    S: SessionAdapter,
    C: Clock,
{
    pub fn new(
        config: &'a ProjectConfig,
        state: &'a StatePaths,
        store: &'a OperationStore<C>,
        sessions: &'a S,
        strategy: &'a dyn JournalStrategy,
    ) -> Self {
        Self { config, state, store, sessions, strategy, interval: NUDGE_INTERVAL }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until cancelled; singleton per project via `.nudge.pid`.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<bool, EngineError> {
        let Some(pid_file) = PidFile::acquire(&self.state.nudge_pid())? else {
            tracing::info!("nudger already running, exiting");
            return Ok(false);
        };
        tracing::info!(project = self.config.project, "nudger started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.run_cycle().await {
                        tracing::warn!(error = %e, "nudge cycle failed");
                    }
                }
            }
        }

        pid_file.release()?;
        Ok(true)
    }

    /// Sweep every live session of this project once.
    pub async fn run_cycle(&self) -> Result<Vec<(String, NudgeAction)>, EngineError> {
        let mut actions = Vec::new();
        let prefix = project_session_prefix(&self.config.project);

        for session in self.sessions.list(&prefix).await? {
            let action = self.inspect(&session).await?;
            if action != NudgeAction::LeftAlone {
                tracing::info!(session, ?action, "nudge");
            }
            actions.push((session, action));
        }
        Ok(actions)
    }

    async fn inspect(&self, session: &str) -> Result<NudgeAction, EngineError> {
        let owner = self.find_owner(session)?;
        let Some((operation, worktree)) = owner else {
            // Nothing owns this session: no state file, no marker. Reap
            // it rather than let it linger forever.
            self.sessions.kill(session).await?;
            return Ok(NudgeAction::Orphan);
        };

        match self.strategy.classify(&worktree) {
            JournalVerdict::IdleDone => {
                self.sessions.kill(session).await?;
                kill_agent(&worktree).await;
                if let Some(operation) = &operation {
                    self.store.emit_event(
                        operation,
                        OpEvent::SessionEnd,
                        &format!("{session} reaped idle"),
                    );
                }
                Ok(NudgeAction::Reaped)
            }
            JournalVerdict::Errored(message) => {
                // An auth/credit/API error never resolves on its own:
                // reap the session so a worker parked on it unblocks,
                // and fail the operation so the error reaches its phase
                self.sessions.kill(session).await?;
                kill_agent(&worktree).await;
                if let Some(operation) = &operation {
                    self.store.emit_event(operation, OpEvent::Error, &format!("agent: {message}"));
                    let failable = self
                        .store
                        .read_all(operation)
                        .map(|op| op.phase == Phase::Executing)
                        .unwrap_or(false);
                    if failable {
                        // A waiting worker may reap the dead session
                        // first and mark the operation interrupted;
                        // either verdict satisfies the error policy
                        if let Err(e) = transitions::to_failed(
                            self.store,
                            operation,
                            &format!("agent error: {message}"),
                        ) {
                            tracing::debug!(operation = %operation, error = %e, "already transitioned");
                        }
                    }
                }
                tracing::warn!(session, message, "agent error, session reaped");
                Ok(NudgeAction::Errored(message))
            }
            JournalVerdict::Active => Ok(NudgeAction::LeftAlone),
        }
    }

    /// Map a session to its operation and worktree: the state files
    /// first, the on-disk markers for worker sessions second.
    fn find_owner(
        &self,
        session: &str,
    ) -> Result<Option<(Option<String>, PathBuf)>, EngineError> {
        for name in self.store.list()? {
            let Ok(op) = self.store.read_all(&name) else {
                continue;
            };
            if op.tmux_session.as_deref() == Some(session) {
                if let Some(worktree) = op.worktree.clone() {
                    return Ok(Some((Some(name), worktree)));
                }
                let manager = crate::worktree::WorktreeManager::new(self.config, self.state);
                let worktree = manager.path_for(&manager.branch_for(op.kind, &name));
                return Ok(Some((Some(name), worktree)));
            }
        }
        for (marked_session, worktree) in session_markers(self.state) {
            if marked_session == session {
                return Ok(Some((None, worktree)));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
#[path = "nudge_tests.rs"]
mod tests;
