// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation intake and user lifecycle commands.
//!
//! The CLI's mutations funnel through here: creating operations,
//! hold/resume/cancel, pruning terminal operations, and filing fix/chore
//! issues. Scheduler-driven mutations live in the workers instead.

use v0_core::{Clock, OpEvent, Operation, OperationKind, Phase, ProjectConfig, StatePaths};
use v0_storage::OperationStore;

use v0_adapters::{IssueStore, SessionAdapter};

use crate::error::EngineError;
use crate::session::kill_agent;
use crate::transitions;
use crate::worktree::WorktreeManager;

pub struct Intake<'a, S, I, C> {
    config: &'a ProjectConfig,
    state: &'a StatePaths,
    store: &'a OperationStore<C>,
    sessions: &'a S,
    issues: &'a I,
}

impl<'a, S, I, C> Intake<'a, S, I, C>
where
    S: SessionAdapter,
    I: IssueStore,
    C: Clock,
{
    pub fn new(
        config: &'a ProjectConfig,
        state: &'a StatePaths,
        store: &'a OperationStore<C>,
        sessions: &'a S,
        issues: &'a I,
    ) -> Self {
        Self { config, state, store, sessions, issues }
    }

    /// File a feature (or roadmap) operation. `after` names the blocker
    /// operation; `plan` is a pre-written plan file that skips the
    /// planning session.
    pub fn create_operation(
        &self,
        name: &str,
        kind: OperationKind,
        prompt: &str,
        after: Option<&str>,
        plan: Option<&str>,
    ) -> Result<Operation, EngineError> {
        if let Some(after) = after {
            // A typo'd blocker would silently never unblock
            if !self.store.exists(after) {
                return Err(EngineError::Store(v0_storage::StoreError::NotFound(
                    after.to_string(),
                )));
            }
        }

        let mut op =
            Operation::new(name, kind, prompt, crate::machine_name(), self.store.clock());
        op.after = after.map(str::to_string);
        if let Some(plan) = plan {
            op.plan_file = Some(plan.to_string());
            op.phase = Phase::Planned;
        }

        self.store.create(&op)?;
        self.store.emit_event(name, OpEvent::Phase, &format!("created -> {}", op.phase));
        tracing::info!(operation = name, kind = %kind, "operation created");
        Ok(op)
    }

    /// File an issue for the fix/chore pollers to pick up.
    pub async fn file_issue(
        &self,
        kind: OperationKind,
        description: &str,
    ) -> Result<String, EngineError> {
        let id = self.issues.create(description, &[kind.to_string()]).await?;
        tracing::info!(issue = id, kind = %kind, "issue filed");
        Ok(id)
    }

    pub fn hold(&self, name: &str) -> Result<(), EngineError> {
        transitions::hold(self.store, name)
    }

    /// Clear hold / move a failed, interrupted, or blocked operation back
    /// to its resume phase. Returns the phase the feature worker should
    /// be restarted from.
    pub fn resume(&self, name: &str, force: bool) -> Result<Phase, EngineError> {
        transitions::resume(self.store, name, force)
    }

    /// Cancel from any non-terminal phase: phase goes to cancelled, the
    /// hosting session and its Agent die, the worktree stays for
    /// inspection until prune.
    pub async fn cancel(&self, name: &str) -> Result<(), EngineError> {
        let op = self.store.read_all(name)?;
        transitions::cancel(self.store, name)?;

        if let Some(session) = &op.tmux_session {
            if let Err(e) = self.sessions.kill(session).await {
                tracing::warn!(operation = name, session, error = %e, "session kill failed");
            }
        }
        if let Some(worktree) = &op.worktree {
            kill_agent(worktree).await;
        }
        Ok(())
    }

    /// Delete a terminal operation: agent killed (pid-validated),
    /// worktree removed, state directory removed.
    pub async fn prune(&self, name: &str) -> Result<(), EngineError> {
        let op = self.store.read_all(name)?;
        if !op.is_terminal() {
            return Err(EngineError::NotTerminal { operation: name.to_string(), phase: op.phase });
        }

        if let Some(worktree) = &op.worktree {
            kill_agent(worktree).await;
        }
        let manager = WorktreeManager::new(self.config, self.state);
        let branch = manager.branch_for(op.kind, name);
        manager.remove(&branch).await;

        self.store.emit_event(name, OpEvent::Prune, "operation pruned");
        self.store.delete(name)?;
        tracing::info!(operation = name, "operation pruned");
        Ok(())
    }

    /// Prune every terminal operation. Returns the pruned names.
    pub async fn prune_terminal(&self) -> Result<Vec<String>, EngineError> {
        let mut pruned = Vec::new();
        for name in self.store.list()? {
            let Ok(op) = self.store.read_all(&name) else {
                continue;
            };
            if op.is_terminal() {
                self.prune(&name).await?;
                pruned.push(name);
            }
        }
        Ok(pruned)
    }
}

#[cfg(test)]
#[path = "intake_tests.rs"]
mod tests;
