// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The feature worker: a one-shot, resumable state-machine driver.
//!
//! Reads the operation's current phase and runs the remaining phases in
//! order: plan session → queued → execute session → completed → enqueue
//! merge. Between phases it re-reads the document, exits cleanly when
//! held, and consults the dependency resolver; a blocked operation
//! records where to resume and parks in `blocked`. Phase mutation only
//! happens through [`crate::transitions`]; the Agent only runs through
//! [`crate::session`].

use std::path::Path;
use std::time::Duration;

use serde_json::{json, Value};
use v0_adapters::{IssueStore, SessionAdapter};
use v0_core::{Clock, OpEvent, Operation, Phase, ProjectConfig, StatePaths};
use v0_storage::{MergeQueue, OperationStore};

use crate::error::EngineError;
use crate::prompt;
use crate::resolver::Resolver;
use crate::session::{session_name, AgentRole, SessionHost, SessionOutcome, SessionSpec};
use crate::transitions;
use crate::worktree::WorktreeManager;

/// How a drive ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureOutcome {
    /// Ran to completion; a merge is enqueued
    Enqueued,
    /// Held: exited cleanly without advancing
    Held,
    /// Parked waiting on a blocker
    Blocked { on: Option<String> },
    /// A session failed; operation is `failed`
    Failed,
    /// The session died underneath us; operation is `interrupted`
    Interrupted,
    /// Nothing for this worker to do in the current phase
    NoOp,
}

pub struct FeatureWorker<'a, S, I, C> {
    config: &'a ProjectConfig,
    state: &'a StatePaths,
    store: &'a OperationStore<C>,
    queue: &'a MergeQueue,
    sessions: &'a S,
    issues: &'a I,
    poll: Duration,
}

impl<'a, S, I, C> FeatureWorker<'a, S, I, C>
where
    S: SessionAdapter,
    I: IssueStore,
    C: Clock,
{
    pub fn new(
        config: &'a ProjectConfig,
        state: &'a StatePaths,
        store: &'a OperationStore<C>,
        queue: &'a MergeQueue,
        sessions: &'a S,
        issues: &'a I,
    ) -> Self {
        Self { config, state, store, queue, sessions, issues, poll: Duration::from_secs(2) }
    }

    pub fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Drive the operation as far as it can go.
    pub async fn drive(&self, name: &str) -> Result<FeatureOutcome, EngineError> {
        loop {
            let op = self.store.read_all(name)?;

            let machine = crate::machine_name();
            if op.machine != machine {
                return Err(EngineError::WrongMachine {
                    operation: name.to_string(),
                    machine: op.machine,
                });
            }
            if op.held {
                tracing::info!(operation = name, "held, exiting without advancing");
                return Ok(FeatureOutcome::Held);
            }

            match op.phase {
                Phase::Init => {
                    if let Some(outcome) = self.run_plan(&op).await? {
                        return Ok(outcome);
                    }
                }
                Phase::Planned => {
                    if self.park_if_blocked(&op, Phase::Queued).await? {
                        return Ok(self.blocked_outcome(name).await);
                    }
                    let resolver = Resolver::new(self.issues, self.store);
                    let epic = resolver.ensure_epic(&op).await?;
                    transitions::to_queued(self.store, name, Some(&epic))?;
                }
                Phase::Queued => {
                    if self.park_if_blocked(&op, Phase::Queued).await? {
                        return Ok(self.blocked_outcome(name).await);
                    }
                    if let Some(outcome) = self.run_execute(&op).await? {
                        return Ok(outcome);
                    }
                }
                Phase::Executing => {
                    if let Some(outcome) = self.reattach(&op).await? {
                        return Ok(outcome);
                    }
                }
                Phase::Completed => {
                    self.queue.enqueue(name, self.store.clock().now_utc())?;
                    transitions::mark_merge_queued(self.store, name)?;
                    return Ok(FeatureOutcome::Enqueued);
                }
                Phase::Blocked => return Ok(self.blocked_outcome(name).await),
                // Terminal, queued for merge, or waiting on explicit
                // user action: nothing for this worker
                Phase::PendingMerge
                | Phase::Merged
                | Phase::Conflict
                | Phase::Failed
                | Phase::Interrupted
                | Phase::Cancelled => return Ok(FeatureOutcome::NoOp),
            }
        }
    }

    async fn park_if_blocked(&self, op: &Operation, resume_at: Phase) -> Result<bool, EngineError> {
        let resolver = Resolver::new(self.issues, self.store);
        if !resolver.is_blocked(op).await? {
            return Ok(false);
        }
        transitions::to_blocked(self.store, &op.name, resume_at)?;
        Ok(true)
    }

    async fn blocked_outcome(&self, name: &str) -> FeatureOutcome {
        let resolver = Resolver::new(self.issues, self.store);
        let on = match self.store.read_all(name) {
            Ok(op) => resolver.first_open_blocker(&op).await.unwrap_or(None),
            Err(_) => None,
        };
        FeatureOutcome::Blocked { on }
    }

    /// Planning session in `init`. Returns an outcome when the drive
    /// should stop, `None` to continue the loop.
    async fn run_plan(&self, op: &Operation) -> Result<Option<FeatureOutcome>, EngineError> {
        let manager = WorktreeManager::new(self.config, self.state);
        let branch = manager.branch_for(op.kind, &op.name);
        let worktree = manager.create(&branch, &self.config.develop_branch).await?;

        let plan_rel = format!("{}/{}.md", self.config.plans_dir.display(), op.name);
        let mut vars = self.base_vars(op, &branch);
        vars.insert("plan".to_string(), plan_rel.clone());

        let outcome = self
            .run_session(op, &worktree, &branch, AgentRole::Plan, prompt::interpolate(prompt::PLAN_TEMPLATE, &vars))
            .await?;

        match outcome {
            SessionOutcome::Done if worktree.join(&plan_rel).is_file() => {
                transitions::to_planned(self.store, &op.name, &plan_rel)?;
                Ok(None)
            }
            SessionOutcome::Done => {
                transitions::to_failed(self.store, &op.name, "plan session produced no plan file")?;
                Ok(Some(FeatureOutcome::Failed))
            }
            SessionOutcome::Incomplete | SessionOutcome::Fixed => {
                transitions::to_failed(self.store, &op.name, "plan session incomplete")?;
                Ok(Some(FeatureOutcome::Failed))
            }
            SessionOutcome::Unknown => {
                transitions::to_failed(self.store, &op.name, "plan session exited without signal")?;
                Ok(Some(FeatureOutcome::Failed))
            }
        }
    }

    /// Executing session in `queued`.
    async fn run_execute(&self, op: &Operation) -> Result<Option<FeatureOutcome>, EngineError> {
        let manager = WorktreeManager::new(self.config, self.state);
        let branch = manager.branch_for(op.kind, &op.name);
        let worktree = manager.create(&branch, &self.config.develop_branch).await?;

        let mut vars = self.base_vars(op, &branch);
        vars.insert(
            "plan".to_string(),
            op.plan_file.clone().unwrap_or_else(|| "the operation prompt".to_string()),
        );

        let session = session_name(&self.config.project, &op.name, op.kind);
        transitions::to_executing(self.store, &op.name, &session)?;

        let outcome = self
            .run_session(
                op,
                &worktree,
                &branch,
                AgentRole::Execute,
                prompt::interpolate(prompt::EXECUTE_TEMPLATE, &vars),
            )
            .await?;

        match outcome {
            SessionOutcome::Done | SessionOutcome::Fixed => {
                transitions::to_completed(self.store, &op.name)?;
                Ok(None)
            }
            SessionOutcome::Incomplete => {
                transitions::to_failed(self.store, &op.name, "agent reported incomplete")?;
                Ok(Some(FeatureOutcome::Failed))
            }
            SessionOutcome::Unknown => self.interrupt_or_accept(&op.name),
        }
    }

    /// A session ended without an outcome signal: normally interrupted,
    /// but the nudger may have already failed the operation off an
    /// errored journal while we waited on the session. Its verdict
    /// stands.
    fn interrupt_or_accept(&self, name: &str) -> Result<Option<FeatureOutcome>, EngineError> {
        if self.store.read_all(name)?.phase == Phase::Failed {
            return Ok(Some(FeatureOutcome::Failed));
        }
        transitions::to_interrupted(self.store, name)?;
        Ok(Some(FeatureOutcome::Interrupted))
    }

    /// Re-entered with a session already executing (worker restart).
    async fn reattach(&self, op: &Operation) -> Result<Option<FeatureOutcome>, EngineError> {
        let live = match &op.tmux_session {
            Some(session) => self.sessions.is_live(session).await,
            None => false,
        };
        if !live {
            return self.interrupt_or_accept(&op.name);
        }
        // Wait the running session out, then evaluate like run_execute
        let session = op.tmux_session.clone().unwrap_or_default();
        self.sessions.wait_exit(&session, self.poll).await;
        let manager = WorktreeManager::new(self.config, self.state);
        let worktree = manager.path_for(&manager.branch_for(op.kind, &op.name));

        match crate::session::read_worktree_outcome(&worktree) {
            SessionOutcome::Done | SessionOutcome::Fixed => {
                transitions::to_completed(self.store, &op.name)?;
                Ok(None)
            }
            SessionOutcome::Incomplete => {
                transitions::to_failed(self.store, &op.name, "agent reported incomplete")?;
                Ok(Some(FeatureOutcome::Failed))
            }
            SessionOutcome::Unknown => self.interrupt_or_accept(&op.name),
        }
    }

    async fn run_session(
        &self,
        op: &Operation,
        worktree: &Path,
        branch: &str,
        role: AgentRole,
        prompt: String,
    ) -> Result<SessionOutcome, EngineError> {
        let session = session_name(&self.config.project, &op.name, op.kind);
        let host = SessionHost::new(self.config, self.state, self.sessions).with_poll(self.poll);

        self.store.update(&op.name, "tmux_session", json!(session))?;
        self.store.emit_event(&op.name, OpEvent::SessionStart, &format!("{role:?} in {session}"));

        let spec = SessionSpec {
            session,
            operation: op.name.clone(),
            worktree: worktree.to_path_buf(),
            branch: branch.to_string(),
            prompt,
            role,
        };
        let outcome = host.run(&spec).await?;

        self.store.update(&op.name, "tmux_session", Value::Null)?;
        self.store.emit_event(&op.name, OpEvent::SessionEnd, &format!("{outcome:?}"));
        Ok(outcome)
    }

    fn base_vars(
        &self,
        op: &Operation,
        branch: &str,
    ) -> std::collections::HashMap<String, String> {
        let mut vars = std::collections::HashMap::new();
        vars.insert("operation".to_string(), op.name.clone());
        vars.insert("kind".to_string(), op.kind.to_string());
        vars.insert("repo".to_string(), self.config.project.clone());
        vars.insert("remote".to_string(), self.config.git_remote.clone());
        vars.insert("develop".to_string(), self.config.develop_branch.clone());
        vars.insert("branch".to_string(), branch.to_string());
        vars.insert("prompt".to_string(), op.prompt.clone());
        vars
    }
}

#[cfg(test)]
#[path = "feature_tests.rs"]
mod tests;
