// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fix/chore pollers.
//!
//! One long-running daemon per {project, kind}, enforced by an exclusive
//! advisory lock on a per-kind pid file; a second start observes the
//! lock and exits cleanly. Each cycle dispatches at most one ready issue
//! into a short-lived agent session; back-pressure is natural because
//! the next cycle sees the session still live and sleeps.

use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use v0_adapters::{Issue, IssueState, IssueStore, SessionAdapter};
use v0_core::{Clock, OpEvent, Operation, OperationKind, Phase, ProjectConfig, StatePaths};
use v0_storage::{MergeQueue, OperationStore, PidFile};

use crate::error::EngineError;
use crate::git;
use crate::prompt;
use crate::session::{worker_session_name, AgentRole, SessionHost, SessionSpec};
use crate::transitions;
use crate::worktree::WorktreeManager;

/// Default cycle sleep.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Assignee used when an issue needs a human decision.
pub const HUMAN_ROLE: &str = "human";

/// What one poll cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A worker session is still running; backed off
    Busy,
    /// No ready issue
    Idle,
    /// Ran a session; the issue's branch is enqueued for merge
    MergeEnqueued { issue: String },
    /// Session left a note but no commits; handed to a human
    Reassigned { issue: String },
    /// Session produced neither commits nor a note
    Failed { issue: String },
}

pub struct IssuePoller<'a, S, I, C> {
    config: &'a ProjectConfig,
    state: &'a StatePaths,
    store: &'a OperationStore<C>,
    queue: &'a MergeQueue,
    sessions: &'a S,
    issues: &'a I,
    kind: OperationKind,
    interval: Duration,
    session_poll: Duration,
}

impl<'a, S, I, C> IssuePoller<'a, S, I, C>
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
        kind: OperationKind,
    ) -> Self {
        Self {
            config,
            state,
            store,
            queue,
            sessions,
            issues,
            kind,
            interval: POLL_INTERVAL,
            session_poll: Duration::from_secs(2),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_session_poll(mut self, poll: Duration) -> Self {
        self.session_poll = poll;
        self
    }

    /// Run until cancelled. Returns false immediately (exit 0) when
    /// another poller of this kind already holds the singleton lock.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<bool, EngineError> {
        let pid_path = self.state.worker_pid(self.kind);
        let Some(pid_file) = PidFile::acquire(&pid_path)? else {
            tracing::info!(kind = %self.kind, "poller already running, exiting");
            return Ok(false);
        };
        tracing::info!(kind = %self.kind, project = self.config.project, "poller started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {
                    match self.run_cycle().await {
                        Ok(outcome) => {
                            tracing::debug!(kind = %self.kind, ?outcome, "poll cycle");
                        }
                        // Transient store/CLI failures: log, retry next cycle
                        Err(e) => {
                            tracing::warn!(kind = %self.kind, error = %e, "poll cycle failed");
                        }
                    }
                }
            }
        }

        // In-flight sessions end on their own or via the nudger; the
        // lock and pid file must go now
        pid_file.release()?;
        tracing::info!(kind = %self.kind, "poller stopped");
        Ok(true)
    }

    /// One poll cycle: dispatch the oldest ready issue, if any.
    pub async fn run_cycle(&self) -> Result<PollOutcome, EngineError> {
        let session = worker_session_name(&self.config.project, self.kind);
        if self.sessions.is_live(&session).await {
            return Ok(PollOutcome::Busy);
        }

        let Some(issue) = self.issues.next_ready(self.kind.as_str()).await? else {
            return Ok(PollOutcome::Idle);
        };

        self.dispatch(&session, issue).await
    }

    async fn dispatch(&self, session: &str, issue: Issue) -> Result<PollOutcome, EngineError> {
        let notes_before = issue.notes.len();
        self.issues.set_status(&issue.id, IssueState::InProgress).await?;
        self.issues.assign(&issue.id, "agent").await?;

        let manager = WorktreeManager::new(self.config, self.state);
        let branch = manager.branch_for(self.kind, &issue.id);
        let worktree = manager.create(&branch, &self.config.develop_branch).await?;

        self.ensure_issue_operation(&issue, &worktree, session)?;
        self.store.update(&issue.id, "tmux_session", json!(session))?;
        self.store.emit_event(&issue.id, OpEvent::SessionStart, &format!("{session}"));

        let template = match self.kind {
            OperationKind::Chore => prompt::CHORE_TEMPLATE,
            _ => prompt::FIX_TEMPLATE,
        };
        let mut vars = std::collections::HashMap::new();
        vars.insert("issue".to_string(), issue.id.clone());
        vars.insert("repo".to_string(), self.config.project.clone());
        vars.insert("branch".to_string(), branch.clone());

        let host =
            SessionHost::new(self.config, self.state, self.sessions).with_poll(self.session_poll);
        let spec = SessionSpec {
            session: session.to_string(),
            operation: issue.id.clone(),
            worktree: worktree.clone(),
            branch: branch.clone(),
            prompt: prompt::interpolate(template, &vars),
            role: if self.kind == OperationKind::Chore { AgentRole::Chore } else { AgentRole::Fix },
        };
        let outcome = host.run(&spec).await?;

        self.store.update(&issue.id, "tmux_session", Value::Null)?;
        self.store.emit_event(&issue.id, OpEvent::SessionEnd, &format!("{outcome:?}"));

        // The nudger may have failed the operation off an errored
        // journal while the session ran; its verdict stands and the
        // issue stays in_progress for a human
        if self.store.read_all(&issue.id)?.phase == Phase::Failed {
            return Ok(PollOutcome::Failed { issue: issue.id });
        }

        // Commits are the ground truth, whatever the outcome scripts say
        let has_commits = git::has_commits_ahead(&worktree, &self.config.develop_branch)
            .await
            .unwrap_or(false);

        if has_commits {
            // The fixed script normally pushed already; pushing again is
            // a no-op, and covers agents that commit but die before
            // signalling
            if let Err(e) = git::push(&worktree, &self.config.git_remote, &branch).await {
                tracing::warn!(issue = issue.id, error = %e, "branch push failed");
            }
            transitions::to_completed(self.store, &issue.id)?;
            self.queue.enqueue(&issue.id, self.store.clock().now_utc())?;
            transitions::mark_merge_queued(self.store, &issue.id)?;
            return Ok(PollOutcome::MergeEnqueued { issue: issue.id });
        }

        let notes_after =
            self.issues.show(&issue.id).await.map(|i| i.notes.len()).unwrap_or(notes_before);
        if notes_after > notes_before {
            // Worker-produced-note-without-commits: a human has to look;
            // the issue stays in_progress and is never auto-closed
            self.issues.assign(&issue.id, HUMAN_ROLE).await?;
            transitions::to_failed(self.store, &issue.id, "note left for human review")?;
            return Ok(PollOutcome::Reassigned { issue: issue.id });
        }

        transitions::to_failed(self.store, &issue.id, "session produced no commits")?;
        self.store.emit_event(&issue.id, OpEvent::Error, "no commits and no note");
        Ok(PollOutcome::Failed { issue: issue.id })
    }

    /// Issue operations get a state document so the merge daemon can run
    /// its readiness checks against them like any feature. Created
    /// directly in `executing`; there is no planning for issue work.
    fn ensure_issue_operation(
        &self,
        issue: &Issue,
        worktree: &std::path::Path,
        session: &str,
    ) -> Result<(), EngineError> {
        if self.store.exists(&issue.id) {
            // Re-dispatch after a failure: back to executing through the
            // resume path so the guards stay honest
            let op = self.store.read_all(&issue.id)?;
            if op.phase == Phase::Failed || op.phase == Phase::Interrupted {
                transitions::resume(self.store, &issue.id, false)?;
            }
            if self.store.read_all(&issue.id)?.phase != Phase::Executing {
                transitions::to_executing(self.store, &issue.id, session)?;
            }
            self.store.update(&issue.id, "worktree", json!(worktree))?;
            return Ok(());
        }

        let mut op = Operation::new(
            &issue.id,
            self.kind,
            &issue.title,
            crate::machine_name(),
            self.store.clock(),
        );
        op.phase = Phase::Executing;
        op.epic_id = Some(issue.id.clone());
        op.worktree = Some(worktree.to_path_buf());
        self.store.create(&op)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;
