// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The merge queue daemon.
//!
//! Single-writer integrator: the only component that mutates the develop
//! branch. Entries are processed in enqueue order, but a conflicting or
//! not-yet-ready entry is skipped rather than blocking the queue; the
//! queue makes progress as long as some operations merge cleanly.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use v0_adapters::{IssueStore, NotifyAdapter, SessionAdapter};
use v0_core::{Clock, Operation, Phase, ProjectConfig, StatePaths};
use v0_storage::{EntryStatus, LockedFile, MergeQueue, OperationStore, PidFile, QueueEntry, QUEUE_RETENTION};

use crate::error::EngineError;
use crate::resolver::{plan_label, Resolver};
use crate::transitions;
use crate::workspace::{MergeAttempt, MergeWorkspace};
use crate::worktree::WorktreeManager;

/// Cycle sleep between queue scans.
pub const MERGE_INTERVAL: Duration = Duration::from_secs(5);

/// What one daemon cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No pending entries
    Idle,
    /// Number of entries acted on (merged, conflicted, requeued, failed)
    Processed(usize),
}

pub struct MergeDaemon<'a, S, I, N, C> {
    config: &'a ProjectConfig,
    state: &'a StatePaths,
    store: &'a OperationStore<C>,
    queue: &'a MergeQueue,
    sessions: &'a S,
    issues: &'a I,
    notifier: &'a N,
    interval: Duration,
    /// Spawn detached feature workers for freed dependents. Off in
    /// tests, where nothing should fork.
    spawn_workers: bool,
}

impl<'a, S, I, N, C> MergeDaemon<'a, S, I, N, C>
where
    S: SessionAdapter,
    I: IssueStore,
    N: NotifyAdapter,
    C: Clock,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &'a ProjectConfig,
        state: &'a StatePaths,
        store: &'a OperationStore<C>,
        queue: &'a MergeQueue,
        sessions: &'a S,
        issues: &'a I,
        notifier: &'a N,
    ) -> Self {
        Self {
            config,
            state,
            store,
            queue,
            sessions,
            issues,
            notifier,
            interval: MERGE_INTERVAL,
            spawn_workers: true,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn without_worker_spawning(mut self) -> Self {
        self.spawn_workers = false;
        self
    }

    /// Run until cancelled. Returns false when another daemon already
    /// holds the singleton.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<bool, EngineError> {
        let Some(pid_file) = PidFile::acquire(&self.state.mergeq_pid())? else {
            tracing::info!("merge daemon already running, exiting");
            return Ok(false);
        };
        // Second lock: the queue processor itself. Enqueuers take the
        // queue-file lock; only this daemon takes this one.
        let build = self.store.paths();
        let Some(_processor) = LockedFile::try_exclusive(&build.queue_processor_lock())? else {
            tracing::warn!("queue processor lock held elsewhere, exiting");
            pid_file.release()?;
            return Ok(false);
        };
        tracing::info!(project = self.config.project, "merge daemon started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {
                    match self.run_cycle().await {
                        Ok(outcome) => {
                            tracing::debug!(?outcome, "merge cycle");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "merge cycle failed");
                        }
                    }
                }
            }
        }

        pid_file.release()?;
        tracing::info!("merge daemon stopped");
        Ok(true)
    }

    /// Process every pending entry once, in enqueue order.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, EngineError> {
        let now = self.store.clock().now_utc();
        let pending: Vec<QueueEntry> = self
            .queue
            .entries()?
            .into_iter()
            .filter(|e| e.status == EntryStatus::Pending)
            .collect();

        if pending.is_empty() {
            self.queue.prune(QUEUE_RETENTION, now)?;
            return Ok(CycleOutcome::Idle);
        }

        // A queue with work gets a healthy workspace first; recreation
        // happens here rather than mid-merge
        let workspace = MergeWorkspace::new(self.config, self.state);
        workspace.ensure().await?;

        let mut acted = 0;
        for entry in pending {
            self.queue.mark(entry.seq, EntryStatus::Processing, None, self.store.clock().now_utc())?;
            if let Err(e) = self.process(&workspace, &entry).await {
                // Transient failure: put the entry back for next cycle
                tracing::warn!(operation = entry.operation, error = %e, "merge attempt failed");
                self.queue.requeue(entry.seq, &e.to_string(), self.store.clock().now_utc())?;
            }
            acted += 1;
        }

        self.queue.prune(QUEUE_RETENTION, self.store.clock().now_utc())?;
        Ok(CycleOutcome::Processed(acted))
    }

    async fn process(
        &self,
        workspace: &MergeWorkspace<'_>,
        entry: &QueueEntry,
    ) -> Result<(), EngineError> {
        let name = &entry.operation;
        let now = || self.store.clock().now_utc();

        let op = match self.store.read_all(name) {
            Ok(op) => op,
            Err(v0_storage::StoreError::NotFound(_)) => {
                self.queue.mark(entry.seq, EntryStatus::Failed, Some("operation not found"), now())?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let manager = WorktreeManager::new(self.config, self.state);
        let branch = manager.branch_for(op.kind, name);

        if let Some(reason) = self.not_ready_reason(&op, &manager, &branch).await? {
            let worktree_missing = !manager.path_for(&branch).is_dir();
            if worktree_missing && !workspace.branch_recoverable(&branch).await {
                // Never going to become ready: no worktree, no branch
                self.queue.mark(entry.seq, EntryStatus::Failed, Some(&reason), now())?;
                let _ = transitions::to_failed(self.store, name, &reason);
            } else {
                self.queue.requeue(entry.seq, &reason, now())?;
            }
            return Ok(());
        }

        if op.phase == Phase::Completed {
            transitions::to_pending_merge(self.store, name)?;
        } else {
            // Re-enqueued after conflict resolution: already pending_merge
            self.store.update(name, "merge_status", serde_json::json!("processing"))?;
        }

        match workspace.merge_branch(&branch).await? {
            MergeAttempt::Merged => {
                transitions::to_merged(self.store, name)?;
                self.queue.mark(entry.seq, EntryStatus::Completed, None, now())?;

                let resolver = Resolver::new(self.issues, self.store);
                if let Err(e) = resolver.close_epic(&op).await {
                    tracing::warn!(operation = name, error = %e, "epic close failed");
                }
                manager.remove(&branch).await;
                self.unblock_dependents(name).await?;
                tracing::info!(operation = name, branch, "merged");
            }
            MergeAttempt::Conflict => {
                transitions::to_conflict(self.store, name)?;
                self.queue.mark(entry.seq, EntryStatus::Conflict, None, now())?;
                let _ = self
                    .notifier
                    .notify(
                        "v0 merge conflict",
                        &format!("operation {name} conflicts with {}", self.config.develop_branch),
                    )
                    .await;
                tracing::warn!(operation = name, branch, "merge conflict, queue continues");
            }
        }
        Ok(())
    }

    /// Why the entry cannot merge yet, if anything.
    async fn not_ready_reason(
        &self,
        op: &Operation,
        manager: &WorktreeManager<'_>,
        branch: &str,
    ) -> Result<Option<String>, EngineError> {
        if op.held {
            return Ok(Some("operation is held".to_string()));
        }
        if !matches!(op.phase, Phase::Completed | Phase::PendingMerge) {
            return Ok(Some(format!("phase is {}", op.phase)));
        }
        if !manager.path_for(branch).is_dir() {
            return Ok(Some("worktree missing".to_string()));
        }
        if let Some(session) = &op.tmux_session {
            if self.sessions.is_live(session).await {
                return Ok(Some(format!("session {session} still live")));
            }
        }
        // Plan sub-issues (labelled plan:<name>) must all be closed;
        // the operation's own epic carries the same label and is exempt
        let open_plan_issue = self
            .issues
            .list_with_label(&plan_label(&op.name))
            .await?
            .into_iter()
            .find(|issue| Some(&issue.id) != op.epic_id.as_ref() && issue.status.is_open());
        if let Some(issue) = open_plan_issue {
            return Ok(Some(format!("plan issue {} still open", issue.id)));
        }
        Ok(None)
    }

    /// Free dependents of a merged operation and restart their workers.
    async fn unblock_dependents(&self, merged: &str) -> Result<(), EngineError> {
        let resolver = Resolver::new(self.issues, self.store);
        for freed in resolver.unblock_dependents(merged).await? {
            if freed.held {
                tracing::info!(operation = freed.name, "unblocked but held, not restarting");
                continue;
            }
            tracing::info!(operation = freed.name, phase = %freed.phase, "unblocked");
            if self.spawn_workers {
                spawn_feature_worker(&freed.name);
            }
        }
        Ok(())
    }
}

/// Spawn a detached feature worker process for an unblocked operation.
///
/// The daemon must not drive long agent sessions inline; a dependent's
/// whole build would block the queue. The worker is its own process,
/// coordinated through the state files like every other component.
fn spawn_feature_worker(name: &str) {
    let Ok(exe) = std::env::current_exe() else {
        tracing::warn!(operation = name, "cannot locate own binary to spawn worker");
        return;
    };
    match std::process::Command::new(exe)
        .args(["feature-worker", name])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
    {
        Ok(child) => {
            tracing::info!(operation = name, pid = child.id(), "feature worker spawned");
        }
        Err(e) => {
            tracing::warn!(operation = name, error = %e, "feature worker spawn failed");
        }
    }
}

#[cfg(test)]
#[path = "mergeq_tests.rs"]
mod tests;
