// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency resolution.
//!
//! Dependencies exist at two levels that must agree: `after` on the
//! dependent operation (with `blocked_phase` for resume), and a
//! blocked-by edge between the two operations' epics in the issue
//! store. The issue store is the authoritative runtime source for
//! blocker queries; the operation-level edge is the fallback while an
//! epic does not exist yet.

use v0_core::{Clock, Operation, Phase};
use v0_storage::OperationStore;

use v0_adapters::IssueStore;

use crate::error::EngineError;
use crate::transitions;

/// Label tying an epic back to its operation.
pub fn plan_label(operation: &str) -> String {
    format!("plan:{operation}")
}

pub struct Resolver<'a, I, C> {
    issues: &'a I,
    store: &'a OperationStore<C>,
}

/// A dependent freed by a blocker's merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unblocked {
    pub name: String,
    pub phase: Phase,
    /// Held dependents are not restarted automatically
    pub held: bool,
}

impl<'a, I: IssueStore, C: Clock> Resolver<'a, I, C> {
    pub fn new(issues: &'a I, store: &'a OperationStore<C>) -> Self {
        Self { issues, store }
    }

    /// Create the operation's epic if it has none, mirroring any `after`
    /// edge into the issue store. Returns the epic id.
    pub async fn ensure_epic(&self, op: &Operation) -> Result<String, EngineError> {
        if let Some(epic) = &op.epic_id {
            return Ok(epic.clone());
        }

        let labels = vec![plan_label(&op.name), op.kind.to_string()];
        let epic = self.issues.create(&op.name, &labels).await?;

        if let Some(after) = &op.after {
            // Mirror the operation-level edge; tolerate a blocker that
            // has no epic yet (the operation-level check still holds)
            if let Ok(blocker) = self.store.read_all(after) {
                if let Some(blocker_epic) = blocker.epic_id {
                    self.issues.add_blocker(&epic, &blocker_epic).await?;
                }
            }
        }

        tracing::info!(operation = op.name, epic, "epic created");
        Ok(epic)
    }

    /// Whether the operation must wait. `ignore_blockers` (set by
    /// `resume --force`) short-circuits to false.
    pub async fn is_blocked(&self, op: &Operation) -> Result<bool, EngineError> {
        if op.ignores_blockers() {
            return Ok(false);
        }
        if let Some(epic) = &op.epic_id {
            let issue = self.issues.show(epic).await?;
            for blocker in &issue.blockers {
                if self.issues.show(blocker).await.map(|b| b.status.is_open()).unwrap_or(false) {
                    return Ok(true);
                }
            }
            // The store is authoritative once an epic exists
            return Ok(false);
        }
        if let Some(after) = &op.after {
            return Ok(match self.store.read_all(after) {
                Ok(blocker) => blocker.phase != Phase::Merged,
                // A vanished blocker no longer blocks anyone
                Err(v0_storage::StoreError::NotFound(_)) => false,
                Err(e) => return Err(e.into()),
            });
        }
        Ok(false)
    }

    /// Human-friendly name of the first open blocker: the operation name
    /// when the blocker carries a `plan:` label, else the raw issue id.
    pub async fn first_open_blocker(&self, op: &Operation) -> Result<Option<String>, EngineError> {
        if let Some(epic) = &op.epic_id {
            let issue = self.issues.show(epic).await?;
            for blocker_id in &issue.blockers {
                let Ok(blocker) = self.issues.show(blocker_id).await else {
                    continue;
                };
                if blocker.status.is_open() {
                    let display = blocker
                        .plan_label()
                        .map(str::to_string)
                        .unwrap_or_else(|| blocker_id.clone());
                    return Ok(Some(display));
                }
            }
            return Ok(None);
        }
        Ok(op.after.clone())
    }

    /// Free every operation waiting on `merged_name`: phase moves to its
    /// stored `blocked_phase`, the `after` edge is cleared. Callers
    /// respawn the feature worker for entries that are not held.
    pub async fn unblock_dependents(
        &self,
        merged_name: &str,
    ) -> Result<Vec<Unblocked>, EngineError> {
        let mut freed = Vec::new();
        for name in self.store.list()? {
            let op = match self.store.read_all(&name) {
                Ok(op) => op,
                Err(e) => {
                    tracing::warn!(operation = name, error = %e, "skipping unreadable operation");
                    continue;
                }
            };
            if op.phase != Phase::Blocked || op.after.as_deref() != Some(merged_name) {
                continue;
            }
            let phase = transitions::unblock(self.store, &name)?;
            freed.push(Unblocked { name, phase, held: op.held });
        }
        Ok(freed)
    }

    /// Close the operation's epic after merge.
    pub async fn close_epic(&self, op: &Operation) -> Result<(), EngineError> {
        if let Some(epic) = &op.epic_id {
            self.issues.set_status(epic, v0_adapters::IssueState::Closed).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
