// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Guarded phase transitions.
//!
//! The only way any component mutates an operation's phase. Every
//! function checks the legal-transitions table first, writes the phase
//! and its associated fields in one bulk update, and emits exactly one
//! event. Illegal transitions return an error without touching state.

use chrono::SecondsFormat;
use serde_json::{json, Value};
use v0_core::{Clock, OpEvent, Operation, Phase};
use v0_storage::OperationStore;

use crate::error::EngineError;

fn guarded<C: Clock>(
    store: &OperationStore<C>,
    name: &str,
    to: Phase,
) -> Result<Operation, EngineError> {
    let op = store.read_all(name)?;
    op.phase.guard(to)?;
    Ok(op)
}

fn stamp<C: Clock>(store: &OperationStore<C>) -> Value {
    json!(store.clock().now_utc().to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// init → planned, recording the plan file the planning session wrote.
pub fn to_planned<C: Clock>(
    store: &OperationStore<C>,
    name: &str,
    plan_file: &str,
) -> Result<(), EngineError> {
    let op = guarded(store, name, Phase::Planned)?;
    store.bulk_update(
        name,
        [("phase", json!("planned")), ("plan_file", json!(plan_file))],
    )?;
    store.emit_event(name, OpEvent::Phase, &format!("{} -> planned", op.phase));
    Ok(())
}

/// → queued, stamping the epic id that now tracks the operation.
pub fn to_queued<C: Clock>(
    store: &OperationStore<C>,
    name: &str,
    epic_id: Option<&str>,
) -> Result<(), EngineError> {
    let op = guarded(store, name, Phase::Queued)?;
    let mut changes = vec![("phase", json!("queued"))];
    if let Some(epic) = epic_id {
        changes.push(("epic_id", json!(epic)));
    }
    store.bulk_update(name, changes)?;
    store.emit_event(name, OpEvent::Phase, &format!("{} -> queued", op.phase));
    Ok(())
}

/// → executing, recording the hosting session.
pub fn to_executing<C: Clock>(
    store: &OperationStore<C>,
    name: &str,
    tmux_session: &str,
) -> Result<(), EngineError> {
    let op = guarded(store, name, Phase::Executing)?;
    store.bulk_update(
        name,
        [("phase", json!("executing")), ("tmux_session", json!(tmux_session))],
    )?;
    store.emit_event(name, OpEvent::Phase, &format!("{} -> executing", op.phase));
    Ok(())
}

/// executing → completed; the session is gone, the branch has the work.
pub fn to_completed<C: Clock>(store: &OperationStore<C>, name: &str) -> Result<(), EngineError> {
    let op = guarded(store, name, Phase::Completed)?;
    store.bulk_update(
        name,
        [
            ("phase", json!("completed")),
            ("completed_at", stamp(store)),
            ("tmux_session", Value::Null),
        ],
    )?;
    store.emit_event(name, OpEvent::Phase, &format!("{} -> completed", op.phase));
    Ok(())
}

/// completed/conflict → pending_merge; the daemon has claimed the entry.
pub fn to_pending_merge<C: Clock>(
    store: &OperationStore<C>,
    name: &str,
) -> Result<(), EngineError> {
    let op = guarded(store, name, Phase::PendingMerge)?;
    store.bulk_update(
        name,
        [("phase", json!("pending_merge")), ("merge_status", json!("processing"))],
    )?;
    store.emit_event(name, OpEvent::Phase, &format!("{} -> pending_merge", op.phase));
    Ok(())
}

/// pending_merge → merged (terminal).
pub fn to_merged<C: Clock>(store: &OperationStore<C>, name: &str) -> Result<(), EngineError> {
    let op = guarded(store, name, Phase::Merged)?;
    store.bulk_update(
        name,
        [
            ("phase", json!("merged")),
            ("merged_at", stamp(store)),
            ("merge_status", json!("merged")),
            ("merge_queued", json!(false)),
        ],
    )?;
    store.emit_event(name, OpEvent::Merge, &format!("{} -> merged", op.phase));
    Ok(())
}

/// pending_merge → conflict; the queue moves on without us.
pub fn to_conflict<C: Clock>(store: &OperationStore<C>, name: &str) -> Result<(), EngineError> {
    let op = guarded(store, name, Phase::Conflict)?;
    store.bulk_update(
        name,
        [("phase", json!("conflict")), ("merge_status", json!("conflict"))],
    )?;
    store.emit_event(name, OpEvent::Conflict, &format!("{} -> conflict", op.phase));
    Ok(())
}

/// → failed, with the reason in the event log.
pub fn to_failed<C: Clock>(
    store: &OperationStore<C>,
    name: &str,
    reason: &str,
) -> Result<(), EngineError> {
    let op = guarded(store, name, Phase::Failed)?;
    store.bulk_update(name, [("phase", json!("failed")), ("tmux_session", Value::Null)])?;
    store.emit_event(name, OpEvent::Phase, &format!("{} -> failed: {reason}", op.phase));
    Ok(())
}

/// executing → interrupted; the session died underneath the worker.
pub fn to_interrupted<C: Clock>(store: &OperationStore<C>, name: &str) -> Result<(), EngineError> {
    let op = guarded(store, name, Phase::Interrupted)?;
    store.bulk_update(
        name,
        [("phase", json!("interrupted")), ("tmux_session", Value::Null)],
    )?;
    store.emit_event(name, OpEvent::Phase, &format!("{} -> interrupted", op.phase));
    Ok(())
}

/// → blocked, recording where to resume once the blocker merges.
pub fn to_blocked<C: Clock>(
    store: &OperationStore<C>,
    name: &str,
    blocked_phase: Phase,
) -> Result<(), EngineError> {
    let op = guarded(store, name, Phase::Blocked)?;
    store.bulk_update(
        name,
        [("phase", json!("blocked")), ("blocked_phase", json!(blocked_phase))],
    )?;
    store.emit_event(
        name,
        OpEvent::Phase,
        &format!("{} -> blocked (resume at {blocked_phase})", op.phase),
    );
    Ok(())
}

/// blocked → its stored resume phase; clears the dependency edge.
pub fn unblock<C: Clock>(store: &OperationStore<C>, name: &str) -> Result<Phase, EngineError> {
    let op = store.read_all(name)?;
    let target = op.blocked_phase.unwrap_or(Phase::Init);
    if op.phase != Phase::Blocked {
        return Err(EngineError::Phase(v0_core::PhaseError::IllegalTransition {
            from: op.phase,
            to: target,
        }));
    }
    op.phase.guard(target)?;
    store.bulk_update(
        name,
        [
            ("phase", json!(target)),
            ("after", Value::Null),
            ("blocked_phase", Value::Null),
        ],
    )?;
    store.emit_event(name, OpEvent::Unblocked, &format!("blocked -> {target}"));
    Ok(target)
}

/// cancel from any non-terminal phase; clears hold, kills nothing here;
/// session/process teardown is the caller's job.
pub fn cancel<C: Clock>(store: &OperationStore<C>, name: &str) -> Result<(), EngineError> {
    let op = guarded(store, name, Phase::Cancelled)?;
    store.bulk_update(
        name,
        [
            ("phase", json!("cancelled")),
            ("cancelled_at", stamp(store)),
            ("held", json!(false)),
            ("held_at", Value::Null),
            ("tmux_session", Value::Null),
        ],
    )?;
    store.emit_event(name, OpEvent::Cancel, &format!("{} -> cancelled", op.phase));
    Ok(())
}

/// Set the hold flag. Not a phase transition: schedulers check the flag
/// between phases and exit without advancing.
pub fn hold<C: Clock>(store: &OperationStore<C>, name: &str) -> Result<(), EngineError> {
    let op = store.read_all(name)?;
    if op.is_terminal() {
        return Err(EngineError::Phase(v0_core::PhaseError::IllegalTransition {
            from: op.phase,
            to: op.phase,
        }));
    }
    if op.held {
        return Ok(());
    }
    store.bulk_update(name, [("held", json!(true)), ("held_at", stamp(store))])?;
    store.emit_event(name, OpEvent::Hold, "user hold");
    Ok(())
}

/// Clear the hold flag and, for failed/interrupted operations, move back
/// to the computed resume phase. Returns the phase the operation is left
/// in.
pub fn resume<C: Clock>(
    store: &OperationStore<C>,
    name: &str,
    force: bool,
) -> Result<Phase, EngineError> {
    let op = store.read_all(name)?;
    let mut changes: Vec<(&str, Value)> = Vec::new();
    if op.held {
        changes.push(("held", json!(false)));
        changes.push(("held_at", Value::Null));
    }
    if force {
        changes.push(("ignore_blockers", json!(true)));
    }

    let target = match op.phase {
        Phase::Failed | Phase::Interrupted | Phase::Blocked => {
            let target = op.resume_phase();
            op.phase.guard(target)?;
            changes.push(("phase", json!(target)));
            if op.phase == Phase::Blocked {
                changes.push(("after", Value::Null));
                changes.push(("blocked_phase", Value::Null));
            }
            target
        }
        // A held operation resumes in place; anything else is a no-op
        phase if !phase.is_terminal() => phase,
        phase => {
            return Err(EngineError::Phase(v0_core::PhaseError::IllegalTransition {
                from: phase,
                to: phase,
            }))
        }
    };

    if !changes.is_empty() {
        store.bulk_update(name, changes)?;
    }
    store.emit_event(name, OpEvent::Resume, &format!("resume at {target}"));
    Ok(target)
}

/// Record that the operation has been handed to the merge queue.
pub fn mark_merge_queued<C: Clock>(
    store: &OperationStore<C>,
    name: &str,
) -> Result<(), EngineError> {
    store.bulk_update(
        name,
        [("merge_queued", json!(true)), ("merge_status", json!("pending"))],
    )?;
    store.emit_event(name, OpEvent::MergeQueued, "enqueued for merge");
    Ok(())
}

#[cfg(test)]
#[path = "transitions_tests.rs"]
mod tests;
