// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Display-status derivation.
//!
//! The single place status strings come from. UIs (status tables, watch
//! views, notifications) render the tuple produced here and never inspect
//! phases or queue statuses themselves.

use crate::operation::{MergeStatus, Operation, OperationKind};
use crate::phase::Phase;

/// Colour hint for terminals; callers map these to their own palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorHint {
    Cyan,
    Yellow,
    Red,
    Green,
    Magenta,
    Blue,
    Gray,
    Default,
}

/// One renderable status row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub label: &'static str,
    pub color: ColorHint,
    pub icon: String,
}

fn line(label: &'static str, color: ColorHint, icon: impl Into<String>) -> StatusLine {
    StatusLine { label, color, icon: icon.into() }
}

/// Derive the display status for an operation.
///
/// `session_alive` is whether the operation's recorded tmux session is
/// currently live; callers that cannot know (e.g. `status --all` across
/// hosts) pass false.
pub fn display_status(op: &Operation, session_alive: bool) -> StatusLine {
    // Terminal phases and conflicts win over everything else
    match op.phase {
        Phase::Cancelled => return line("cancelled", ColorHint::Gray, "[cancelled]"),
        Phase::Merged => return line("merged", ColorHint::Green, "[merged]"),
        Phase::Conflict => return line("conflict", ColorHint::Red, "== CONFLICT =="),
        _ => {}
    }
    if op.merge_status == Some(MergeStatus::Conflict) {
        return line("conflict", ColorHint::Red, "== CONFLICT ==");
    }

    if op.held {
        return line("held", ColorHint::Magenta, "[held]");
    }

    match op.phase {
        Phase::Failed => line("failed", ColorHint::Red, "[failed]"),
        Phase::Interrupted => line("interrupted", ColorHint::Red, "[interrupted]"),
        Phase::Blocked => match &op.after {
            Some(after) => line("blocked", ColorHint::Yellow, format!("[waiting: {after}]")),
            None => line("blocked", ColorHint::Yellow, "[waiting]"),
        },
        Phase::Executing if session_alive => {
            line("assigned", ColorHint::Cyan, kind_icon(op.kind))
        }
        // Session gone but phase says running: the nudger or reconciler
        // has not caught up yet
        Phase::Executing => line("stalled", ColorHint::Yellow, "[stalled]"),
        Phase::PendingMerge => match op.merge_status {
            Some(MergeStatus::Processing) => line("merging", ColorHint::Blue, "[merging]"),
            _ => line("merging", ColorHint::Blue, "[merge queued]"),
        },
        Phase::Completed if op.merge_queued => line("merging", ColorHint::Blue, "[merge queued]"),
        Phase::Completed => line("completed", ColorHint::Green, "[done]"),
        Phase::Queued => line("queued", ColorHint::Default, "[queued]"),
        Phase::Planned => line("planned", ColorHint::Default, "[planned]"),
        Phase::Init => line("new", ColorHint::Default, "[new]"),
        // Handled by the early returns above
        Phase::Merged | Phase::Cancelled | Phase::Conflict => {
            line("unknown", ColorHint::Default, "[?]")
        }
    }
}

fn kind_icon(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Feature | OperationKind::Roadmap => "[building]",
        OperationKind::Fix => "[fixing]",
        OperationKind::Chore => "[chore]",
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
