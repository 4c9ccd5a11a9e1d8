// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation phase automaton.
//!
//! Phases form a closed enum with an explicit transition table. Every
//! mutation of an operation's phase goes through a guard that consults
//! [`Phase::can_transition`]; illegal transitions are rejected before any
//! state is written.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Where an operation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Created, nothing has run yet
    Init,
    /// Planning session produced a plan file
    Planned,
    /// Waiting on another operation to merge
    Blocked,
    /// Ready to execute (plan approved or not required)
    Queued,
    /// An agent session is building it
    Executing,
    /// Agent finished; branch has the work
    Completed,
    /// Handed to the merge queue
    PendingMerge,
    /// Integrated into the develop branch (terminal)
    Merged,
    /// Merge attempt hit conflicts; needs resolution
    Conflict,
    /// Worker or session failed
    Failed,
    /// Session died underneath the worker
    Interrupted,
    /// User cancelled (terminal)
    Cancelled,
}

/// Errors from phase parsing and transition guards.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhaseError {
    #[error("unknown phase: {0}")]
    Unknown(String),
    #[error("illegal transition: {from} -> {to}")]
    IllegalTransition { from: Phase, to: Phase },
}

impl Phase {
    /// All phases, in lifecycle order. Drives exhaustive tests.
    pub const ALL: [Phase; 12] = [
        Phase::Init,
        Phase::Planned,
        Phase::Blocked,
        Phase::Queued,
        Phase::Executing,
        Phase::Completed,
        Phase::PendingMerge,
        Phase::Merged,
        Phase::Conflict,
        Phase::Failed,
        Phase::Interrupted,
        Phase::Cancelled,
    ];

    /// Terminal phases are never left.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Merged | Phase::Cancelled)
    }

    /// Legal successor phases, excluding cancellation.
    ///
    /// `cancelled` is reachable from every non-terminal phase via
    /// [`Phase::can_transition`]; it is not listed here so that the table
    /// below reads as the forward lifecycle.
    pub fn successors(self) -> &'static [Phase] {
        match self {
            Phase::Init => &[Phase::Planned, Phase::Blocked, Phase::Failed],
            Phase::Planned => &[Phase::Queued, Phase::Executing, Phase::Blocked, Phase::Failed],
            Phase::Blocked => &[Phase::Init, Phase::Planned, Phase::Queued],
            Phase::Queued => &[Phase::Executing, Phase::Blocked, Phase::Failed],
            Phase::Executing => &[Phase::Completed, Phase::Failed, Phase::Interrupted],
            Phase::Completed => &[Phase::PendingMerge, Phase::Merged, Phase::Failed],
            Phase::PendingMerge => &[Phase::Merged, Phase::Conflict, Phase::Failed],
            Phase::Merged => &[],
            Phase::Conflict => &[Phase::PendingMerge, Phase::Failed],
            Phase::Failed => &[Phase::Init, Phase::Planned, Phase::Queued],
            Phase::Interrupted => &[Phase::Init, Phase::Planned, Phase::Queued],
            Phase::Cancelled => &[],
        }
    }

    /// Check whether a transition to `to` is legal from this phase.
    pub fn can_transition(self, to: Phase) -> bool {
        if to == Phase::Cancelled {
            return !self.is_terminal();
        }
        self.successors().contains(&to)
    }

    /// Guard a transition, returning the error the transition functions
    /// surface to callers.
    pub fn guard(self, to: Phase) -> Result<(), PhaseError> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(PhaseError::IllegalTransition { from: self, to })
        }
    }

    /// Phases a `failed`/`interrupted` operation may resume into.
    pub fn is_resumable(self) -> bool {
        matches!(self, Phase::Failed | Phase::Interrupted | Phase::Blocked)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Planned => "planned",
            Phase::Blocked => "blocked",
            Phase::Queued => "queued",
            Phase::Executing => "executing",
            Phase::Completed => "completed",
            Phase::PendingMerge => "pending_merge",
            Phase::Merged => "merged",
            Phase::Conflict => "conflict",
            Phase::Failed => "failed",
            Phase::Interrupted => "interrupted",
            Phase::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = PhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Phase::Init),
            "planned" => Ok(Phase::Planned),
            "blocked" => Ok(Phase::Blocked),
            "queued" => Ok(Phase::Queued),
            "executing" => Ok(Phase::Executing),
            "completed" => Ok(Phase::Completed),
            "pending_merge" => Ok(Phase::PendingMerge),
            "merged" => Ok(Phase::Merged),
            "conflict" => Ok(Phase::Conflict),
            "failed" => Ok(Phase::Failed),
            "interrupted" => Ok(Phase::Interrupted),
            "cancelled" => Ok(Phase::Cancelled),
            other => Err(PhaseError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "phase_tests.rs"]
mod tests;
