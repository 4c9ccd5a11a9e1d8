// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error type.

use thiserror::Error;
use v0_core::{ConfigError, Phase, PhaseError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] v0_storage::StoreError),
    #[error(transparent)]
    Phase(#[from] PhaseError),
    #[error(transparent)]
    Queue(#[from] v0_storage::QueueError),
    #[error(transparent)]
    Lock(#[from] v0_storage::LockError),
    #[error(transparent)]
    Session(#[from] v0_adapters::SessionError),
    #[error(transparent)]
    Issues(#[from] v0_adapters::IssueStoreError),
    #[error("git: {0}")]
    Git(String),
    #[error("operation {0} is held")]
    Held(String),
    #[error("operation {operation} belongs to host {machine}")]
    WrongMachine { operation: String, machine: String },
    #[error("operation {operation} is {phase}, not terminal")]
    NotTerminal { operation: String, phase: Phase },
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Whether this is a transient external failure the daemons should
    /// log and retry next cycle rather than fail an operation over.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::Issues(_) | EngineError::Git(_) | EngineError::Session(_)
        )
    }
}
