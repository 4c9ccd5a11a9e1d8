// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Custom error type that carries a process exit code.
//!
//! Commands return `ExitError` instead of calling `std::process::exit()`
//! directly, allowing `main()` to handle process termination.
//!
//! Codes: 0 success, 1 logical failure, 2 timeout, 3 not found, 4 held.

use std::fmt;
use v0_engine::EngineError;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_TIMEOUT: i32 = 2;
pub const EXIT_NOT_FOUND: i32 = 3;
pub const EXIT_HELD: i32 = 4;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(EXIT_FAILURE, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(EXIT_TIMEOUT, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(EXIT_NOT_FOUND, message)
    }

    pub fn held(message: impl Into<String>) -> Self {
        Self::new(EXIT_HELD, message)
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

impl From<EngineError> for ExitError {
    fn from(e: EngineError) -> Self {
        let code = match &e {
            EngineError::Store(v0_storage::StoreError::NotFound(_)) => EXIT_NOT_FOUND,
            EngineError::Held(_) => EXIT_HELD,
            _ => EXIT_FAILURE,
        };
        Self::new(code, e.to_string())
    }
}

impl From<v0_core::ConfigError> for ExitError {
    fn from(e: v0_core::ConfigError) -> Self {
        Self::failure(e.to_string())
    }
}

impl From<v0_storage::StoreError> for ExitError {
    fn from(e: v0_storage::StoreError) -> Self {
        let code = match &e {
            v0_storage::StoreError::NotFound(_) => EXIT_NOT_FOUND,
            _ => EXIT_FAILURE,
        };
        Self::new(code, e.to_string())
    }
}

#[cfg(test)]
#[path = "exit_error_tests.rs"]
mod tests;
