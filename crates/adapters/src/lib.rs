// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! v0-adapters: boundaries to everything v0 does not own.
//!
//! The terminal multiplexer, the issue store CLI, desktop notifications,
//! and the Agent's session journal each sit behind a trait with one
//! production implementation and one fake. Engine code never shells out
//! directly except through [`subprocess`].

pub mod issues;
pub mod journal;
pub mod notify;
pub mod subprocess;
pub mod tmux;

pub use issues::{Issue, IssueState, IssueStore, IssueStoreError, CliIssueStore};
pub use journal::{JournalStrategy, JournalVerdict, StopRecordStrategy};
pub use notify::{DesktopNotifyAdapter, NotifyAdapter, NotifyError};
pub use tmux::{SessionAdapter, SessionError, TmuxSessions};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use issues::FakeIssueStore;
#[cfg(any(test, feature = "test-support"))]
pub use notify::{FakeNotifyAdapter, NotifyCall};
#[cfg(any(test, feature = "test-support"))]
pub use tmux::{FakeSessions, SessionCall};
