// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hold and resume: a user-requested pause that suppresses automatic
//! progression without changing phase, and never blocks cancellation.

use crate::fixture::Project;
use v0_core::Phase;
use v0_engine::{transitions, FeatureOutcome};

#[tokio::test]
async fn held_operation_survives_worker_and_daemon_ticks() {
    let p = Project::new().await;
    p.file_operation("x", "X", None);
    p.store.update("x", "phase", serde_json::json!("queued")).unwrap();
    p.store.update("x", "plan_file", serde_json::json!("plans/x.md")).unwrap();

    transitions::hold(&p.store, "x").unwrap();

    // Worker tick: exits cleanly, no session, no phase change
    assert_eq!(p.feature_worker().drive("x").await.unwrap(), FeatureOutcome::Held);
    assert_eq!(p.phase("x"), Phase::Queued);
    assert!(p.sessions.calls().is_empty());

    // Daemon tick over an (empty) queue: no change either
    p.merge_daemon().run_cycle().await.unwrap();
    assert_eq!(p.phase("x"), Phase::Queued);
}

#[tokio::test]
async fn hold_resume_round_trip_changes_only_hold_fields() {
    let p = Project::new().await;
    p.file_operation("x", "X", None);
    p.store.update("x", "phase", serde_json::json!("queued")).unwrap();
    let before = p.op("x");

    transitions::hold(&p.store, "x").unwrap();
    let held = p.op("x");
    assert!(held.held);
    assert!(held.held_at.is_some());
    assert_eq!(held.phase, before.phase);

    transitions::resume(&p.store, "x", false).unwrap();
    let after = p.op("x");
    assert_eq!(after, before, "only held/held_at may differ, and both reverted");
}

#[tokio::test]
async fn cancel_still_succeeds_while_held() {
    let p = Project::new().await;
    p.file_operation("x", "X", None);
    p.store.update("x", "phase", serde_json::json!("queued")).unwrap();
    transitions::hold(&p.store, "x").unwrap();

    transitions::cancel(&p.store, "x").unwrap();
    let op = p.op("x");
    assert_eq!(op.phase, Phase::Cancelled);
    assert!(!op.held, "cancel clears the hold");
    assert!(op.cancelled_at.is_some());

    // Terminal: the worker has nothing left to do
    assert_eq!(p.feature_worker().drive("x").await.unwrap(), FeatureOutcome::NoOp);
}
