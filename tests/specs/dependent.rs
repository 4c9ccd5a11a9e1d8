// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependent build: `--after` parks the dependent until its blocker
//! merges, then the unblock scan frees it.

use crate::fixture::Project;
use v0_core::Phase;
use v0_engine::FeatureOutcome;

#[tokio::test]
async fn dependent_blocks_then_merges_after_blocker() {
    let p = Project::new().await;
    p.file_operation("a", "A", None);
    p.file_operation("b", "B", Some("a"));

    // b plans, then parks: blocked, resume at queued, edge intact
    let b_agent = p.script_feature_agent("b");
    let outcome = p.feature_worker().drive("b").await.unwrap();
    assert_eq!(outcome, FeatureOutcome::Blocked { on: Some("a".to_string()) });
    let b = p.op("b");
    assert_eq!(b.phase, Phase::Blocked);
    assert_eq!(b.blocked_phase, Some(Phase::Queued));
    assert_eq!(b.after.as_deref(), Some("a"));

    // a runs to completion and merges; the daemon unblocks b
    let a_agent = p.script_feature_agent("a");
    p.feature_worker().drive("a").await.unwrap();
    a_agent.await.unwrap();
    p.merge_daemon().run_cycle().await.unwrap();
    assert_eq!(p.phase("a"), Phase::Merged);

    let b = p.op("b");
    assert_eq!(b.phase, Phase::Queued, "unblocked into its stored phase");
    assert!(b.after.is_none(), "edge cleared on unblock");
    assert!(p.events("b").contains("event:unblocked"));

    // Resumed worker takes b to completion; daemon merges it
    let outcome = p.feature_worker().drive("b").await.unwrap();
    b_agent.await.unwrap();
    assert_eq!(outcome, FeatureOutcome::Enqueued);
    p.merge_daemon().run_cycle().await.unwrap();
    assert_eq!(p.phase("b"), Phase::Merged);
}

#[tokio::test]
async fn dependent_never_executes_before_blocker_merges() {
    let p = Project::new().await;
    p.file_operation("a", "A", None);
    p.file_operation("b", "B", Some("a"));

    let b_agent = p.script_feature_agent("b");
    p.feature_worker().drive("b").await.unwrap();

    // b is parked; its log shows no executing transition yet
    assert!(!p.events("b").contains("-> executing"));

    let a_agent = p.script_feature_agent("a");
    p.feature_worker().drive("a").await.unwrap();
    a_agent.await.unwrap();
    p.merge_daemon().run_cycle().await.unwrap();

    p.feature_worker().drive("b").await.unwrap();
    b_agent.await.unwrap();

    // Now it has executed, strictly after a's merge event existed
    assert!(p.events("b").contains("-> executing"));
    assert!(p.events("a").contains("pending_merge -> merged"));
}

#[tokio::test]
async fn force_resume_ignores_blockers() {
    let p = Project::new().await;
    p.file_operation("a", "A", None);
    p.file_operation("b", "B", Some("a"));

    let b_agent = p.script_feature_agent("b");
    p.feature_worker().drive("b").await.unwrap();
    assert_eq!(p.phase("b"), Phase::Blocked);

    // resume --force sets ignore_blockers and frees the phase
    let phase = v0_engine::transitions::resume(&p.store, "b", true).unwrap();
    assert_eq!(phase, Phase::Queued);
    assert!(p.op("b").ignores_blockers());

    let outcome = p.feature_worker().drive("b").await.unwrap();
    b_agent.await.unwrap();
    assert_eq!(outcome, FeatureOutcome::Enqueued, "blocker still open but ignored");
}
