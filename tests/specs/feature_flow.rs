// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fire-and-forget feature: build → plan → execute → merge → cleanup.

use crate::fixture::Project;
use v0_core::Phase;
use v0_engine::{git, CycleOutcome, FeatureOutcome};

#[tokio::test]
async fn fire_and_forget_feature_reaches_merged() {
    let p = Project::new().await;
    p.file_operation("auth", "Add JWT", None);

    let agent = p.script_feature_agent("auth");
    let outcome = p.feature_worker().drive("auth").await.unwrap();
    agent.await.unwrap();
    assert_eq!(outcome, FeatureOutcome::Enqueued);

    // The planning session produced plans/auth.md on the branch
    let op = p.op("auth");
    assert_eq!(op.plan_file.as_deref(), Some("plans/auth.md"));
    assert_eq!(op.phase, Phase::Completed);
    assert!(op.merge_queued);

    // The daemon merges it and cleans up
    let acted = p.merge_daemon().run_cycle().await.unwrap();
    assert_eq!(acted, CycleOutcome::Processed(1));

    let op = p.op("auth");
    assert_eq!(op.phase, Phase::Merged);
    assert!(op.merged_at.is_some());
    assert!(op.merged_at.unwrap() >= op.created_at);
    assert!(!p.feature_worktree("auth").exists(), "worktree deleted after merge");

    // The work (and the plan) are on the remote develop branch
    git::git(&p.config.root, &["fetch", "origin"]).await.unwrap();
    let files = git::git(
        &p.config.root,
        &["ls-tree", "--name-only", "-r", "origin/main"],
    )
    .await
    .unwrap();
    assert!(files.contains("plans/auth.md"), "plan merged: {files}");
    assert!(files.contains("src_auth.txt"), "work merged: {files}");
}

#[tokio::test]
async fn event_log_witnesses_only_legal_transitions() {
    let p = Project::new().await;
    p.file_operation("auth", "Add JWT", None);

    let agent = p.script_feature_agent("auth");
    p.feature_worker().drive("auth").await.unwrap();
    agent.await.unwrap();
    p.merge_daemon().run_cycle().await.unwrap();

    let events = p.events("auth");
    // Phase transitions appear in lifecycle order
    let order = [
        "init -> planned",
        "planned -> queued",
        "queued -> executing",
        "executing -> completed",
        "pending_merge -> merged",
    ];
    let mut last = 0;
    for marker in order {
        let at = events.find(marker).unwrap_or_else(|| panic!("missing {marker} in:\n{events}"));
        assert!(at >= last, "{marker} out of order in:\n{events}");
        last = at;
    }
}

#[tokio::test]
async fn worker_is_idempotent_on_merged_operation() {
    let p = Project::new().await;
    p.file_operation("auth", "Add JWT", None);

    let agent = p.script_feature_agent("auth");
    p.feature_worker().drive("auth").await.unwrap();
    agent.await.unwrap();
    p.merge_daemon().run_cycle().await.unwrap();

    let before = p.op("auth");
    // Running the worker again must be a no-op
    assert_eq!(p.feature_worker().drive("auth").await.unwrap(), FeatureOutcome::NoOp);
    assert_eq!(p.op("auth"), before);

    // And an empty-queue daemon cycle is a no-op too
    assert_eq!(p.merge_daemon().run_cycle().await.unwrap(), CycleOutcome::Idle);
    assert_eq!(p.op("auth"), before);
}
