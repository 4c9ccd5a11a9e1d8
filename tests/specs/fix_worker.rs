// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fix worker roundtrip: one ready issue, one session, then either a
//! merge or a human handoff.

use crate::fixture::{commit_and_push, wait_live, write, Project};
use v0_adapters::{IssueState, IssueStore, SessionAdapter};
use v0_core::Phase;
use v0_engine::{CycleOutcome, PollOutcome};
use v0_storage::EntryStatus;

#[tokio::test]
async fn commits_push_and_enqueue_a_merge() {
    let p = Project::new().await;
    let id = p.issues.create("login broken", &["fix".to_string()]).await.unwrap();

    // Agent session: commit a fix and signal fixed
    let sessions = p.sessions.clone();
    let worktree = p.state.worktree_dir(&format!("fix/{id}"), "repo");
    let wt = worktree.clone();
    let agent = tokio::spawn(async move {
        wait_live(&sessions, "v0-demo-worker-fix").await;
        commit_and_push(&wt, "fix.rs", "fixed\n", "fix login");
        write(&wt.join(".v0/outcome"), "fixed\n");
        sessions.finish("v0-demo-worker-fix");
    });

    let outcome = p.fix_poller().run_cycle().await.unwrap();
    agent.await.unwrap();
    assert_eq!(outcome, PollOutcome::MergeEnqueued { issue: id.clone() });

    // The issue is claimed, the operation completed, a merge pending
    assert_eq!(p.issues.get(&id).unwrap().status, IssueState::InProgress);
    assert_eq!(p.phase(&id), Phase::Completed);
    let entries = p.queue.entries().unwrap();
    assert_eq!(entries[0].operation, id);
    assert_eq!(entries[0].status, EntryStatus::Pending);

    // And the daemon lands it
    assert_eq!(p.merge_daemon().run_cycle().await.unwrap(), CycleOutcome::Processed(1));
    assert_eq!(p.phase(&id), Phase::Merged);
    // The epic (the issue itself) closes with the merge
    assert_eq!(p.issues.get(&id).unwrap().status, IssueState::Closed);
}

#[tokio::test]
async fn note_without_commits_reassigns_and_stays_in_progress() {
    let p = Project::new().await;
    let id = p.issues.create("unclear bug", &["fix".to_string()]).await.unwrap();

    let sessions = p.sessions.clone();
    let issues = p.issues.clone();
    let note_id = id.clone();
    let agent = tokio::spawn(async move {
        wait_live(&sessions, "v0-demo-worker-fix").await;
        issues.add_note(&note_id, "needs a product decision");
        sessions.finish("v0-demo-worker-fix");
    });

    let outcome = p.fix_poller().run_cycle().await.unwrap();
    agent.await.unwrap();
    assert_eq!(outcome, PollOutcome::Reassigned { issue: id.clone() });

    let issue = p.issues.get(&id).unwrap();
    assert_eq!(issue.status, IssueState::InProgress, "kept in_progress, not reopened or closed");
    assert_eq!(issue.assignee.as_deref(), Some("human"));
    assert!(p.queue.entries().unwrap().is_empty(), "nothing pushed, nothing enqueued");
}

#[tokio::test]
async fn cycle_backs_off_while_a_session_runs() {
    let p = Project::new().await;
    p.issues.create("bug one", &["fix".to_string()]).await.unwrap();

    p.sessions
        .start("v0-demo-worker-fix", std::path::Path::new("/w"), "agent")
        .await
        .unwrap();
    assert_eq!(p.fix_poller().run_cycle().await.unwrap(), PollOutcome::Busy);
}

#[tokio::test]
async fn issues_with_open_blockers_are_not_dispatched() {
    let p = Project::new().await;
    let blocker = p.issues.create("prerequisite", &[]).await.unwrap();
    let blocked = p.issues.create("dependent fix", &["fix".to_string()]).await.unwrap();
    p.issues.add_blocker(&blocked, &blocker).await.unwrap();

    assert_eq!(p.fix_poller().run_cycle().await.unwrap(), PollOutcome::Idle);

    // Blocker closes, dispatch proceeds
    p.issues.set_status(&blocker, IssueState::Done).await.unwrap();
    let sessions = p.sessions.clone();
    let agent = tokio::spawn(async move {
        wait_live(&sessions, "v0-demo-worker-fix").await;
        sessions.finish("v0-demo-worker-fix");
    });
    let outcome = p.fix_poller().run_cycle().await.unwrap();
    agent.await.unwrap();
    assert_eq!(outcome, PollOutcome::Failed { issue: blocked });
}
