// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merge conflict: the queue skips the conflicted entry, keeps going,
//! and a resolution pass brings the operation home.

use crate::fixture::{commit_and_push, wait_live, write, Project};
use v0_core::{Clock, Phase};
use v0_engine::{git, transitions};
use v0_storage::EntryStatus;

/// Script an agent whose execute session writes `contents` into the
/// same shared file.
fn script_conflicting_agent(p: &Project, name: &str, contents: &'static str) -> tokio::task::JoinHandle<()> {
    let sessions = p.sessions.clone();
    let session = format!("v0-demo-{name}-feature");
    let worktree = p.feature_worktree(name);
    let plan_rel = format!("plans/{name}.md");
    tokio::spawn(async move {
        wait_live(&sessions, &session).await;
        write(&worktree.join(&plan_rel), "# plan\n");
        write(&worktree.join(".v0/outcome"), "done\n");
        sessions.finish(&session);

        wait_live(&sessions, &session).await;
        commit_and_push(&worktree, "shared.txt", contents, "touch shared");
        write(&worktree.join(".v0/outcome"), "done\n");
        sessions.finish(&session);
    })
}

#[tokio::test]
async fn conflict_skips_without_blocking_and_resolves() {
    let p = Project::new().await;
    for (name, contents) in [("alpha", "from alpha\n"), ("beta", "from beta\n")] {
        p.file_operation(name, "touch the shared file", None);
        let agent = script_conflicting_agent(&p, name, contents);
        p.feature_worker().drive(name).await.unwrap();
        agent.await.unwrap();
    }
    // A third, independent operation behind the conflicting pair
    p.file_operation("gamma", "independent", None);
    let agent = p.script_feature_agent("gamma");
    p.feature_worker().drive("gamma").await.unwrap();
    agent.await.unwrap();

    p.merge_daemon().run_cycle().await.unwrap();

    // First in wins; second conflicts; the queue continued to gamma
    assert_eq!(p.phase("alpha"), Phase::Merged);
    assert_eq!(p.phase("beta"), Phase::Conflict);
    assert_eq!(p.phase("gamma"), Phase::Merged);

    let entries = p.queue.entries().unwrap();
    let status_of = |name: &str| {
        entries.iter().filter(|e| e.operation == name).map(|e| e.status).next_back().unwrap()
    };
    assert_eq!(status_of("alpha"), EntryStatus::Completed);
    assert_eq!(status_of("beta"), EntryStatus::Conflict);
    assert_eq!(status_of("gamma"), EntryStatus::Completed);

    // The user heard about it
    assert!(p.notifier.calls().iter().any(|c| c.message.contains("beta")));

    // Resolution: fix the branch in beta's worktree, push, re-enqueue
    // (what `merge --resolve` does after its session succeeds)
    let worktree = p.feature_worktree("beta");
    git::git(&worktree, &["fetch", "origin"]).await.unwrap();
    let _ = git::git(&worktree, &["merge", "origin/main"]).await;
    std::fs::write(worktree.join("shared.txt"), "from alpha and beta\n").unwrap();
    git::git(&worktree, &["add", "."]).await.unwrap();
    git::git(&worktree, &["commit", "-m", "resolve conflict"]).await.unwrap();
    git::push(&worktree, "origin", "feature/beta").await.unwrap();

    transitions::to_pending_merge(&p.store, "beta").unwrap();
    p.queue.enqueue("beta", p.store.clock().now_utc()).unwrap();

    p.merge_daemon().run_cycle().await.unwrap();
    assert_eq!(p.phase("beta"), Phase::Merged);

    git::git(&p.config.root, &["fetch", "origin"]).await.unwrap();
    let merged =
        git::git(&p.config.root, &["show", "origin/main:shared.txt"]).await.unwrap();
    assert_eq!(merged, "from alpha and beta");
}
