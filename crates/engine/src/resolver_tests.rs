// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;
use v0_adapters::{FakeIssueStore, IssueState};
use v0_core::{BuildPaths, FakeClock};

fn fixture() -> (TempDir, OperationStore<FakeClock>, FakeIssueStore) {
    let temp = TempDir::new().unwrap();
    let store = OperationStore::new(BuildPaths::new(temp.path().join("build")), FakeClock::new());
    (temp, store, FakeIssueStore::new())
}

#[tokio::test]
async fn ensure_epic_creates_labelled_issue_once() {
    let (_temp, store, issues) = fixture();
    let op = Operation::builder("auth").build();
    store.create(&op).unwrap();

    let resolver = Resolver::new(&issues, &store);
    let epic = resolver.ensure_epic(&op).await.unwrap();

    let issue = issues.get(&epic).unwrap();
    assert!(issue.labels.contains(&"plan:auth".to_string()));
    assert!(issue.labels.contains(&"feature".to_string()));

    // Already-stamped epic is returned, not recreated
    let mut op = op;
    op.epic_id = Some(epic.clone());
    assert_eq!(resolver.ensure_epic(&op).await.unwrap(), epic);
}

#[tokio::test]
async fn ensure_epic_mirrors_after_edge() {
    let (_temp, store, issues) = fixture();

    let blocker_epic = issues.create("a", &[plan_label("a")]).await.unwrap();
    store.create(&Operation::builder("a").epic_id(&blocker_epic).build()).unwrap();

    let dependent = Operation::builder("b").after("a").build();
    store.create(&dependent).unwrap();

    let resolver = Resolver::new(&issues, &store);
    let epic = resolver.ensure_epic(&dependent).await.unwrap();

    assert_eq!(issues.get(&epic).unwrap().blockers, vec![blocker_epic]);
}

#[tokio::test]
async fn is_blocked_prefers_the_issue_store() {
    let (_temp, store, issues) = fixture();
    let resolver = Resolver::new(&issues, &store);

    let blocker_epic = issues.create("a", &[]).await.unwrap();
    let epic = issues.create("b", &[]).await.unwrap();
    issues.add_blocker(&epic, &blocker_epic).await.unwrap();

    let op = Operation::builder("b").epic_id(&epic).build();
    assert!(resolver.is_blocked(&op).await.unwrap());

    issues.set_status(&blocker_epic, IssueState::Done).await.unwrap();
    assert!(!resolver.is_blocked(&op).await.unwrap());
}

#[tokio::test]
async fn is_blocked_falls_back_to_operation_level() {
    let (_temp, store, issues) = fixture();
    let resolver = Resolver::new(&issues, &store);

    store.create(&Operation::builder("a").phase(Phase::Executing).build()).unwrap();
    let op = Operation::builder("b").after("a").build();
    assert!(resolver.is_blocked(&op).await.unwrap());

    store.update("a", "phase", serde_json::json!("merged")).unwrap();
    assert!(!resolver.is_blocked(&op).await.unwrap());
}

#[tokio::test]
async fn ignore_blockers_short_circuits() {
    let (_temp, store, issues) = fixture();
    let resolver = Resolver::new(&issues, &store);

    store.create(&Operation::builder("a").phase(Phase::Init).build()).unwrap();
    let mut op = Operation::builder("b").after("a").build();
    op.ignore_blockers = Some(true);
    assert!(!resolver.is_blocked(&op).await.unwrap());
}

#[tokio::test]
async fn vanished_blocker_operation_does_not_block() {
    let (_temp, store, issues) = fixture();
    let resolver = Resolver::new(&issues, &store);
    let op = Operation::builder("b").after("ghost").build();
    assert!(!resolver.is_blocked(&op).await.unwrap());
}

#[tokio::test]
async fn first_open_blocker_resolves_plan_labels() {
    let (_temp, store, issues) = fixture();
    let resolver = Resolver::new(&issues, &store);

    let blocker_epic = issues.create("epic for a", &[plan_label("a")]).await.unwrap();
    let plain = issues.create("plain blocker", &[]).await.unwrap();
    let epic = issues.create("b", &[]).await.unwrap();
    issues.add_blocker(&epic, &blocker_epic).await.unwrap();
    issues.add_blocker(&epic, &plain).await.unwrap();

    let op = Operation::builder("b").epic_id(&epic).build();
    // First open blocker carries plan:a, so it resolves to "a"
    assert_eq!(resolver.first_open_blocker(&op).await.unwrap(), Some("a".to_string()));

    // Once the labelled one closes, the raw id shows through
    issues.set_status(&blocker_epic, IssueState::Closed).await.unwrap();
    assert_eq!(resolver.first_open_blocker(&op).await.unwrap(), Some(plain));
}

#[tokio::test]
async fn unblock_dependents_frees_matching_blocked_ops() {
    let (_temp, store, issues) = fixture();
    let resolver = Resolver::new(&issues, &store);

    store
        .create(
            &Operation::builder("b")
                .phase(Phase::Blocked)
                .after("a")
                .blocked_phase(Phase::Queued)
                .build(),
        )
        .unwrap();
    store
        .create(
            &Operation::builder("c")
                .phase(Phase::Blocked)
                .after("a")
                .blocked_phase(Phase::Init)
                .held(true)
                .build(),
        )
        .unwrap();
    // Waiting on someone else: untouched
    store
        .create(
            &Operation::builder("d")
                .phase(Phase::Blocked)
                .after("other")
                .blocked_phase(Phase::Queued)
                .build(),
        )
        .unwrap();

    let freed = resolver.unblock_dependents("a").await.unwrap();
    assert_eq!(
        freed,
        vec![
            Unblocked { name: "b".to_string(), phase: Phase::Queued, held: false },
            Unblocked { name: "c".to_string(), phase: Phase::Init, held: true },
        ]
    );

    assert_eq!(store.read_all("b").unwrap().phase, Phase::Queued);
    assert!(store.read_all("b").unwrap().after.is_none());
    assert_eq!(store.read_all("d").unwrap().phase, Phase::Blocked);
}

#[tokio::test]
async fn close_epic_closes_the_issue() {
    let (_temp, store, issues) = fixture();
    let resolver = Resolver::new(&issues, &store);

    let epic = issues.create("auth", &[]).await.unwrap();
    let op = Operation::builder("auth").epic_id(&epic).build();
    resolver.close_epic(&op).await.unwrap();
    assert_eq!(issues.get(&epic).unwrap().status, IssueState::Closed);
}
