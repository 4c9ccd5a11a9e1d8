// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::git;
use tempfile::TempDir;
use v0_core::BranchPattern;

async fn fixture() -> (TempDir, ProjectConfig, StatePaths) {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("repo");
    std::fs::create_dir_all(&root).unwrap();
    git::git(&root, &["init", "-b", "main"]).await.unwrap();
    git::git(&root, &["config", "user.email", "test@example.com"]).await.unwrap();
    git::git(&root, &["config", "user.name", "Test"]).await.unwrap();
    std::fs::write(root.join("README.md"), "hello\n").unwrap();
    git::git(&root, &["add", "."]).await.unwrap();
    git::git(&root, &["commit", "-m", "initial"]).await.unwrap();

    let config = ProjectConfig {
        root,
        project: "demo".to_string(),
        issue_prefix: "DEMO".to_string(),
        build_dir: ".v0/build".into(),
        plans_dir: "plans".into(),
        develop_branch: "main".to_string(),
        git_remote: "origin".to_string(),
        feature_branch: BranchPattern::new("feature/{name}"),
        bugfix_branch: BranchPattern::new("fix/{id}"),
        chore_branch: BranchPattern::new("chore/{id}"),
        workspace_mode: None,
        worktree_init: None,
        disable_notifications: true,
    };
    let state = StatePaths::at(temp.path().join("state"));
    (temp, config, state)
}

#[tokio::test]
async fn create_makes_worktree_on_new_branch() {
    let (_temp, config, state) = fixture().await;
    let manager = WorktreeManager::new(&config, &state);

    let branch = manager.branch_for(v0_core::OperationKind::Feature, "auth");
    assert_eq!(branch, "feature/auth");

    let path = manager.create(&branch, "main").await.unwrap();
    assert_eq!(path, state.worktree_dir("feature/auth", "repo"));
    assert!(path.join("README.md").is_file());
    assert_eq!(git::current_branch(&path).await.unwrap(), "feature/auth");
}

#[tokio::test]
async fn create_is_idempotent() {
    let (_temp, config, state) = fixture().await;
    let manager = WorktreeManager::new(&config, &state);

    let first = manager.create("feature/auth", "main").await.unwrap();
    let second = manager.create("feature/auth", "main").await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn create_reattaches_to_existing_branch() {
    let (_temp, config, state) = fixture().await;
    let manager = WorktreeManager::new(&config, &state);

    let path = manager.create("feature/auth", "main").await.unwrap();
    // Simulate a lost worktree dir with the branch still around
    git::git(&config.root, &["worktree", "remove", "--force", &path.display().to_string()])
        .await
        .unwrap();
    assert!(git::branch_exists(&config.root, "feature/auth").await);

    let path = manager.create("feature/auth", "main").await.unwrap();
    assert_eq!(git::current_branch(&path).await.unwrap(), "feature/auth");
}

#[tokio::test]
async fn init_hook_runs_in_the_worktree() {
    let (_temp, mut config, state) = fixture().await;
    config.worktree_init = Some("echo primed > .hook-ran".to_string());
    let manager = WorktreeManager::new(&config, &state);

    let path = manager.create("feature/auth", "main").await.unwrap();
    assert!(path.join(".hook-ran").is_file());
}

#[tokio::test]
async fn failing_init_hook_does_not_fail_creation() {
    let (_temp, mut config, state) = fixture().await;
    config.worktree_init = Some("exit 1".to_string());
    let manager = WorktreeManager::new(&config, &state);
    assert!(manager.create("feature/auth", "main").await.is_ok());
}

#[tokio::test]
async fn remove_deletes_worktree_and_branch() {
    let (_temp, config, state) = fixture().await;
    let manager = WorktreeManager::new(&config, &state);

    let path = manager.create("feature/auth", "main").await.unwrap();
    manager.write_session_marker("feature/auth", "v0-demo-auth-feature").unwrap();

    manager.remove("feature/auth").await;
    assert!(!path.exists());
    assert!(!git::branch_exists(&config.root, "feature/auth").await);
    assert!(!state.session_marker("feature/auth").exists());
}

#[tokio::test]
async fn session_marker_reverse_lookup() {
    let (_temp, config, state) = fixture().await;
    let manager = WorktreeManager::new(&config, &state);

    let path = manager.create("fix/DEMO-3", "main").await.unwrap();
    manager.write_session_marker("fix/DEMO-3", "v0-demo-worker-fix").unwrap();

    let markers = session_markers(&state);
    assert_eq!(markers, vec![("v0-demo-worker-fix".to_string(), path)]);
}
