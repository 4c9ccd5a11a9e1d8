// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

/// Init a repo with one commit on `main`.
async fn test_repo() -> (TempDir, std::path::PathBuf) {
    let temp = TempDir::new().unwrap();
    let repo = temp.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    git(&repo, &["init", "-b", "main"]).await.unwrap();
    git(&repo, &["config", "user.email", "test@example.com"]).await.unwrap();
    git(&repo, &["config", "user.name", "Test"]).await.unwrap();
    std::fs::write(repo.join("README.md"), "hello\n").unwrap();
    git(&repo, &["add", "."]).await.unwrap();
    git(&repo, &["commit", "-m", "initial"]).await.unwrap();
    (temp, repo)
}

#[tokio::test]
async fn current_branch_and_head() {
    let (_temp, repo) = test_repo().await;
    assert_eq!(current_branch(&repo).await.unwrap(), "main");
    assert!(head_resolves(&repo).await);
}

#[tokio::test]
async fn clean_and_dirty_status() {
    let (_temp, repo) = test_repo().await;
    assert!(is_clean(&repo).await.unwrap());

    std::fs::write(repo.join("dirty.txt"), "x").unwrap();
    assert!(!is_clean(&repo).await.unwrap());
}

#[tokio::test]
async fn branch_existence_probe() {
    let (_temp, repo) = test_repo().await;
    assert!(branch_exists(&repo, "main").await);
    assert!(!branch_exists(&repo, "feature/auth").await);

    git(&repo, &["branch", "feature/auth"]).await.unwrap();
    assert!(branch_exists(&repo, "feature/auth").await);
}

#[tokio::test]
async fn commits_ahead_of_base() {
    let (_temp, repo) = test_repo().await;
    git(&repo, &["checkout", "-b", "feature/x"]).await.unwrap();
    assert!(!has_commits_ahead(&repo, "main").await.unwrap());

    std::fs::write(repo.join("work.txt"), "w").unwrap();
    git(&repo, &["add", "."]).await.unwrap();
    git(&repo, &["commit", "-m", "work"]).await.unwrap();
    assert!(has_commits_ahead(&repo, "main").await.unwrap());
}

#[tokio::test]
async fn failed_git_surfaces_stderr() {
    let (_temp, repo) = test_repo().await;
    let err = git(&repo, &["checkout", "no-such-branch"]).await.unwrap_err();
    match err {
        EngineError::Git(message) => assert!(message.contains("no-such-branch"), "{message}"),
        other => panic!("expected Git error, got {other}"),
    }
}
