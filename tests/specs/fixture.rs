// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared project fixture: a bare origin, a user clone, per-project
//! state in a temp dir, and fake session/issue/notify adapters.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use v0_adapters::{FakeIssueStore, FakeNotifyAdapter, FakeSessions, SessionAdapter};
use v0_core::{
    BranchPattern, BuildPaths, FakeClock, Operation, OperationKind, Phase, ProjectConfig,
    StatePaths,
};
use v0_engine::{git, FeatureWorker, IssuePoller, MergeDaemon};
use v0_storage::{MergeQueue, OperationStore};

pub struct Project {
    /// Owns every path below; dropped last
    pub _temp: TempDir,
    pub config: ProjectConfig,
    pub state: StatePaths,
    pub store: OperationStore<FakeClock>,
    pub queue: MergeQueue,
    pub sessions: FakeSessions,
    pub issues: FakeIssueStore,
    pub notifier: FakeNotifyAdapter,
}

pub async fn commit_file(repo: &Path, file: &str, contents: &str, message: &str) {
    if let Some(parent) = repo.join(file).parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(repo.join(file), contents).unwrap();
    git::git(repo, &["add", "."]).await.unwrap();
    git::git(repo, &["commit", "-m", message]).await.unwrap();
}

impl Project {
    pub async fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let origin = temp.path().join("origin.git");
        std::fs::create_dir_all(&origin).unwrap();
        git::git(&origin, &["init", "--bare", "-b", "main"]).await.unwrap();

        let root = temp.path().join("repo");
        git::git(temp.path(), &["clone", &origin.display().to_string(), "repo"])
            .await
            .unwrap();
        git::git(&root, &["config", "user.email", "test@example.com"]).await.unwrap();
        git::git(&root, &["config", "user.name", "Test"]).await.unwrap();
        git::git(&root, &["checkout", "-B", "main"]).await.unwrap();
        commit_file(&root, "README.md", "hello\n", "initial").await;
        git::git(&root, &["push", "-u", "origin", "main"]).await.unwrap();

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
        let build = BuildPaths::new(config.build_root());
        Self {
            state: StatePaths::at(temp.path().join("state")),
            store: OperationStore::new(build.clone(), FakeClock::new()),
            queue: MergeQueue::new(build.queue_file(), build.queue_lock()),
            config,
            sessions: FakeSessions::new(),
            issues: FakeIssueStore::with_prefix("DEMO"),
            notifier: FakeNotifyAdapter::new(),
            _temp: temp,
        }
    }

    pub fn feature_worker(&self) -> FeatureWorker<'_, FakeSessions, FakeIssueStore, FakeClock> {
        FeatureWorker::new(
            &self.config,
            &self.state,
            &self.store,
            &self.queue,
            &self.sessions,
            &self.issues,
        )
        .with_poll(Duration::from_millis(2))
    }

    pub fn merge_daemon(
        &self,
    ) -> MergeDaemon<'_, FakeSessions, FakeIssueStore, FakeNotifyAdapter, FakeClock> {
        MergeDaemon::new(
            &self.config,
            &self.state,
            &self.store,
            &self.queue,
            &self.sessions,
            &self.issues,
            &self.notifier,
        )
        .with_interval(Duration::from_millis(5))
        .without_worker_spawning()
    }

    pub fn fix_poller(&self) -> IssuePoller<'_, FakeSessions, FakeIssueStore, FakeClock> {
        IssuePoller::new(
            &self.config,
            &self.state,
            &self.store,
            &self.queue,
            &self.sessions,
            &self.issues,
            OperationKind::Fix,
        )
        .with_interval(Duration::from_millis(5))
        .with_session_poll(Duration::from_millis(2))
    }

    /// File an operation the way intake does, stamped with this host's
    /// machine name so the worker accepts it.
    pub fn file_operation(&self, name: &str, prompt: &str, after: Option<&str>) {
        let mut op = Operation::new(
            name,
            OperationKind::Feature,
            prompt,
            v0_engine::machine_name(),
            self.store.clock(),
        );
        op.after = after.map(str::to_string);
        self.store.create(&op).unwrap();
    }

    pub fn op(&self, name: &str) -> Operation {
        self.store.read_all(name).unwrap()
    }

    pub fn phase(&self, name: &str) -> Phase {
        self.op(name).phase
    }

    pub fn feature_worktree(&self, name: &str) -> PathBuf {
        self.state.worktree_dir(&format!("feature/{name}"), "repo")
    }

    pub fn events(&self, name: &str) -> String {
        std::fs::read_to_string(self.store.paths().events_log(name)).unwrap_or_default()
    }

    /// Script the agent behind a feature operation's sessions: the plan
    /// session writes the plan and signals done, the execute session
    /// commits work and signals done.
    pub fn script_feature_agent(&self, name: &str) -> tokio::task::JoinHandle<()> {
        let sessions = self.sessions.clone();
        let session = format!("v0-demo-{name}-feature");
        let worktree = self.feature_worktree(name);
        let plan_rel = format!("plans/{name}.md");
        let file = format!("src_{name}.txt");
        let name = name.to_string();
        tokio::spawn(async move {
            // Plan session
            wait_live(&sessions, &session).await;
            write(&worktree.join(&plan_rel), "# plan\n");
            write(&worktree.join(".v0/outcome"), "done\n");
            sessions.finish(&session);

            // Execute session (same name, second start)
            wait_live(&sessions, &session).await;
            commit_and_push(&worktree, &file, "content\n", &format!("work for {name}"));
            write(&worktree.join(".v0/outcome"), "done\n");
            sessions.finish(&session);
        })
    }
}

pub async fn wait_live(sessions: &FakeSessions, session: &str) {
    for _ in 0..5000 {
        if sessions.is_live(session).await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("session {session} never started");
}

pub fn write(path: &Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// Blocking git helpers for inside scripted agents (no async context).
pub fn run_git(repo: &Path, args: &[&str]) {
    let status = std::process::Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?} failed in {}", repo.display());
}

pub fn commit_and_push(worktree: &Path, file: &str, contents: &str, message: &str) {
    std::fs::write(worktree.join(file), contents).unwrap();
    run_git(worktree, &["add", "."]);
    run_git(worktree, &["commit", "-m", message]);
    let branch = String::from_utf8(
        std::process::Command::new("git")
            .arg("-C")
            .arg(worktree)
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .output()
            .unwrap()
            .stdout,
    )
    .unwrap();
    run_git(worktree, &["push", "-u", "origin", branch.trim()]);
}
