// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::Path;
use tempfile::TempDir;
use v0_adapters::{FakeSessions, StopRecordStrategy};
use v0_core::{BranchPattern, BuildPaths, FakeClock, Operation};

struct Fixture {
    temp: TempDir,
    config: ProjectConfig,
    state: StatePaths,
    store: OperationStore<FakeClock>,
    sessions: FakeSessions,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let config = ProjectConfig {
        root: temp.path().join("repo"),
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
    Fixture {
        state: StatePaths::at(temp.path().join("state")),
        store: OperationStore::new(BuildPaths::new(config.build_root()), FakeClock::new()),
        config,
        sessions: FakeSessions::new(),
        temp,
    }
}

impl Fixture {
    fn strategy(&self, stale_after: Duration) -> StopRecordStrategy {
        StopRecordStrategy::new(self.temp.path().join("journals")).with_stale_after(stale_after)
    }

    /// An executing operation with a live session and a journal whose
    /// last record is `record`.
    async fn executing_op(&self, name: &str, session: &str, record: &str) -> PathBuf {
        let worktree = self.temp.path().join(format!("tree/{name}"));
        std::fs::create_dir_all(&worktree).unwrap();

        let mut op = Operation::builder(name).phase(v0_core::Phase::Executing).build();
        op.tmux_session = Some(session.to_string());
        op.worktree = Some(worktree.clone());
        self.store.create(&op).unwrap();

        self.sessions.start(session, &worktree, "agent").await.unwrap();

        let strategy = self.strategy(Duration::ZERO);
        std::fs::create_dir_all(self.temp.path().join("journals")).unwrap();
        std::fs::write(strategy.journal_path(&worktree), record).unwrap();
        worktree
    }
}

const IDLE_RECORD: &str = r#"{"type":"turn","stop_reason":"end_turn","tool_use":false}"#;
const BUSY_RECORD: &str = r#"{"type":"turn","stop_reason":"tool_use","tool_use":true}"#;
const ERROR_RECORD: &str = r#"{"type":"turn","error":"credit balance too low"}"#;

#[tokio::test]
async fn idle_session_is_reaped() {
    let f = fixture();
    f.executing_op("auth", "v0-demo-auth-feature", IDLE_RECORD).await;
    let strategy = f.strategy(Duration::ZERO);
    let nudger = Nudger::new(&f.config, &f.state, &f.store, &f.sessions, &strategy);

    let actions = nudger.run_cycle().await.unwrap();
    assert_eq!(actions, vec![("v0-demo-auth-feature".to_string(), NudgeAction::Reaped)]);
    assert!(!f.sessions.is_live("v0-demo-auth-feature").await);

    let log = std::fs::read_to_string(f.store.paths().events_log("auth")).unwrap();
    assert!(log.contains("reaped idle"));
}

#[tokio::test]
async fn busy_session_is_left_alone() {
    let f = fixture();
    f.executing_op("auth", "v0-demo-auth-feature", BUSY_RECORD).await;
    let strategy = f.strategy(Duration::ZERO);
    let nudger = Nudger::new(&f.config, &f.state, &f.store, &f.sessions, &strategy);

    let actions = nudger.run_cycle().await.unwrap();
    assert_eq!(actions, vec![("v0-demo-auth-feature".to_string(), NudgeAction::LeftAlone)]);
    assert!(f.sessions.is_live("v0-demo-auth-feature").await);
}

#[tokio::test]
async fn fresh_journal_is_not_reaped_even_when_idle() {
    let f = fixture();
    f.executing_op("auth", "v0-demo-auth-feature", IDLE_RECORD).await;
    // Journal just written, staleness threshold an hour
    let strategy = f.strategy(Duration::from_secs(3600));
    let nudger = Nudger::new(&f.config, &f.state, &f.store, &f.sessions, &strategy);

    let actions = nudger.run_cycle().await.unwrap();
    assert_eq!(actions[0].1, NudgeAction::LeftAlone);
    assert!(f.sessions.is_live("v0-demo-auth-feature").await);
}

#[tokio::test]
async fn journal_error_reaps_session_and_fails_operation() {
    let f = fixture();
    f.executing_op("auth", "v0-demo-auth-feature", ERROR_RECORD).await;
    let strategy = f.strategy(Duration::ZERO);
    let nudger = Nudger::new(&f.config, &f.state, &f.store, &f.sessions, &strategy);

    let actions = nudger.run_cycle().await.unwrap();
    assert_eq!(
        actions[0].1,
        NudgeAction::Errored("credit balance too low".to_string())
    );
    // The session is gone, so a worker parked on it unblocks
    assert!(!f.sessions.is_live("v0-demo-auth-feature").await);
    // And the error reached the operation's phase
    assert_eq!(f.store.read_all("auth").unwrap().phase, v0_core::Phase::Failed);

    let log = std::fs::read_to_string(f.store.paths().events_log("auth")).unwrap();
    assert!(log.contains("event:error"));
    assert!(log.contains("credit balance too low"));
    assert!(log.contains("agent error"));
}

#[tokio::test]
async fn journal_error_on_non_executing_operation_only_reaps() {
    let f = fixture();
    f.executing_op("auth", "v0-demo-auth-feature", ERROR_RECORD).await;
    // The worker already moved the operation on (e.g. reaped it first)
    f.store.update("auth", "phase", serde_json::json!("interrupted")).unwrap();

    let strategy = f.strategy(Duration::ZERO);
    let nudger = Nudger::new(&f.config, &f.state, &f.store, &f.sessions, &strategy);
    let actions = nudger.run_cycle().await.unwrap();

    assert!(matches!(actions[0].1, NudgeAction::Errored(_)));
    assert!(!f.sessions.is_live("v0-demo-auth-feature").await);
    // No phase change behind the worker's back
    assert_eq!(f.store.read_all("auth").unwrap().phase, v0_core::Phase::Interrupted);
}

#[tokio::test]
async fn sessions_of_other_projects_are_ignored() {
    let f = fixture();
    f.sessions.start("v0-other-x-feature", Path::new("/w"), "agent").await.unwrap();
    let strategy = f.strategy(Duration::ZERO);
    let nudger = Nudger::new(&f.config, &f.state, &f.store, &f.sessions, &strategy);

    let actions = nudger.run_cycle().await.unwrap();
    assert!(actions.is_empty());
    assert!(f.sessions.is_live("v0-other-x-feature").await);
}

#[tokio::test]
async fn unowned_session_is_reaped_as_orphan() {
    let f = fixture();
    f.sessions.start("v0-demo-ghost-feature", Path::new("/w"), "agent").await.unwrap();
    let strategy = f.strategy(Duration::ZERO);
    let nudger = Nudger::new(&f.config, &f.state, &f.store, &f.sessions, &strategy);

    let actions = nudger.run_cycle().await.unwrap();
    assert_eq!(actions, vec![("v0-demo-ghost-feature".to_string(), NudgeAction::Orphan)]);
    assert!(!f.sessions.is_live("v0-demo-ghost-feature").await);
}

#[tokio::test]
async fn marker_owned_worker_session_uses_the_marker() {
    let f = fixture();
    // A poller session: no operation, but a marker points to its worktree
    let branch_dir = f.state.tree_dir().join("fix/DEMO-1");
    let worktree = branch_dir.join("repo");
    std::fs::create_dir_all(&worktree).unwrap();
    std::fs::write(branch_dir.join(".tmux-session"), "v0-demo-worker-fix\n").unwrap();

    f.sessions.start("v0-demo-worker-fix", &worktree, "agent").await.unwrap();

    let strategy = f.strategy(Duration::ZERO);
    std::fs::create_dir_all(f.temp.path().join("journals")).unwrap();
    std::fs::write(strategy.journal_path(&worktree), IDLE_RECORD).unwrap();

    let nudger = Nudger::new(&f.config, &f.state, &f.store, &f.sessions, &strategy);
    let actions = nudger.run_cycle().await.unwrap();
    assert_eq!(actions, vec![("v0-demo-worker-fix".to_string(), NudgeAction::Reaped)]);
}

#[tokio::test]
async fn singleton_discipline() {
    let f = fixture();
    let _held = PidFile::acquire(&f.state.nudge_pid()).unwrap().unwrap();
    let strategy = f.strategy(Duration::ZERO);
    let nudger = Nudger::new(&f.config, &f.state, &f.store, &f.sessions, &strategy);

    let started = nudger.run(CancellationToken::new()).await.unwrap();
    assert!(!started);
}
