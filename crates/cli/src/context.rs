// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command context: config plus the adapters every command shares.

use v0_adapters::{CliIssueStore, DesktopNotifyAdapter, TmuxSessions};
use v0_core::{BuildPaths, ProjectConfig, StatePaths, SystemClock};
use v0_storage::{MergeQueue, OperationStore};

use crate::exit_error::ExitError;

/// Issue-store CLI binary; overridable for alternative stores.
const DEFAULT_ISSUE_CLI: &str = "v0-issues";

pub struct Ctx {
    pub config: ProjectConfig,
    pub state: StatePaths,
    pub store: OperationStore<SystemClock>,
    pub queue: MergeQueue,
    pub sessions: TmuxSessions,
    pub issues: CliIssueStore,
    pub notifier: DesktopNotifyAdapter,
}

impl Ctx {
    /// Discover the project from the working directory and wire up the
    /// production adapters.
    pub fn load() -> Result<Self, ExitError> {
        let cwd = std::env::current_dir()
            .map_err(|e| ExitError::failure(format!("cannot read working directory: {e}")))?;
        let config = ProjectConfig::discover(&cwd)?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: ProjectConfig) -> Self {
        let state = StatePaths::resolve(&config.project);
        let build = BuildPaths::new(config.build_root());
        let issue_cli =
            std::env::var("V0_ISSUE_CLI").unwrap_or_else(|_| DEFAULT_ISSUE_CLI.to_string());

        // Back-pointer for `status --all`; best-effort
        if std::fs::create_dir_all(state.root()).is_ok() {
            let _ = std::fs::write(
                state.root_marker(),
                format!("{}\n", config.root.display()),
            );
        }

        Self {
            state,
            store: OperationStore::new(build.clone(), SystemClock),
            queue: MergeQueue::new(build.queue_file(), build.queue_lock()),
            sessions: TmuxSessions::new(),
            issues: CliIssueStore::new(issue_cli, &config.root),
            notifier: DesktopNotifyAdapter::new(config.disable_notifications),
            config,
        }
    }

    pub fn build_paths(&self) -> &BuildPaths {
        self.store.paths()
    }
}
