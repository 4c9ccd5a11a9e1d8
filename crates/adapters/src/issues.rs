// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Issue-store adapter.
//!
//! The issue store is an external line-oriented CLI producing JSON. v0
//! uses it as the authoritative source for blocker edges and as the work
//! queue the fix/chore pollers drain. Any compatible implementation
//! satisfies the contract; the binary name is configured per store.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tokio::process::Command;

use crate::subprocess::{run_with_timeout, SubprocessError, ISSUE_TIMEOUT};

/// Issues untouched for longer than this fall out of list queries.
pub const LIST_HORIZON: Duration = Duration::hours(72);

/// Label marking an issue as paused; pollers skip held issues.
pub const HELD_LABEL: &str = "held";

#[derive(Debug, Error)]
pub enum IssueStoreError {
    #[error("issue not found: {0}")]
    NotFound(String),
    #[error("issue store command failed: {0}")]
    Command(String),
    #[error("unparseable issue store output: {0}")]
    BadOutput(#[from] serde_json::Error),
    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
}

/// Issue lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    Todo,
    InProgress,
    Done,
    Closed,
}

impl IssueState {
    /// Open issues still block their dependents.
    pub fn is_open(self) -> bool {
        !matches!(self, IssueState::Done | IssueState::Closed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IssueState::Todo => "todo",
            IssueState::InProgress => "in_progress",
            IssueState::Done => "done",
            IssueState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for IssueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One issue, as the store's `show --json` reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub status: IssueState,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Ids of issues blocking this one
    #[serde(default)]
    pub blockers: Vec<String>,
    /// Ids of issues this one blocks
    #[serde(default)]
    pub blocking: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Issue {
    pub fn is_held(&self) -> bool {
        self.labels.iter().any(|l| l == HELD_LABEL)
    }

    /// The operation name carried in a `plan:<name>` label, if any.
    pub fn plan_label(&self) -> Option<&str> {
        self.labels.iter().find_map(|l| l.strip_prefix("plan:"))
    }

    /// Ready for a poller: todo, unassigned, not held.
    ///
    /// Open blockers are checked separately; they need further store
    /// queries.
    pub fn is_claimable(&self) -> bool {
        self.status == IssueState::Todo && self.assignee.is_none() && !self.is_held()
    }
}

/// Adapter over the issue store.
#[async_trait]
pub trait IssueStore: Clone + Send + Sync + 'static {
    /// Create an issue; returns its id.
    async fn create(&self, title: &str, labels: &[String]) -> Result<String, IssueStoreError>;

    async fn show(&self, id: &str) -> Result<Issue, IssueStoreError>;

    async fn add_label(&self, id: &str, label: &str) -> Result<(), IssueStoreError>;

    /// Add a blocked-by edge: `id` waits on `blocker`.
    async fn add_blocker(&self, id: &str, blocker: &str) -> Result<(), IssueStoreError>;

    async fn set_status(&self, id: &str, status: IssueState) -> Result<(), IssueStoreError>;

    async fn assign(&self, id: &str, assignee: &str) -> Result<(), IssueStoreError>;

    /// Issues carrying `label`, recently updated, any status.
    async fn list_with_label(&self, label: &str) -> Result<Vec<Issue>, IssueStoreError>;

    /// Oldest issue of the given kind that a poller may claim: todo,
    /// unassigned, not held, and no open blockers.
    async fn next_ready(&self, kind_label: &str) -> Result<Option<Issue>, IssueStoreError> {
        let candidates = self.list_with_label(kind_label).await?;
        for issue in candidates {
            if !issue.is_claimable() {
                continue;
            }
            let mut blocked = false;
            for blocker in &issue.blockers {
                if self.show(blocker).await.map(|b| b.status.is_open()).unwrap_or(false) {
                    blocked = true;
                    break;
                }
            }
            if !blocked {
                return Ok(Some(issue));
            }
        }
        Ok(None)
    }
}

/// Production adapter shelling out to the configured issue CLI.
///
/// Expected surface (all JSON on stdout):
/// `create --json --title T [--label L]…`, `show --json ID`,
/// `label ID LABEL`, `dep ID --blocked-by ID`, `status ID STATE`,
/// `assign ID WHO`, `list --json --label L --updated-within 72h`.
#[derive(Debug, Clone)]
pub struct CliIssueStore {
    binary: String,
    cwd: PathBuf,
}

impl CliIssueStore {
    pub fn new(binary: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into(), cwd: cwd.into() }
    }

    async fn run(&self, args: &[&str]) -> Result<String, IssueStoreError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).current_dir(&self.cwd);
        let output = run_with_timeout(cmd, ISSUE_TIMEOUT, "issue store").await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("not found") {
                return Err(IssueStoreError::NotFound(args.join(" ")));
            }
            return Err(IssueStoreError::Command(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[derive(Deserialize)]
struct CreatedIssue {
    id: String,
}

#[async_trait]
impl IssueStore for CliIssueStore {
    async fn create(&self, title: &str, labels: &[String]) -> Result<String, IssueStoreError> {
        let mut args = vec!["create", "--json", "--title", title];
        for label in labels {
            args.push("--label");
            args.push(label);
        }
        let stdout = self.run(&args).await?;
        let created: CreatedIssue = serde_json::from_str(stdout.trim())?;
        Ok(created.id)
    }

    async fn show(&self, id: &str) -> Result<Issue, IssueStoreError> {
        let stdout = self.run(&["show", "--json", id]).await?;
        Ok(serde_json::from_str(stdout.trim())?)
    }

    async fn add_label(&self, id: &str, label: &str) -> Result<(), IssueStoreError> {
        self.run(&["label", id, label]).await.map(drop)
    }

    async fn add_blocker(&self, id: &str, blocker: &str) -> Result<(), IssueStoreError> {
        self.run(&["dep", id, "--blocked-by", blocker]).await.map(drop)
    }

    async fn set_status(&self, id: &str, status: IssueState) -> Result<(), IssueStoreError> {
        self.run(&["status", id, status.as_str()]).await.map(drop)
    }

    async fn assign(&self, id: &str, assignee: &str) -> Result<(), IssueStoreError> {
        self.run(&["assign", id, assignee]).await.map(drop)
    }

    async fn list_with_label(&self, label: &str) -> Result<Vec<Issue>, IssueStoreError> {
        let stdout =
            self.run(&["list", "--json", "--label", label, "--updated-within", "72h"]).await?;
        Ok(serde_json::from_str(stdout.trim())?)
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{Issue, IssueState, IssueStore, IssueStoreError, LIST_HORIZON};
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeIssueStoreState {
        /// Insertion order doubles as issue age for `next_ready`
        issues: Vec<Issue>,
        next_id: u64,
        prefix: String,
    }

    /// In-memory issue store for tests.
    #[derive(Clone)]
    pub struct FakeIssueStore {
        inner: Arc<Mutex<FakeIssueStoreState>>,
    }

    impl Default for FakeIssueStore {
        fn default() -> Self {
            Self::with_prefix("V0")
        }
    }

    impl FakeIssueStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_prefix(prefix: &str) -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeIssueStoreState {
                    issues: Vec::new(),
                    next_id: 1,
                    prefix: prefix.to_string(),
                })),
            }
        }

        /// Seed a fully-formed issue (tests that need specific ids).
        pub fn seed(&self, issue: Issue) {
            self.inner.lock().issues.push(issue);
        }

        /// Current state of an issue, if it exists.
        pub fn get(&self, id: &str) -> Option<Issue> {
            self.inner.lock().issues.iter().find(|i| i.id == id).cloned()
        }

        /// Clear the assignee, as a human would when re-readying an issue.
        pub fn clear_assignee(&self, id: &str) {
            let mut state = self.inner.lock();
            if let Some(issue) = state.issues.iter_mut().find(|i| i.id == id) {
                issue.assignee = None;
            }
        }

        /// Append a note, as an agent session would via the store CLI.
        pub fn add_note(&self, id: &str, note: &str) {
            let mut state = self.inner.lock();
            if let Some(issue) = state.issues.iter_mut().find(|i| i.id == id) {
                issue.notes.push(note.to_string());
                issue.updated_at = Some(Utc::now());
            }
        }

        fn mutate(
            &self,
            id: &str,
            f: impl FnOnce(&mut Issue),
        ) -> Result<(), IssueStoreError> {
            let mut state = self.inner.lock();
            let issue = state
                .issues
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| IssueStoreError::NotFound(id.to_string()))?;
            f(issue);
            issue.updated_at = Some(Utc::now());
            Ok(())
        }
    }

    #[async_trait]
    impl IssueStore for FakeIssueStore {
        async fn create(
            &self,
            title: &str,
            labels: &[String],
        ) -> Result<String, IssueStoreError> {
            let mut state = self.inner.lock();
            let id = format!("{}-{}", state.prefix, state.next_id);
            state.next_id += 1;
            state.issues.push(Issue {
                id: id.clone(),
                title: title.to_string(),
                status: IssueState::Todo,
                labels: labels.to_vec(),
                blockers: Vec::new(),
                blocking: Vec::new(),
                notes: Vec::new(),
                assignee: None,
                updated_at: Some(Utc::now()),
            });
            Ok(id)
        }

        async fn show(&self, id: &str) -> Result<Issue, IssueStoreError> {
            self.get(id).ok_or_else(|| IssueStoreError::NotFound(id.to_string()))
        }

        async fn add_label(&self, id: &str, label: &str) -> Result<(), IssueStoreError> {
            self.mutate(id, |issue| issue.labels.push(label.to_string()))
        }

        async fn add_blocker(&self, id: &str, blocker: &str) -> Result<(), IssueStoreError> {
            self.mutate(id, |issue| issue.blockers.push(blocker.to_string()))?;
            let _ = self.mutate(blocker, |issue| issue.blocking.push(id.to_string()));
            Ok(())
        }

        async fn set_status(
            &self,
            id: &str,
            status: IssueState,
        ) -> Result<(), IssueStoreError> {
            self.mutate(id, |issue| issue.status = status)
        }

        async fn assign(&self, id: &str, assignee: &str) -> Result<(), IssueStoreError> {
            self.mutate(id, |issue| issue.assignee = Some(assignee.to_string()))
        }

        async fn list_with_label(&self, label: &str) -> Result<Vec<Issue>, IssueStoreError> {
            let now = Utc::now();
            Ok(self
                .inner
                .lock()
                .issues
                .iter()
                .filter(|i| i.labels.iter().any(|l| l == label))
                .filter(|i| i.updated_at.map(|t| now - t < LIST_HORIZON).unwrap_or(true))
                .cloned()
                .collect())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeIssueStore;

#[cfg(test)]
#[path = "issues_tests.rs"]
mod tests;
