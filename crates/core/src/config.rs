// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project configuration (`.v0.rc`).
//!
//! The rc file is shell-sourceable `KEY="value"` lines so the same file
//! works for the agent completion scripts; we parse it by hand into a
//! typed [`ProjectConfig`] rather than sourcing it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Name of the project marker/config file at the repository root.
pub const RC_FILE: &str = ".v0.rc";

/// Errors from loading or parsing project configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no {RC_FILE} found at or above {0}")]
    NoProjectRoot(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: {message}")]
    Parse { path: PathBuf, line: usize, message: String },
    #[error("missing required key {0} in {RC_FILE}")]
    MissingKey(&'static str),
    #[error("invalid V0_WORKSPACE_MODE {0:?} (expected clone or worktree)")]
    InvalidWorkspaceMode(String),
}

/// How the merge workspace is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceMode {
    /// Bare-remote-backed clone; used when develop is a shared branch
    Clone,
    /// Additional worktree off the project's git directory
    Worktree,
}

impl WorkspaceMode {
    /// Infer the mode from the develop branch name: shared integration
    /// branches get a clone, agent-only branches share the git dir.
    pub fn infer(develop_branch: &str) -> Self {
        match develop_branch {
            "main" | "master" | "develop" => WorkspaceMode::Clone,
            _ => WorkspaceMode::Worktree,
        }
    }
}

impl FromStr for WorkspaceMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clone" => Ok(WorkspaceMode::Clone),
            "worktree" => Ok(WorkspaceMode::Worktree),
            other => Err(ConfigError::InvalidWorkspaceMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for WorkspaceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            WorkspaceMode::Clone => "clone",
            WorkspaceMode::Worktree => "worktree",
        })
    }
}

/// A branch-name template with a single `{name}` or `{id}` hole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchPattern(String);

impl BranchPattern {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// Expand the template with the operation name or issue id.
    pub fn expand(&self, value: &str) -> String {
        self.0.replace("{name}", value).replace("{id}", value)
    }

    pub fn template(&self) -> &str {
        &self.0
    }
}

/// Typed view of `.v0.rc`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectConfig {
    /// Project root (the directory containing `.v0.rc`)
    pub root: PathBuf,
    /// PROJECT: scopes state dirs and session names
    pub project: String,
    /// ISSUE_PREFIX: the issue store's id prefix for this project
    pub issue_prefix: String,
    /// V0_BUILD_DIR, relative to the root (default `.v0/build`)
    pub build_dir: PathBuf,
    /// V0_PLANS_DIR, relative to the root (default `plans`)
    pub plans_dir: PathBuf,
    /// V0_DEVELOP_BRANCH: the integration branch the merge daemon targets
    pub develop_branch: String,
    /// V0_GIT_REMOTE
    pub git_remote: String,
    /// V0_FEATURE_BRANCH template (`{name}`)
    pub feature_branch: BranchPattern,
    /// V0_BUGFIX_BRANCH template (`{id}`)
    pub bugfix_branch: BranchPattern,
    /// V0_CHORE_BRANCH template (`{id}`)
    pub chore_branch: BranchPattern,
    /// V0_WORKSPACE_MODE; inferred from the develop branch when unset
    pub workspace_mode: Option<WorkspaceMode>,
    /// V0_WORKTREE_INIT: shell command run once in each new worktree
    pub worktree_init: Option<String>,
    /// DISABLE_NOTIFICATIONS
    pub disable_notifications: bool,
}

impl ProjectConfig {
    /// Walk up from `start` to the directory containing `.v0.rc`.
    pub fn find_root(start: &Path) -> Result<PathBuf, ConfigError> {
        let mut dir = start;
        loop {
            if dir.join(RC_FILE).is_file() {
                return Ok(dir.to_path_buf());
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => return Err(ConfigError::NoProjectRoot(start.to_path_buf())),
            }
        }
    }

    /// Load `.v0.rc` from an explicit project root.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(RC_FILE);
        let contents = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
        Self::parse(root, &path, &contents)
    }

    /// Locate the project root from `start` and load its config.
    pub fn discover(start: &Path) -> Result<Self, ConfigError> {
        let root = Self::find_root(start)?;
        Self::load(&root)
    }

    /// Effective workspace mode: configured, else inferred.
    pub fn effective_workspace_mode(&self) -> WorkspaceMode {
        self.workspace_mode.unwrap_or_else(|| WorkspaceMode::infer(&self.develop_branch))
    }

    /// Branch template for the given operation kind.
    pub fn branch_pattern(&self, kind: crate::OperationKind) -> &BranchPattern {
        match kind {
            crate::OperationKind::Fix => &self.bugfix_branch,
            crate::OperationKind::Chore => &self.chore_branch,
            crate::OperationKind::Feature | crate::OperationKind::Roadmap => &self.feature_branch,
        }
    }

    /// Absolute build dir (`{root}/{V0_BUILD_DIR}`).
    pub fn build_root(&self) -> PathBuf {
        self.root.join(&self.build_dir)
    }

    fn parse(root: &Path, path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let values = parse_rc(path, contents)?;

        let require = |key: &'static str| {
            values.get(key).filter(|v| !v.is_empty()).cloned().ok_or(ConfigError::MissingKey(key))
        };
        let get = |key: &str| values.get(key).filter(|v| !v.is_empty()).cloned();

        let develop_branch = get("V0_DEVELOP_BRANCH").unwrap_or_else(|| "main".to_string());
        let workspace_mode = match values.get("V0_WORKSPACE_MODE") {
            Some(raw) if !raw.is_empty() => Some(raw.parse()?),
            _ => None,
        };

        Ok(Self {
            root: root.to_path_buf(),
            project: require("PROJECT")?,
            issue_prefix: require("ISSUE_PREFIX")?,
            build_dir: PathBuf::from(get("V0_BUILD_DIR").unwrap_or_else(|| ".v0/build".into())),
            plans_dir: PathBuf::from(get("V0_PLANS_DIR").unwrap_or_else(|| "plans".into())),
            develop_branch,
            git_remote: get("V0_GIT_REMOTE").unwrap_or_else(|| "origin".to_string()),
            feature_branch: BranchPattern::new(
                get("V0_FEATURE_BRANCH").unwrap_or_else(|| "feature/{name}".into()),
            ),
            bugfix_branch: BranchPattern::new(
                get("V0_BUGFIX_BRANCH").unwrap_or_else(|| "fix/{id}".into()),
            ),
            chore_branch: BranchPattern::new(
                get("V0_CHORE_BRANCH").unwrap_or_else(|| "chore/{id}".into()),
            ),
            workspace_mode,
            worktree_init: get("V0_WORKTREE_INIT"),
            disable_notifications: values
                .get("DISABLE_NOTIFICATIONS")
                .map(|v| !matches!(v.as_str(), "" | "0" | "false"))
                .unwrap_or(false),
        })
    }
}

/// Parse shell-sourceable `KEY="value"` lines into a map.
///
/// Accepts an optional `export ` prefix, `#` comments, single- or
/// double-quoted values (with `\"` and `\\` escapes inside double quotes),
/// and bare single-word values. Anything fancier (command substitution,
/// multi-line strings) is rejected rather than half-parsed.
fn parse_rc(path: &Path, contents: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut values = HashMap::new();

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line).trim_start();

        let Some((key, value)) = line.split_once('=') else {
            return Err(parse_error(path, idx, "expected KEY=value"));
        };
        let key = key.trim_end();
        if key.is_empty()
            || !key.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(parse_error(path, idx, &format!("invalid key {key:?}")));
        }

        let value = parse_value(value.trim()).ok_or_else(|| {
            parse_error(path, idx, &format!("unterminated or malformed value for {key}"))
        })?;
        values.insert(key.to_string(), value);
    }

    Ok(values)
}

fn parse_value(raw: &str) -> Option<String> {
    if let Some(rest) = raw.strip_prefix('"') {
        let mut out = String::new();
        let mut chars = rest.chars();
        while let Some(c) = chars.next() {
            match c {
                '"' => {
                    // Trailing comments allowed after the closing quote
                    let tail = chars.as_str().trim_start();
                    if tail.is_empty() || tail.starts_with('#') {
                        return Some(out);
                    }
                    return None;
                }
                '\\' => match chars.next()? {
                    '"' => out.push('"'),
                    '\\' => out.push('\\'),
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                },
                other => out.push(other),
            }
        }
        None
    } else if let Some(rest) = raw.strip_prefix('\'') {
        let (value, tail) = rest.split_once('\'')?;
        let tail = tail.trim_start();
        if tail.is_empty() || tail.starts_with('#') {
            Some(value.to_string())
        } else {
            None
        }
    } else {
        // Bare value: single word, stop at a comment
        let word = raw.split('#').next().unwrap_or("").trim();
        if word.chars().any(char::is_whitespace) {
            None
        } else {
            Some(word.to_string())
        }
    }
}

fn parse_error(path: &Path, idx: usize, message: &str) -> ConfigError {
    ConfigError::Parse { path: path.to_path_buf(), line: idx + 1, message: message.to_string() }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
