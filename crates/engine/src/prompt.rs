// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt templates for agent sessions.
//!
//! Rendered with `{var}` interpolation from a known variable set:
//! `operation`, `kind`, `repo`, `remote`, `branch`, `develop`, `plan`,
//! `prompt`, `issue`, `plans_dir`. Unknown holes are left verbatim so a
//! template typo is visible in the session rather than silently empty.

use std::collections::HashMap;

/// Replace `{key}` holes from the variable map.
pub fn interpolate(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

/// Planning session: produce a plan file, no code.
pub const PLAN_TEMPLATE: &str = "\
You are the planning agent for operation '{operation}' in repo {repo}.
Request: {prompt}

Write an implementation plan to {plan} covering approach, files to touch,
and test strategy. Do not write any implementation code. When the plan
file is saved and complete, run .v0/bin/done.";

/// Executing session: implement the plan on the operation branch.
pub const EXECUTE_TEMPLATE: &str = "\
You are the build agent for operation '{operation}' in repo {repo},
working on branch {branch}. The plan is in {plan}; follow it.
Commit as you go. When the work builds and tests pass, run .v0/bin/done.
If you cannot finish, run .v0/bin/incomplete instead.";

/// Fix session: one issue, one branch.
pub const FIX_TEMPLATE: &str = "\
You are the fix agent working on issue {issue} in repo {repo}, on branch
{branch}. Reproduce the problem, fix it, and add a regression test.
Commit your work. When done, run .v0/bin/fixed. If the issue needs a
human decision, leave a note on {issue} via the issue CLI and run
.v0/bin/incomplete.";

/// Chore session: mechanical task, no planning.
pub const CHORE_TEMPLATE: &str = "\
You are the chore agent working on issue {issue} in repo {repo}, on
branch {branch}. Complete the task described in the issue and commit.
When done, run .v0/bin/fixed. If blocked, leave a note on {issue} and run
.v0/bin/incomplete.";

/// Conflict-resolution session: finish the in-progress merge.
pub const RESOLVE_TEMPLATE: &str = "\
Operation '{operation}' conflicts with {develop} in repo {repo}.
In this worktree, merge {develop} into {branch}, resolve every conflict
preserving the intent of both sides, and commit the merge. When the tree
is clean and tests pass, run .v0/bin/done.";

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
