// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `push` and `pull`: the user's own checkout, never the merge
//! workspace. A user synchronises without waiting for the queue.

use std::collections::HashMap;

use crate::context::Ctx;
use crate::exit_error::ExitError;
use v0_engine::session::{session_name, SessionHost, SessionSpec};
use v0_engine::{git, prompt, AgentRole, SessionOutcome};

/// `v0 push`: push the checkout's current branch.
pub async fn push(ctx: &Ctx) -> Result<(), ExitError> {
    let root = &ctx.config.root;
    let branch = git::current_branch(root).await?;
    git::push(root, &ctx.config.git_remote, &branch).await?;
    println!("pushed {branch} to {}", ctx.config.git_remote);
    Ok(())
}

/// `v0 pull [--resolve]`: merge the remote develop branch into the
/// checkout's current branch.
pub async fn pull(ctx: &Ctx, resolve: bool) -> Result<(), ExitError> {
    let root = &ctx.config.root;
    let remote = &ctx.config.git_remote;
    let develop = &ctx.config.develop_branch;

    git::fetch(root, remote).await?;
    let merge_ref = format!("{remote}/{develop}");
    match git::git(root, &["merge", "--no-edit", &merge_ref]).await {
        Ok(_) => {
            println!("up to date with {merge_ref}");
            Ok(())
        }
        Err(_) if git::git_ok(root, &["rev-parse", "--verify", "MERGE_HEAD"]).await => {
            if !resolve {
                return Err(ExitError::failure(format!(
                    "merge of {merge_ref} conflicts; resolve by hand or `v0 pull --resolve`"
                )));
            }
            resolve_pull(ctx, &merge_ref).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Launch a resolution session in the user's checkout to finish the
/// conflicted pull.
async fn resolve_pull(ctx: &Ctx, merge_ref: &str) -> Result<(), ExitError> {
    let root = &ctx.config.root;
    let branch = git::current_branch(root).await?;

    let mut vars = HashMap::new();
    vars.insert("operation".to_string(), "pull".to_string());
    vars.insert("repo".to_string(), ctx.config.project.clone());
    vars.insert("develop".to_string(), ctx.config.develop_branch.clone());
    vars.insert("branch".to_string(), branch.clone());

    let host = SessionHost::new(&ctx.config, &ctx.state, &ctx.sessions);
    let spec = SessionSpec {
        session: session_name(&ctx.config.project, "pull", v0_core::OperationKind::Chore),
        operation: "pull".to_string(),
        worktree: root.clone(),
        branch,
        prompt: prompt::interpolate(prompt::RESOLVE_TEMPLATE, &vars),
        role: AgentRole::Resolve,
    };
    println!("resolution session started in your checkout; waiting…");
    let outcome = host.run(&spec).await?;

    if outcome == SessionOutcome::Done {
        println!("pull of {merge_ref} resolved");
        Ok(())
    } else {
        Err(ExitError::failure(format!("resolution session ended {outcome:?}")))
    }
}
