// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `merge`: enqueue an operation, resolve a conflict, or run the daemon.

use crate::commands::workers;
use crate::context::Ctx;
use crate::exit_error::ExitError;
use std::collections::HashMap;
use v0_core::{Clock, Phase};
use v0_engine::session::{session_name, SessionHost, SessionSpec};
use v0_engine::{git, prompt, transitions, AgentRole, SessionOutcome, WorktreeManager};

pub async fn merge(ctx: &Ctx, name: Option<&str>, resolve: bool) -> Result<(), ExitError> {
    match (name, resolve) {
        (Some(name), true) => resolve_conflict(ctx, name).await,
        (Some(name), false) => enqueue(ctx, name),
        (None, _) => workers::run_daemon(crate::WorkerKind::Mergeq).await,
    }
}

/// Hand a completed operation to the merge daemon.
fn enqueue(ctx: &Ctx, name: &str) -> Result<(), ExitError> {
    let op = ctx.store.read_all(name)?;
    if !matches!(op.phase, Phase::Completed | Phase::PendingMerge) {
        return Err(ExitError::failure(format!(
            "{name} is {}, only completed operations can be merged",
            op.phase
        )));
    }
    ctx.queue
        .enqueue(name, ctx.store.clock().now_utc())
        .map_err(|e| ExitError::failure(e.to_string()))?;
    transitions::mark_merge_queued(&ctx.store, name)?;
    println!("{name} enqueued for merge");
    Ok(())
}

/// `merge --resolve <op>`: a short Agent session in the operation's
/// worktree that merges develop in and resolves; on success the branch
/// is pushed and the operation re-enqueued.
async fn resolve_conflict(ctx: &Ctx, name: &str) -> Result<(), ExitError> {
    let op = ctx.store.read_all(name)?;
    if op.phase != Phase::Conflict {
        return Err(ExitError::failure(format!("{name} is {}, not conflict", op.phase)));
    }

    let manager = WorktreeManager::new(&ctx.config, &ctx.state);
    let branch = manager.branch_for(op.kind, name);
    let worktree = manager.path_for(&branch);
    if !worktree.is_dir() {
        return Err(ExitError::not_found(format!("worktree for {name} is gone")));
    }

    let mut vars = HashMap::new();
    vars.insert("operation".to_string(), name.to_string());
    vars.insert("repo".to_string(), ctx.config.project.clone());
    vars.insert("develop".to_string(), ctx.config.develop_branch.clone());
    vars.insert("branch".to_string(), branch.clone());

    let host = SessionHost::new(&ctx.config, &ctx.state, &ctx.sessions);
    let spec = SessionSpec {
        session: session_name(&ctx.config.project, name, op.kind),
        operation: name.to_string(),
        worktree: worktree.clone(),
        branch: branch.clone(),
        prompt: prompt::interpolate(prompt::RESOLVE_TEMPLATE, &vars),
        role: AgentRole::Resolve,
    };
    println!("resolution session started for {name}; waiting…");
    let outcome = host.run(&spec).await?;

    if outcome != SessionOutcome::Done {
        return Err(ExitError::failure(format!(
            "resolution session ended {outcome:?}; {name} still in conflict"
        )));
    }

    git::push(&worktree, &ctx.config.git_remote, &branch).await?;
    transitions::to_pending_merge(&ctx.store, name)?;
    ctx.queue
        .enqueue(name, ctx.store.clock().now_utc())
        .map_err(|e| ExitError::failure(e.to_string()))?;
    println!("{name} resolved and re-enqueued");
    Ok(())
}
