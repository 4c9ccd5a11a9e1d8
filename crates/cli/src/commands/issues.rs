// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fix` and `chore`: file issues for the pollers.

use crate::commands::intake;
use crate::context::Ctx;
use crate::exit_error::ExitError;
use v0_adapters::{IssueState, IssueStore};
use v0_core::OperationKind;

/// `v0 fix [<id>|<description>]`
pub async fn fix(ctx: &Ctx, target: Option<&str>) -> Result<(), ExitError> {
    match target {
        // An existing issue id: re-ready it for the poller
        Some(target) if target.starts_with(&format!("{}-", ctx.config.issue_prefix)) => {
            ctx.issues
                .set_status(target, IssueState::Todo)
                .await
                .map_err(|e| ExitError::failure(e.to_string()))?;
            println!("issue {target} readied for the fix worker");
        }
        Some(description) => {
            let id = intake(ctx).file_issue(OperationKind::Fix, description).await?;
            println!("filed {id}; the fix worker will pick it up");
        }
        None => {
            return Err(ExitError::failure("fix needs an issue id or a description"));
        }
    }
    hint_worker(ctx, OperationKind::Fix);
    Ok(())
}

/// `v0 chore <description>`
pub async fn chore(ctx: &Ctx, description: &str) -> Result<(), ExitError> {
    let id = intake(ctx).file_issue(OperationKind::Chore, description).await?;
    println!("filed {id}; the chore worker will pick it up");
    hint_worker(ctx, OperationKind::Chore);
    Ok(())
}

fn hint_worker(ctx: &Ctx, kind: OperationKind) {
    if !v0_storage::PidFile::is_held(&ctx.state.worker_pid(kind)) {
        println!("note: no {kind} worker running; `v0 start {kind}` to start one");
    }
}
