// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hold`, `resume`, `cancel`, `prune`.

use crate::commands::{intake, spawn_detached};
use crate::context::Ctx;
use crate::exit_error::ExitError;

pub fn hold(ctx: &Ctx, name: &str) -> Result<(), ExitError> {
    intake(ctx).hold(name)?;
    println!("{name} held");
    Ok(())
}

/// Clear hold / move a resumable operation back into the machine, then
/// restart its worker in the background.
pub fn resume(ctx: &Ctx, name: &str, force: bool) -> Result<(), ExitError> {
    let phase = intake(ctx).resume(name, force)?;
    let pid = spawn_detached(&["feature-worker", name])?;
    println!("{name} resuming at {phase} (worker pid {pid})");
    Ok(())
}

pub async fn cancel(ctx: &Ctx, name: &str) -> Result<(), ExitError> {
    intake(ctx).cancel(name).await?;
    println!("{name} cancelled; worktree kept until `v0 prune {name}`");
    Ok(())
}

pub async fn prune(ctx: &Ctx, name: Option<&str>) -> Result<(), ExitError> {
    match name {
        Some(name) => {
            intake(ctx).prune(name).await?;
            println!("{name} pruned");
        }
        None => {
            let pruned = intake(ctx).prune_terminal().await?;
            if pruned.is_empty() {
                println!("nothing to prune");
            } else {
                println!("pruned: {}", pruned.join(", "));
            }
        }
    }
    Ok(())
}
