// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `attach`: drop the user into an operation's agent session.

use crate::context::Ctx;
use crate::exit_error::ExitError;

/// `target` is an operation name (preferred) or a raw session name.
pub async fn attach(ctx: &Ctx, target: &str) -> Result<(), ExitError> {
    let session = if ctx.store.exists(target) {
        let op = ctx.store.read_all(target)?;
        op.tmux_session
            .ok_or_else(|| ExitError::failure(format!("{target} has no live session")))?
    } else if target.starts_with("v0-") {
        target.to_string()
    } else {
        return Err(ExitError::not_found(format!("operation not found: {target}")));
    };

    // Hand the terminal over to tmux
    let status = std::process::Command::new("tmux")
        .args(["attach-session", "-t", &format!("={session}")])
        .status()
        .map_err(|e| ExitError::failure(format!("tmux attach failed: {e}")))?;
    if !status.success() {
        return Err(ExitError::failure(format!("could not attach to {session}")));
    }
    Ok(())
}
