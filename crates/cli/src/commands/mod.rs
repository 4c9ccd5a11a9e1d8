// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command handlers: thin glue from clap to the engine.

pub mod attach;
pub mod build;
pub mod issues;
pub mod lifecycle;
pub mod merge;
pub mod status;
pub mod sync;
pub mod wait;
pub mod workers;

use crate::context::Ctx;
use crate::exit_error::ExitError;
use v0_engine::Intake;

/// The intake facade every lifecycle command goes through.
pub(crate) fn intake(
    ctx: &Ctx,
) -> Intake<'_, v0_adapters::TmuxSessions, v0_adapters::CliIssueStore, v0_core::SystemClock> {
    Intake::new(&ctx.config, &ctx.state, &ctx.store, &ctx.sessions, &ctx.issues)
}

/// Spawn a detached `v0 <args…>` child that outlives this command.
pub(crate) fn spawn_detached(args: &[&str]) -> Result<u32, ExitError> {
    let exe = std::env::current_exe()
        .map_err(|e| ExitError::failure(format!("cannot locate v0 binary: {e}")))?;
    let child = std::process::Command::new(exe)
        .args(args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| ExitError::failure(format!("spawn failed: {e}")))?;
    Ok(child.id())
}
