// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `status`: render operations through the display-status derivation.
//!
//! The single-operation view adds the fields a human reaches for when
//! something is stuck; the table view is one line per operation. Both
//! get their strings exclusively from [`v0_core::display_status`].

use crate::context::Ctx;
use crate::exit_error::ExitError;
use v0_adapters::SessionAdapter;
use v0_core::{display_status, ColorHint, Operation, ProjectConfig, StatePaths};

pub async fn status(ctx: &Ctx, name: Option<&str>, all: bool) -> Result<(), ExitError> {
    if all {
        return status_all(ctx).await;
    }
    match name {
        Some(name) => detail(ctx, name).await,
        None => table(ctx).await,
    }
}

async fn detail(ctx: &Ctx, name: &str) -> Result<(), ExitError> {
    let op = ctx.store.read_all(name)?;
    let line = display_status(&op, session_alive(ctx, &op).await);

    println!("{}  {}  {}", op.name, paint(line.label, line.color), line.icon);
    println!("  kind:     {}", op.kind);
    println!("  phase:    {}", op.phase);
    println!("  machine:  {}", op.machine);
    println!("  created:  {}", op.created_at);
    if let Some(plan) = &op.plan_file {
        println!("  plan:     {plan}");
    }
    if let Some(epic) = &op.epic_id {
        println!("  epic:     {epic}");
    }
    if let Some(worktree) = &op.worktree {
        println!("  worktree: {}", worktree.display());
    }
    if let Some(session) = &op.tmux_session {
        println!("  session:  {session}");
    }
    if let Some(after) = &op.after {
        println!("  after:    {after}");
    }
    if let Some(status) = &op.merge_status {
        println!("  merge:    {status}");
    }
    Ok(())
}

async fn table(ctx: &Ctx) -> Result<(), ExitError> {
    let names = ctx.store.list()?;
    if names.is_empty() {
        println!("no operations; `v0 build <name> <prompt>` files one");
        return Ok(());
    }
    for name in names {
        let Ok(op) = ctx.store.read_all(&name) else {
            println!("{name:<24} (unreadable state document)");
            continue;
        };
        let line = display_status(&op, session_alive(ctx, &op).await);
        println!("{:<24} {:<12} {}", op.name, paint(line.label, line.color), line.icon);
    }
    Ok(())
}

/// `status --all`: every project with a `.v0.root` back-pointer under
/// the shared state root.
async fn status_all(ctx: &Ctx) -> Result<(), ExitError> {
    let Some(v0_root) = ctx.state.root().parent() else {
        return table(ctx).await;
    };
    let Ok(entries) = std::fs::read_dir(v0_root) else {
        return table(ctx).await;
    };

    for entry in entries.flatten() {
        let state = StatePaths::at(entry.path());
        let Ok(root) = std::fs::read_to_string(state.root_marker()) else {
            continue;
        };
        let Ok(config) = ProjectConfig::load(std::path::Path::new(root.trim())) else {
            println!("{}: project root gone ({})", entry.file_name().to_string_lossy(), root.trim());
            continue;
        };
        println!("== {} ({})", config.project, config.root.display());
        let project_ctx = Ctx::from_config(config);
        table(&project_ctx).await?;
    }
    Ok(())
}

async fn session_alive(ctx: &Ctx, op: &Operation) -> bool {
    match &op.tmux_session {
        Some(session) => ctx.sessions.is_live(session).await,
        None => false,
    }
}

/// ANSI-paint a label per its colour hint; plain when not a tty.
fn paint(label: &str, color: ColorHint) -> String {
    use std::io::IsTerminal;
    if !std::io::stdout().is_terminal() {
        return label.to_string();
    }
    let code = match color {
        ColorHint::Cyan => "36",
        ColorHint::Yellow => "33",
        ColorHint::Red => "31",
        ColorHint::Green => "32",
        ColorHint::Magenta => "35",
        ColorHint::Blue => "34",
        ColorHint::Gray => "90",
        ColorHint::Default => return label.to_string(),
    };
    format!("\x1b[{code}m{label}\x1b[0m")
}
