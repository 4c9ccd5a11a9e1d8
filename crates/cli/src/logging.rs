// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing setup.
//!
//! Interactive commands log warnings to stderr; daemons append to the
//! project-level log file through a non-blocking appender. `V0_LOG`
//! filters both (env-filter syntax).

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use v0_core::BuildPaths;

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env("V0_LOG").unwrap_or_else(|_| EnvFilter::new(default))
}

/// Stderr logging for interactive commands.
pub fn init_cli() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("warn"))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// File logging for daemons (`{build_dir}/logs/v0.log`). The returned
/// guard must live as long as the daemon; dropping it flushes and
/// stops the writer thread.
pub fn init_daemon(build: &BuildPaths) -> Option<WorkerGuard> {
    let dir = build.logs_dir();
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("v0: cannot create log dir {}: {e}", dir.display());
        return None;
    }
    let appender = tracing_appender::rolling::never(&dir, "v0.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("info"))
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    Some(guard)
}
