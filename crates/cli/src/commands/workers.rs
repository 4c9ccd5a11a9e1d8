// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `start`/`stop` and the hidden foreground daemon runner.

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use v0_adapters::StopRecordStrategy;
use v0_core::OperationKind;
use v0_engine::{IssuePoller, MergeDaemon, Nudger};
use v0_storage::PidFile;

use crate::commands::spawn_detached;
use crate::context::Ctx;
use crate::exit_error::ExitError;
use crate::{logging, WorkerKind};

const ALL_WORKERS: [WorkerKind; 4] =
    [WorkerKind::Fix, WorkerKind::Chore, WorkerKind::Mergeq, WorkerKind::Nudge];

impl WorkerKind {
    fn as_str(self) -> &'static str {
        match self {
            WorkerKind::Fix => "fix",
            WorkerKind::Chore => "chore",
            WorkerKind::Mergeq => "mergeq",
            WorkerKind::Nudge => "nudge",
        }
    }

    fn pid_path(self, ctx: &Ctx) -> PathBuf {
        match self {
            WorkerKind::Fix => ctx.state.worker_pid(OperationKind::Fix),
            WorkerKind::Chore => ctx.state.worker_pid(OperationKind::Chore),
            WorkerKind::Mergeq => ctx.state.mergeq_pid(),
            WorkerKind::Nudge => ctx.state.nudge_pid(),
        }
    }
}

/// `v0 start [worker]`: spawn detached daemons. Starting an
/// already-running worker is a no-op (it observes the lock, exits 0).
pub fn start(ctx: &Ctx, worker: Option<WorkerKind>) -> Result<(), ExitError> {
    let kinds: &[WorkerKind] = match &worker {
        Some(kind) => std::slice::from_ref(kind),
        None => &ALL_WORKERS,
    };
    for kind in kinds {
        if PidFile::is_held(&kind.pid_path(ctx)) {
            println!("{} worker already running", kind.as_str());
            continue;
        }
        let pid = spawn_detached(&["worker", kind.as_str()])?;
        println!("{} worker started (pid {pid})", kind.as_str());
    }
    Ok(())
}

/// `v0 stop [worker]`: SIGTERM the recorded pid; the daemon finishes or
/// kills its in-flight session and removes its pid file.
pub async fn stop(ctx: &Ctx, worker: Option<WorkerKind>) -> Result<(), ExitError> {
    let kinds: &[WorkerKind] = match &worker {
        Some(kind) => std::slice::from_ref(kind),
        None => &ALL_WORKERS,
    };
    for kind in kinds {
        let path = kind.pid_path(ctx);
        if !PidFile::is_held(&path) {
            println!("{} worker not running", kind.as_str());
            continue;
        }
        let Some(pid) = PidFile::read_pid(&path) else {
            println!("{} worker lock held but pid unreadable", kind.as_str());
            continue;
        };
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid as i32),
            nix::sys::signal::Signal::SIGTERM,
        );

        // Give it a moment to release the lock and clean up
        for _ in 0..50 {
            if !PidFile::is_held(&path) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        if PidFile::is_held(&path) {
            println!("{} worker (pid {pid}) did not stop within 5s", kind.as_str());
        } else {
            println!("{} worker stopped", kind.as_str());
        }
    }
    Ok(())
}

/// Hidden `v0 worker <kind>`: run one daemon in the foreground until
/// SIGTERM/SIGINT.
pub async fn run_daemon(kind: WorkerKind) -> Result<(), ExitError> {
    let ctx = Ctx::load()?;
    let _guard = logging::init_daemon(ctx.build_paths());
    let shutdown = shutdown_token();

    let started = match kind {
        WorkerKind::Fix | WorkerKind::Chore => {
            let op_kind =
                if kind == WorkerKind::Fix { OperationKind::Fix } else { OperationKind::Chore };
            IssuePoller::new(
                &ctx.config,
                &ctx.state,
                &ctx.store,
                &ctx.queue,
                &ctx.sessions,
                &ctx.issues,
                op_kind,
            )
            .run(shutdown)
            .await?
        }
        WorkerKind::Mergeq => MergeDaemon::new(
            &ctx.config,
            &ctx.state,
            &ctx.store,
            &ctx.queue,
            &ctx.sessions,
            &ctx.issues,
            &ctx.notifier,
        )
        .run(shutdown)
        .await?,
        WorkerKind::Nudge => {
            let strategy = StopRecordStrategy::new(journal_root());
            Nudger::new(&ctx.config, &ctx.state, &ctx.store, &ctx.sessions, &strategy)
                .run(shutdown)
                .await?
        }
    };

    // A second instance observing the singleton lock exits 0
    let _ = started;
    Ok(())
}

/// Where the Agent keeps its per-project session journals.
fn journal_root() -> PathBuf {
    if let Ok(dir) = std::env::var("V0_JOURNAL_DIR") {
        return PathBuf::from(dir);
    }
    dirs_home().join(".claude/projects")
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/"))
}

/// Cancellation on SIGTERM or SIGINT.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                tracing::error!(error = %e, "cannot install SIGTERM handler");
                return;
            }
        };
        let mut int = match signal(SignalKind::interrupt()) {
            Ok(int) => int,
            Err(e) => {
                tracing::error!(error = %e, "cannot install SIGINT handler");
                return;
            }
        };
        tokio::select! {
            _ = term.recv() => {}
            _ = int.recv() => {}
        }
        tracing::info!("shutdown signal received");
        cancel.cancel();
    });
    token
}
