// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! v0: run a team of autonomous coding agents against one repository.
//!
//! The CLI is a thin dispatcher; scheduling, isolation, state, and
//! integration all live in v0-engine. Daemons are started as detached
//! `v0 worker <kind>` processes and coordinate purely through the
//! filesystem.

mod commands;
mod context;
mod exit_error;
mod logging;

use clap::{Parser, Subcommand, ValueEnum};

use exit_error::ExitError;

#[derive(Parser)]
#[command(name = "v0", version, about = "local orchestrator for autonomous coding agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WorkerKind {
    Fix,
    Chore,
    Mergeq,
    Nudge,
}

#[derive(Subcommand)]
enum Command {
    /// File a feature operation and run it to merge
    Build {
        name: String,
        /// The request; optional when --plan supplies one
        prompt: Option<String>,
        /// Operation this one depends on
        #[arg(long)]
        after: Option<String>,
        /// Pre-written plan file (repo-relative); skips the planning session
        #[arg(long)]
        plan: Option<String>,
    },
    /// Run only the planning session, then stop for review
    Plan { name: String, prompt: String },
    /// File a roadmap operation: a long-horizon build tracked like a feature
    Roadmap {
        name: String,
        prompt: String,
        #[arg(long)]
        after: Option<String>,
    },
    /// File a fix issue for the fix poller
    Fix {
        /// Issue id to re-ready, or a description of the bug
        target: Option<String>,
    },
    /// File a chore issue for the chore poller
    Chore { description: String },
    /// Show operations and their status
    Status {
        name: Option<String>,
        /// All v0 projects on this machine
        #[arg(long)]
        all: bool,
    },
    /// Attach to an operation's agent session
    Attach { target: String },
    /// Cancel an operation (terminal; prune removes its worktree)
    Cancel { name: String },
    /// Pause automatic progression without changing phase
    Hold { name: String },
    /// Clear hold / restart a failed, interrupted, or blocked operation
    Resume {
        /// Skip the blocker check
        #[arg(long)]
        force: bool,
        name: String,
    },
    /// Enqueue a merge, resolve a conflict, or run the merge daemon
    Merge {
        name: Option<String>,
        /// Launch a conflict-resolution session for the operation
        #[arg(long)]
        resolve: bool,
    },
    /// Remove terminal operations (state, worktree, branch)
    Prune { name: Option<String> },
    /// Start background workers (all four when no kind given)
    Start { worker: Option<WorkerKind> },
    /// Stop background workers
    Stop { worker: Option<WorkerKind> },
    /// Push the current branch of your checkout
    Push,
    /// Sync your checkout with the develop branch
    Pull {
        /// Launch a resolution session if the merge conflicts
        #[arg(long)]
        resolve: bool,
    },
    /// Block until an operation settles
    Wait {
        target: String,
        /// Seconds before giving up (exit 2)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Run a worker daemon in the foreground (started by `v0 start`)
    #[command(hide = true)]
    Worker { kind: WorkerKind },
    /// Drive one operation's state machine (spawned in the background)
    #[command(hide = true)]
    FeatureWorker { name: String },
    /// Supervise an Agent inside a tmux session
    #[command(hide = true)]
    Supervise {
        #[arg(long)]
        operation: String,
        #[arg(long)]
        root: std::path::PathBuf,
        #[arg(long)]
        remote: String,
        #[arg(long)]
        develop: String,
        /// The agent command line
        #[arg(last = true, required = true)]
        agent_cmd: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        // supervise runs inside agent sessions with no project context
        Command::Supervise { operation, root, remote, develop, agent_cmd } => {
            let code = v0_engine::supervisor::run(&v0_engine::supervisor::SupervisorArgs {
                operation,
                root,
                remote,
                develop_branch: develop,
                agent_cmd,
            });
            std::process::exit(code);
        }
        command => {
            if let Err(e) = run(command).await {
                eprintln!("v0: {e}");
                std::process::exit(e.code);
            }
        }
    }
}

async fn run(command: Command) -> Result<(), ExitError> {
    match command {
        Command::Worker { kind } => commands::workers::run_daemon(kind).await,
        other => {
            logging::init_cli();
            let ctx = context::Ctx::load()?;
            match other {
                Command::Build { name, prompt, after, plan } => {
                    commands::build::build(&ctx, &name, prompt.as_deref(), after.as_deref(), plan.as_deref())
                }
                Command::Plan { name, prompt } => commands::build::plan(&ctx, &name, &prompt).await,
                Command::Roadmap { name, prompt, after } => {
                    commands::build::roadmap(&ctx, &name, &prompt, after.as_deref())
                }
                Command::FeatureWorker { name } => commands::build::feature_worker(&ctx, &name).await,
                Command::Fix { target } => commands::issues::fix(&ctx, target.as_deref()).await,
                Command::Chore { description } => commands::issues::chore(&ctx, &description).await,
                Command::Status { name, all } => commands::status::status(&ctx, name.as_deref(), all).await,
                Command::Attach { target } => commands::attach::attach(&ctx, &target).await,
                Command::Cancel { name } => commands::lifecycle::cancel(&ctx, &name).await,
                Command::Hold { name } => commands::lifecycle::hold(&ctx, &name),
                Command::Resume { force, name } => commands::lifecycle::resume(&ctx, &name, force),
                Command::Merge { name, resolve } => commands::merge::merge(&ctx, name.as_deref(), resolve).await,
                Command::Prune { name } => commands::lifecycle::prune(&ctx, name.as_deref()).await,
                Command::Start { worker } => commands::workers::start(&ctx, worker),
                Command::Stop { worker } => commands::workers::stop(&ctx, worker).await,
                Command::Push => commands::sync::push(&ctx).await,
                Command::Pull { resolve } => commands::sync::pull(&ctx, resolve).await,
                Command::Wait { target, timeout } => commands::wait::wait(&ctx, &target, timeout).await,
                Command::Worker { .. } | Command::Supervise { .. } => unreachable!("handled above"),
            }
        }
    }
}
