// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `build`, `plan`, and the hidden background feature worker.

use crate::commands::{intake, spawn_detached};
use crate::context::Ctx;
use crate::exit_error::ExitError;
use v0_core::OperationKind;
use v0_engine::{FeatureOutcome, FeatureWorker};

/// `v0 build <name> [<prompt>] [--after X] [--plan FILE]`
pub fn build(
    ctx: &Ctx,
    name: &str,
    prompt: Option<&str>,
    after: Option<&str>,
    plan: Option<&str>,
) -> Result<(), ExitError> {
    let prompt = match (prompt, plan) {
        (Some(prompt), _) => prompt,
        (None, Some(plan)) => {
            if !ctx.config.root.join(plan).is_file() {
                return Err(ExitError::not_found(format!("plan file {plan} not found")));
            }
            "follow the provided plan"
        }
        (None, None) => return Err(ExitError::failure("build needs a prompt or --plan")),
    };

    intake(ctx).create_operation(name, OperationKind::Feature, prompt, after, plan)?;
    let pid = spawn_detached(&["feature-worker", name])?;
    println!("operation {name} filed; worker running (pid {pid})");
    Ok(())
}

/// `v0 roadmap <name> <prompt>`: same machinery as build, different
/// kind so status and branch naming distinguish long-horizon work.
pub fn roadmap(
    ctx: &Ctx,
    name: &str,
    prompt: &str,
    after: Option<&str>,
) -> Result<(), ExitError> {
    intake(ctx).create_operation(name, OperationKind::Roadmap, prompt, after, None)?;
    let pid = spawn_detached(&["feature-worker", name])?;
    println!("roadmap {name} filed; worker running (pid {pid})");
    Ok(())
}

/// `v0 plan <name> <prompt>`: plan synchronously, then hold for review.
///
/// The hold makes the worker stop cleanly once planning lands the
/// operation in `planned`; `v0 resume <name>` continues to execution.
pub async fn plan(ctx: &Ctx, name: &str, prompt: &str) -> Result<(), ExitError> {
    let intake = intake(ctx);
    intake.create_operation(name, OperationKind::Feature, prompt, None, None)?;
    intake.hold(name)?;

    let worker = FeatureWorker::new(
        &ctx.config,
        &ctx.state,
        &ctx.store,
        &ctx.queue,
        &ctx.sessions,
        &ctx.issues,
    );
    worker.drive(name).await?;

    let op = ctx.store.read_all(name)?;
    match &op.plan_file {
        Some(plan) => println!("plan written to {plan}; `v0 resume {name}` to build"),
        None => return Err(ExitError::failure("planning session produced no plan")),
    }
    Ok(())
}

/// Hidden `v0 feature-worker <name>`: the detached driver process.
pub async fn feature_worker(ctx: &Ctx, name: &str) -> Result<(), ExitError> {
    let worker = FeatureWorker::new(
        &ctx.config,
        &ctx.state,
        &ctx.store,
        &ctx.queue,
        &ctx.sessions,
        &ctx.issues,
    );
    match worker.drive(name).await? {
        FeatureOutcome::Enqueued => {
            println!("{name}: completed, merge enqueued");
            Ok(())
        }
        FeatureOutcome::Held => Err(ExitError::held(format!("{name} is held"))),
        FeatureOutcome::Blocked { on } => {
            match on {
                Some(on) => println!("{name}: blocked, waiting on {on}"),
                None => println!("{name}: blocked"),
            }
            Ok(())
        }
        FeatureOutcome::Failed => Err(ExitError::failure(format!("{name} failed"))),
        FeatureOutcome::Interrupted => {
            Err(ExitError::failure(format!("{name} interrupted; `v0 resume {name}` to retry")))
        }
        FeatureOutcome::NoOp => Ok(()),
    }
}
