// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wait`: block until an operation settles.
//!
//! Exit codes: 0 merged, 1 failed/cancelled/conflict, 2 timeout, 3 not
//! found, 4 held-forever.

use std::time::Duration;

use crate::context::Ctx;
use crate::exit_error::ExitError;
use v0_core::Phase;

const WAIT_POLL: Duration = Duration::from_secs(2);

pub async fn wait(ctx: &Ctx, target: &str, timeout_secs: Option<u64>) -> Result<(), ExitError> {
    if !ctx.store.exists(target) {
        return Err(ExitError::not_found(format!("operation not found: {target}")));
    }
    let deadline = timeout_secs.map(|s| std::time::Instant::now() + Duration::from_secs(s));

    loop {
        let op = ctx.store.read_all(target)?;
        match op.phase {
            Phase::Merged => {
                println!("{target} merged");
                return Ok(());
            }
            Phase::Cancelled => {
                return Err(ExitError::failure(format!("{target} was cancelled")));
            }
            Phase::Failed => {
                return Err(ExitError::failure(format!("{target} failed")));
            }
            Phase::Conflict => {
                return Err(ExitError::failure(format!(
                    "{target} hit a merge conflict; `v0 merge --resolve {target}`"
                )));
            }
            // A held operation will never settle on its own
            _ if op.held => {
                return Err(ExitError::held(format!("{target} is held")));
            }
            _ => {}
        }

        if let Some(deadline) = deadline {
            if std::time::Instant::now() >= deadline {
                return Err(ExitError::timeout(format!(
                    "{target} still {} after timeout",
                    op.phase
                )));
            }
        }
        tokio::time::sleep(WAIT_POLL).await;
    }
}
