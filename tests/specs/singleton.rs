// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Singleton daemons: one process per {project, kind}; the second start
//! observes the lock and exits 0; shutdown removes the pid file.

use crate::fixture::Project;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use v0_core::OperationKind;
use v0_storage::PidFile;

#[tokio::test]
async fn second_fix_poller_exits_cleanly() {
    let p = Project::new().await;
    let pid_path = p.state.worker_pid(OperationKind::Fix);

    let token = CancellationToken::new();
    let first = {
        let stop = token.clone();
        let state_root = p.state.root().to_path_buf();
        tokio::spawn(async move {
            // Hold the singleton directly; the poller's run() takes the
            // same lock, so this stands in for a running first daemon
            let held = PidFile::acquire(&state_root.join(".worker-fix.pid")).unwrap().unwrap();
            stop.cancelled().await;
            held.release().unwrap();
        })
    };

    // Let the "first daemon" take the lock
    for _ in 0..100 {
        if PidFile::is_held(&pid_path) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(PidFile::is_held(&pid_path));
    assert!(PidFile::read_pid(&pid_path).is_some(), "pid recorded for status tooling");

    // Second instance: observes the lock, returns false (exit 0)
    let started = p.fix_poller().run(CancellationToken::new()).await.unwrap();
    assert!(!started);
    assert!(PidFile::is_held(&pid_path), "first daemon unaffected");

    token.cancel();
    first.await.unwrap();
    assert!(!pid_path.exists(), "orderly shutdown removes the pid file");
}

#[tokio::test]
async fn poller_shutdown_releases_its_pid_file() {
    let p = Project::new().await;
    let pid_path = p.state.worker_pid(OperationKind::Fix);

    let token = CancellationToken::new();
    let stop = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(40)).await;
        stop.cancel();
    });

    let started = p.fix_poller().run(token).await.unwrap();
    assert!(started);
    assert!(!pid_path.exists());
}

#[tokio::test]
async fn merge_daemon_is_a_singleton_too() {
    let p = Project::new().await;
    let _held = PidFile::acquire(&p.state.mergeq_pid()).unwrap().unwrap();

    let started = p.merge_daemon().run(CancellationToken::new()).await.unwrap();
    assert!(!started);
}
