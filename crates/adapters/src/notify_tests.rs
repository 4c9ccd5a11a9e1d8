// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

#[tokio::test]
async fn fake_records_notifications() {
    let notifier = FakeNotifyAdapter::new();
    notifier.notify("merge conflict", "operation auth hit a conflict").await.unwrap();

    let calls = notifier.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].title, "merge conflict");
    assert_eq!(calls[0].message, "operation auth hit a conflict");
}

#[tokio::test]
#[serial]
async fn disabled_adapter_is_silent_and_ok() {
    let adapter = DesktopNotifyAdapter::new(true);
    adapter.notify("t", "m").await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_mode_env_suppresses_notifications() {
    std::env::set_var("V0_TEST_MODE", "1");
    let adapter = DesktopNotifyAdapter::new(false);
    adapter.notify("t", "m").await.unwrap();
    std::env::remove_var("V0_TEST_MODE");
}
