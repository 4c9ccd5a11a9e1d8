// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Desktop notifications: best-effort on macOS, silent elsewhere.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from notify operations
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Adapter for sending notifications
#[async_trait]
pub trait NotifyAdapter: Clone + Send + Sync + 'static {
    /// Send a notification with a title and message body
    async fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError>;
}

/// Desktop notification adapter using notify-rust.
///
/// On macOS, `notify-rust` uses `mac-notification-sys` (Cocoa bindings),
/// whose first notification runs an AppleScript bundle-identifier lookup
/// that blocks forever in daemon processes without Automation
/// permissions. We pre-set the bundle identifier at construction time to
/// bypass the lookup entirely.
///
/// Suppressed entirely when the project sets `DISABLE_NOTIFICATIONS` or
/// the environment sets `V0_TEST_MODE=1`.
#[derive(Clone, Copy, Debug)]
pub struct DesktopNotifyAdapter {
    enabled: bool,
}

impl DesktopNotifyAdapter {
    pub fn new(disable_notifications: bool) -> Self {
        #[cfg(target_os = "macos")]
        {
            let _ = mac_notification_sys::set_application("com.apple.Terminal");
        }
        let test_mode = std::env::var("V0_TEST_MODE").map(|v| v == "1").unwrap_or(false);
        Self { enabled: !disable_notifications && !test_mode }
    }
}

#[async_trait]
impl NotifyAdapter for DesktopNotifyAdapter {
    async fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        if !self.enabled {
            return Ok(());
        }
        if !cfg!(target_os = "macos") {
            // Silent elsewhere; notify-rust's Linux path needs a D-Bus
            // session daemons rarely have
            return Ok(());
        }
        let title = title.to_string();
        let message = message.to_string();
        // Notification::show() is synchronous on macOS. Fire-and-forget
        // on tokio's bounded blocking thread pool so the daemon loop is
        // never held up by Notification Center.
        tokio::task::spawn_blocking(move || {
            match notify_rust::Notification::new().summary(&title).body(&message).show() {
                Ok(_) => {
                    tracing::debug!(%title, "desktop notification sent");
                }
                Err(e) => {
                    tracing::warn!(%title, error = %e, "desktop notification failed");
                }
            }
        });
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{NotifyAdapter, NotifyError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Recorded notification
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct NotifyCall {
        pub title: String,
        pub message: String,
    }

    /// Fake notification adapter for testing
    #[derive(Clone, Default)]
    pub struct FakeNotifyAdapter {
        calls: Arc<Mutex<Vec<NotifyCall>>>,
    }

    impl FakeNotifyAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Get all recorded notifications
        pub fn calls(&self) -> Vec<NotifyCall> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl NotifyAdapter for FakeNotifyAdapter {
        async fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
            self.calls
                .lock()
                .push(NotifyCall { title: title.to_string(), message: message.to_string() });
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeNotifyAdapter, NotifyCall};

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
