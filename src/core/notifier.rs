use anyhow::Context;
use async_trait::async_trait;
use notify_rust::{Notification, Urgency};
use tracing::{debug, warn};

/// Summary line of every failure notification
pub const NOTIFICATION_SUMMARY: &str = "Quake-mode";

/// Surfaces user-visible failures, such as a launch that timed out
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}

/// Desktop notifications over the freedesktop notification service
pub struct DesktopNotifier {
    timeout_ms: i32,
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

impl DesktopNotifier {
    pub fn new(timeout_ms: i32) -> Self {
        Self { timeout_ms }
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, message: &str) {
        debug!("🔔 Notifying: {}", message);

        let mut notification = Notification::new();
        notification
            .summary(NOTIFICATION_SUMMARY)
            .body(message)
            .urgency(Urgency::Normal)
            .timeout(self.timeout_ms);

        let shown = tokio::task::spawn_blocking(move || {
            notification
                .show()
                .map(|_| ())
                .with_context(|| "Failed to send notification")
        })
        .await;

        match shown {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("⚠️  {:#}", e),
            Err(e) => warn!("⚠️  Notification task failed: {}", e),
        }
    }
}

/// Notifier that only logs, for sessions without a notification daemon
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) {
        warn!("🔔 {}: {}", NOTIFICATION_SUMMARY, message);
    }
}
