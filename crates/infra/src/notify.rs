//! Notification fan-out
//!
//! [`BroadcastNotifier`] forwards every user notification to any number of
//! UI listeners over a `tokio::sync::broadcast` channel and logs it.

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info};
use versesync_core::{NotificationLevel, Notifier};

/// Default broadcast buffer; slow listeners lag past this many messages
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    /// How long the UI should keep it on screen
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_CAPACITY)
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, level: NotificationLevel, message: &str, duration: Duration) {
        info!(?level, message, duration_ms = duration.as_millis() as u64, "User notification");
        let notification = Notification { level, message: message.to_string(), duration };
        if self.tx.send(notification).is_err() {
            debug!("No notification listeners");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listeners_receive_notifications() {
        let notifier = BroadcastNotifier::default();
        let mut rx = notifier.subscribe();

        let shown_for = Duration::from_secs(4);
        notifier.notify(NotificationLevel::Warning, "check your connection", shown_for);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.level, NotificationLevel::Warning);
        assert_eq!(received.duration, Duration::from_secs(4));
    }

    #[test]
    fn test_notify_without_listeners_is_silent() {
        BroadcastNotifier::new(0).notify(NotificationLevel::Info, "saved", Duration::from_secs(3));
    }
}
