//! In-process fan-out to live subscribers (websocket sessions).

use tokio::sync::broadcast;

use crate::traits::{NotifyError, ProgressEvent, ProgressNotifier};

const DEFAULT_CAPACITY: usize = 256;

/// Pushes events onto a tokio broadcast channel.
///
/// Subscribers come and go at any time. Sending with nobody listening is not
/// an error, and a subscriber that falls behind skips ahead to the newest
/// events.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ProgressEvent>,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ProgressNotifier for BroadcastNotifier {
    async fn broadcast(&self, event: &ProgressEvent) -> Result<(), NotifyError> {
        // Err only means there are no receivers right now.
        let _ = self.tx.send(event.clone());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "broadcast"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use repoflow_core::JobType;

    fn event(uri: &str, progress: u8) -> ProgressEvent {
        ProgressEvent {
            uri: uri.to_string(),
            stage: JobType::Clone,
            progress,
            timestamp: Utc::now(),
            revision: None,
            clone_progress: None,
        }
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_is_ok() {
        let notifier = BroadcastNotifier::new();
        assert_eq!(notifier.subscriber_count(), 0);
        notifier.broadcast(&event("a/b", 10)).await.unwrap();
    }

    #[tokio::test]
    async fn every_subscriber_sees_events() {
        let notifier = BroadcastNotifier::new();
        let mut rx1 = notifier.subscribe();
        let mut rx2 = notifier.subscribe();

        notifier.broadcast(&event("a/b", 10)).await.unwrap();
        notifier.broadcast(&event("a/b", 20)).await.unwrap();

        assert_eq!(rx1.recv().await.unwrap().progress, 10);
        assert_eq!(rx1.recv().await.unwrap().progress, 20);
        assert_eq!(rx2.recv().await.unwrap().progress, 10);
    }

    #[tokio::test]
    async fn dropped_subscriber_does_not_break_broadcast() {
        let notifier = BroadcastNotifier::new();
        let rx = notifier.subscribe();
        drop(rx);
        notifier.broadcast(&event("a/b", 50)).await.unwrap();
    }
}
