//! Routes progress events to every configured channel.
//!
//! Individual channel failures don't block other channels.

use std::sync::Arc;

use crate::traits::{DispatchResult, NotifyError, ProgressEvent, ProgressNotifier};

/// Fans one event out to several notifiers.
#[derive(Default)]
pub struct FanoutNotifier {
    channels: Vec<Arc<dyn ProgressNotifier>>,
}

impl FanoutNotifier {
    pub fn new(channels: Vec<Arc<dyn ProgressNotifier>>) -> Self {
        Self { channels }
    }

    pub fn push(&mut self, channel: Arc<dyn ProgressNotifier>) {
        self.channels.push(channel);
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Deliver `event` to all channels, returning one result per channel.
    pub async fn dispatch(&self, event: &ProgressEvent) -> Vec<DispatchResult> {
        let mut results = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let start = std::time::Instant::now();
            let result = channel.broadcast(event).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (success, error) = match result {
                Ok(()) => (true, None),
                Err(e) => {
                    tracing::warn!(
                        uri = %event.uri,
                        channel = channel.channel_name(),
                        error = %e,
                        duration_ms,
                        "Progress delivery failed"
                    );
                    (false, Some(e.to_string()))
                }
            };

            results.push(DispatchResult {
                channel: channel.channel_name().to_string(),
                success,
                error,
                duration_ms,
            });
        }

        results
    }
}

#[async_trait::async_trait]
impl ProgressNotifier for FanoutNotifier {
    async fn broadcast(&self, event: &ProgressEvent) -> Result<(), NotifyError> {
        self.dispatch(event).await;
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "fanout"
    }
}
