//! Background delivery for slow channels.
//!
//! `QueuedNotifier` accepts events into a bounded buffer and returns at once.
//! A spawned task drains the buffer into the wrapped channel in order. When
//! the buffer is full the event is dropped, so a stalled endpoint never holds
//! up the caller.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::traits::{NotifyError, ProgressEvent, ProgressNotifier};

pub struct QueuedNotifier {
    name: String,
    tx: mpsc::Sender<ProgressEvent>,
    drain: JoinHandle<()>,
}

impl QueuedNotifier {
    /// Wrap `inner` behind a buffer of `capacity` events. Must be called from
    /// within a tokio runtime.
    pub fn spawn(inner: Arc<dyn ProgressNotifier>, capacity: usize) -> Self {
        let name = inner.channel_name().to_string();
        let (tx, mut rx) = mpsc::channel::<ProgressEvent>(capacity.max(1));

        let drain = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = inner.broadcast(&event).await {
                    warn!(
                        uri = %event.uri,
                        channel = inner.channel_name(),
                        error = %e,
                        "Queued progress delivery failed"
                    );
                }
            }
            debug!(channel = inner.channel_name(), "progress delivery task stopped");
        });

        Self { name, tx, drain }
    }
}

impl Drop for QueuedNotifier {
    fn drop(&mut self) {
        self.drain.abort();
    }
}

#[async_trait::async_trait]
impl ProgressNotifier for QueuedNotifier {
    async fn broadcast(&self, event: &ProgressEvent) -> Result<(), NotifyError> {
        match self.tx.try_send(event.clone()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(NotifyError::Dropped(format!(
                "{} delivery buffer full",
                self.name
            ))),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(NotifyError::Dropped(format!(
                "{} delivery task stopped",
                self.name
            ))),
        }
    }

    fn channel_name(&self) -> &str {
        &self.name
    }
}
