use crate::traits::{NotifyError, ProgressEvent, ProgressNotifier};

/// Notifier used when no realtime channel is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait::async_trait]
impl ProgressNotifier for NoopNotifier {
    async fn broadcast(&self, _event: &ProgressEvent) -> Result<(), NotifyError> {
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "noop"
    }
}
