//! Shared collaborators handed to every worker, and the progress callback
//! injected into job execution.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::warn;

use repoflow_core::{CloneProgress, JobType, RepositoryStatus, WorkerProgress, PROGRESS_DONE};
use repoflow_notify::{NoopNotifier, ProgressEvent, ProgressNotifier};
use repoflow_storage::StatusStore;

use crate::error::WorkerError;

/// Status store plus realtime notifier. Cheap to clone.
#[derive(Clone)]
pub struct WorkerContext {
    pub status: Arc<dyn StatusStore>,
    pub notifier: Arc<dyn ProgressNotifier>,
}

impl WorkerContext {
    /// Context with no realtime channel.
    pub fn new(status: Arc<dyn StatusStore>) -> Self {
        Self {
            status,
            notifier: Arc::new(NoopNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ProgressNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Persist `snapshot`, then push it to observers. Store failures
    /// propagate; notifier failures are only logged.
    pub async fn write_status(
        &self,
        stage: JobType,
        snapshot: WorkerProgress,
    ) -> Result<RepositoryStatus, WorkerError> {
        let entry = self.store(stage, &snapshot).await?;
        self.notify(stage, &snapshot).await;
        Ok(entry)
    }

    async fn store(
        &self,
        stage: JobType,
        snapshot: &WorkerProgress,
    ) -> Result<RepositoryStatus, WorkerError> {
        Ok(self
            .status
            .set_status(&snapshot.uri, stage, snapshot.clone())
            .await?)
    }

    /// Best-effort push of a snapshot to the notifier.
    pub async fn notify(&self, stage: JobType, snapshot: &WorkerProgress) {
        let event = ProgressEvent::from_snapshot(stage, snapshot);
        if let Err(e) = self.notifier.broadcast(&event).await {
            warn!(
                uri = %snapshot.uri,
                stage = %stage,
                channel = self.notifier.channel_name(),
                error = %e,
                "Progress notification dropped"
            );
        }
    }
}

/// Progress callback for one job execution.
///
/// Snapshots written through a reporter never go backwards: `progress` and
/// `timestamp` are clamped to be at least the previous values, and writes are
/// serialized so the store sees them in order.
pub struct ProgressReporter {
    ctx: WorkerContext,
    stage: JobType,
    uri: String,
    last: Mutex<Option<(u8, DateTime<Utc>)>>,
}

impl ProgressReporter {
    pub fn new(ctx: WorkerContext, stage: JobType, uri: impl Into<String>) -> Self {
        Self {
            ctx,
            stage,
            uri: uri.into(),
            last: Mutex::new(None),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn stage(&self) -> JobType {
        self.stage
    }

    pub fn context(&self) -> &WorkerContext {
        &self.ctx
    }

    /// Intermediate tick. A failed write is logged and the job carries on.
    pub async fn report(&self, progress: u8, detail: Option<CloneProgress>) {
        if let Err(e) = self.write(progress, None, detail).await {
            warn!(uri = %self.uri, stage = %self.stage, error = %e, "Progress write failed");
        }
    }

    /// Terminal write at 100%. Failures propagate.
    pub async fn finish(
        &self,
        revision: Option<String>,
        detail: Option<CloneProgress>,
    ) -> Result<WorkerProgress, WorkerError> {
        self.write(PROGRESS_DONE, revision, detail).await
    }

    /// Snapshot at 100% that is announced but not stored.
    pub async fn announce_done(&self) -> WorkerProgress {
        let snapshot = {
            let mut last = self.last.lock().await;
            self.next_snapshot(&mut last, PROGRESS_DONE, None, None)
        };
        self.ctx.notify(self.stage, &snapshot).await;
        snapshot
    }

    async fn write(
        &self,
        progress: u8,
        revision: Option<String>,
        detail: Option<CloneProgress>,
    ) -> Result<WorkerProgress, WorkerError> {
        // Store writes stay ordered under the lock; observers are told after.
        let snapshot = {
            let mut last = self.last.lock().await;
            let snapshot = self.next_snapshot(&mut last, progress, revision, detail);
            self.ctx.store(self.stage, &snapshot).await?;
            snapshot
        };
        self.ctx.notify(self.stage, &snapshot).await;
        Ok(snapshot)
    }

    fn next_snapshot(
        &self,
        last: &mut Option<(u8, DateTime<Utc>)>,
        progress: u8,
        revision: Option<String>,
        detail: Option<CloneProgress>,
    ) -> WorkerProgress {
        let mut progress = progress.min(PROGRESS_DONE);
        let mut timestamp = Utc::now();
        if let Some((prev_progress, prev_ts)) = *last {
            progress = progress.max(prev_progress);
            timestamp = timestamp.max(prev_ts);
        }
        *last = Some((progress, timestamp));
        WorkerProgress {
            uri: self.uri.clone(),
            progress,
            timestamp,
            revision,
            clone_progress: detail,
        }
    }
}
