//! Job queue trait and types.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use repoflow_core::JobType;

use crate::error::QueueError;
use crate::job::{Job, JobId};

/// Point-in-time view of a queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueHealth {
    /// Queue provider name (e.g. "local").
    pub provider: String,
    /// Whether job state survives a restart.
    pub durable: bool,
    pub pending: usize,
    pub running: usize,
    /// Terminal jobs still retained.
    pub archived: usize,
}

impl fmt::Display for QueueHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QueueHealth {{ provider: {}, durable: {}, pending: {}, running: {}, archived: {} }}",
            self.provider, self.durable, self.pending, self.running, self.archived
        )
    }
}

/// Durable work distribution for jobs.
///
/// Each job is handed out by [`dequeue`](JobQueue::dequeue) to exactly one
/// caller. Jobs that were running when the process stopped are handed out
/// again after a restart, so delivery is at-least-once.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Accept a freshly created job. The job must be `Enqueued`.
    async fn enqueue(&self, job: Job) -> Result<JobId, QueueError>;

    /// Take the oldest waiting job of `job_type` and mark it `Running`.
    async fn dequeue(&self, job_type: JobType) -> Result<Option<Job>, QueueError>;

    async fn complete(&self, id: JobId) -> Result<(), QueueError>;

    async fn fail(&self, id: JobId, error: &str) -> Result<(), QueueError>;

    async fn get(&self, id: JobId) -> Result<Option<Job>, QueueError>;

    /// Every retained job of `job_type`, oldest first.
    async fn list(&self, job_type: JobType) -> Result<Vec<Job>, QueueError>;

    /// Number of jobs of `job_type` waiting to be picked up.
    async fn depth(&self, job_type: JobType) -> Result<usize, QueueError>;

    async fn health(&self) -> Result<QueueHealth, QueueError>;

    /// Resolve once a job of `job_type` may be available. Callers still
    /// bound this with their own poll interval.
    async fn wait_for_job(&self, job_type: JobType) {
        let _ = job_type;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_health_display() {
        let health = QueueHealth {
            provider: "local".to_string(),
            durable: true,
            pending: 3,
            running: 1,
            archived: 42,
        };
        let display = format!("{}", health);
        assert!(display.contains("durable: true"));
        assert!(display.contains("42"));
    }
}
