//! Notifier trait definition and shared types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use repoflow_core::{CloneProgress, JobType, WorkerProgress};

/// Errors that can occur during progress delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Delivery rejected: {0}")]
    Rejected(String),

    #[error("Event dropped: {0}")]
    Dropped(String),
}

/// One progress tick for one repository stage, as pushed to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub uri: String,
    pub stage: JobType,
    pub progress: u8,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_progress: Option<CloneProgress>,
}

impl ProgressEvent {
    pub fn from_snapshot(stage: JobType, snapshot: &WorkerProgress) -> Self {
        Self {
            uri: snapshot.uri.clone(),
            stage,
            progress: snapshot.progress,
            timestamp: snapshot.timestamp,
            revision: snapshot.revision.clone(),
            clone_progress: snapshot.clone_progress.clone(),
        }
    }
}

/// A realtime push channel for progress events.
///
/// Delivery is best-effort: callers log failures and move on. `broadcast` is
/// awaited on the job's path, so channels that can stall belong behind a
/// [`QueuedNotifier`](crate::QueuedNotifier).
#[async_trait::async_trait]
pub trait ProgressNotifier: Send + Sync {
    async fn broadcast(&self, event: &ProgressEvent) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g., "webhook", "broadcast").
    fn channel_name(&self) -> &str;
}

/// Result of pushing an event to a single channel.
#[derive(Debug)]
pub struct DispatchResult {
    pub channel: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}
