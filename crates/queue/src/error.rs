//! Queue error types.

use thiserror::Error;

use repoflow_core::CoreError;
use repoflow_storage::StorageError;

use crate::job::{JobId, JobStatus};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("invalid job payload: {0}")]
    InvalidPayload(String),

    #[error("queue unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("journal error: {0}")]
    Storage(#[from] StorageError),
}
