use thiserror::Error;

use repoflow_core::{CoreError, JobType};
use repoflow_queue::QueueError;
use repoflow_storage::StorageError;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("invalid job: {0}")]
    Invalid(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("status store error: {0}")]
    Status(#[from] StorageError),

    #[error("{action} failed: {message}")]
    Action { action: &'static str, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no worker registered for {0} jobs")]
    NoWorker(JobType),
}

impl WorkerError {
    pub fn action(action: &'static str, message: impl Into<String>) -> Self {
        Self::Action {
            action,
            message: message.into(),
        }
    }

    /// Errors caused by the request itself rather than by the system.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WorkerError::Invalid(_)
                | WorkerError::Core(_)
                | WorkerError::Queue(QueueError::Core(_))
                | WorkerError::Queue(QueueError::InvalidPayload(_))
        )
    }
}
