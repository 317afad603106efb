//! The hooks every worker exposes.

use async_trait::async_trait;

use repoflow_core::{CloneProgress, JobType, WorkerProgress};
use repoflow_queue::Job;

use crate::context::{ProgressReporter, WorkerContext};
use crate::error::WorkerError;

/// What a successful execution resolved to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobOutput {
    /// Repository the job acted on.
    pub uri: String,
    pub revision: Option<String>,
    pub detail: Option<CloneProgress>,
}

/// A type-specific executor driven by [`JobDispatcher`](crate::JobDispatcher).
///
/// Only [`execute`](WorkerLifecycle::execute) is required. The default hooks
/// write the initial snapshot at enqueue time and the 100% snapshot on
/// completion, so every worker gets the same status bookkeeping.
#[async_trait]
pub trait WorkerLifecycle: Send + Sync {
    fn job_type(&self) -> JobType;

    /// Runs before the job is handed to the queue. An error aborts the
    /// enqueue and reaches the caller.
    async fn on_enqueued(&self, job: &Job, ctx: &WorkerContext) -> Result<(), WorkerError> {
        let uri = job.payload.subject_uri()?;
        ctx.write_status(self.job_type(), WorkerProgress::started(uri))
            .await?;
        Ok(())
    }

    /// The domain action. Must converge to the same end state when re-run.
    async fn execute(
        &self,
        job: &Job,
        reporter: &ProgressReporter,
    ) -> Result<JobOutput, WorkerError>;

    /// Runs once `execute` succeeded, before any follow-up stage is enqueued.
    async fn on_completed(
        &self,
        job: &Job,
        output: &JobOutput,
        reporter: &ProgressReporter,
    ) -> Result<(), WorkerError> {
        let _ = job;
        reporter
            .finish(output.revision.clone(), output.detail.clone())
            .await?;
        Ok(())
    }
}
