use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use repoflow_core::JobType;
use repoflow_queue::Job;

use crate::actions::Remover;
use crate::context::ProgressReporter;
use crate::error::WorkerError;
use crate::lifecycle::{JobOutput, WorkerLifecycle};

/// Removes a repository's checkout and, once done, its status entry.
pub struct DeleteWorker {
    remover: Arc<dyn Remover>,
}

impl DeleteWorker {
    pub fn new(remover: Arc<dyn Remover>) -> Self {
        Self { remover }
    }
}

#[async_trait]
impl WorkerLifecycle for DeleteWorker {
    fn job_type(&self) -> JobType {
        JobType::Delete
    }

    async fn execute(
        &self,
        job: &Job,
        _reporter: &ProgressReporter,
    ) -> Result<JobOutput, WorkerError> {
        let uri = job.payload.subject_uri()?;
        self.remover.remove(&uri, &job.payload.data_path).await?;
        Ok(JobOutput {
            uri,
            ..Default::default()
        })
    }

    async fn on_completed(
        &self,
        _job: &Job,
        output: &JobOutput,
        reporter: &ProgressReporter,
    ) -> Result<(), WorkerError> {
        reporter.announce_done().await;
        let removed = reporter.context().status.delete_status(&output.uri).await?;
        info!(uri = %output.uri, status_removed = removed, "Repository deleted");
        Ok(())
    }
}
