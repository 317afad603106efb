use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use repoflow_core::{CloneProgress, JobType, Repository, WorkerProgress};
use repoflow_queue::Job;

use crate::actions::Cloner;
use crate::context::{ProgressReporter, WorkerContext};
use crate::error::WorkerError;
use crate::lifecycle::{JobOutput, WorkerLifecycle};

/// First pipeline stage: clone (or update) a repository from its url.
pub struct CloneWorker {
    cloner: Arc<dyn Cloner>,
}

impl CloneWorker {
    pub fn new(cloner: Arc<dyn Cloner>) -> Self {
        Self { cloner }
    }

    fn repository(job: &Job) -> Result<Repository, WorkerError> {
        let url = job
            .payload
            .url
            .as_deref()
            .ok_or_else(|| WorkerError::Invalid("clone job needs a url".into()))?;
        Ok(Repository::from_url(url)?)
    }
}

#[async_trait]
impl WorkerLifecycle for CloneWorker {
    fn job_type(&self) -> JobType {
        JobType::Clone
    }

    async fn on_enqueued(&self, job: &Job, ctx: &WorkerContext) -> Result<(), WorkerError> {
        let repo = Self::repository(job)?;
        ctx.write_status(JobType::Clone, WorkerProgress::started(repo.uri))
            .await?;
        Ok(())
    }

    async fn execute(
        &self,
        job: &Job,
        reporter: &ProgressReporter,
    ) -> Result<JobOutput, WorkerError> {
        let repo = Self::repository(job)?;
        let result = self
            .cloner
            .clone_repository(&repo, &job.payload.data_path, reporter)
            .await?;

        info!(uri = %result.uri, revision = %result.revision, "Repository cloned");
        let detail = CloneProgress {
            is_cloned: true,
            ..result.detail.unwrap_or_default()
        };
        Ok(JobOutput {
            uri: result.uri,
            revision: Some(result.revision),
            detail: Some(detail),
        })
    }
}
