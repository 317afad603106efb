use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use repoflow_core::JobType;
use repoflow_queue::Job;

use crate::actions::Indexer;
use crate::context::ProgressReporter;
use crate::error::WorkerError;
use crate::inventory::top_extensions;
use crate::lifecycle::{JobOutput, WorkerLifecycle};

/// Last pipeline stage. Reached by chaining after a clone, or by a manual
/// index request.
pub struct IndexWorker {
    indexer: Arc<dyn Indexer>,
}

impl IndexWorker {
    pub fn new(indexer: Arc<dyn Indexer>) -> Self {
        Self { indexer }
    }
}

#[async_trait]
impl WorkerLifecycle for IndexWorker {
    fn job_type(&self) -> JobType {
        JobType::Index
    }

    async fn execute(
        &self,
        job: &Job,
        reporter: &ProgressReporter,
    ) -> Result<JobOutput, WorkerError> {
        let uri = job.payload.subject_uri()?;
        let revision = job.payload.revision.as_deref();
        let result = self
            .indexer
            .index(&uri, revision, &job.payload.data_path, reporter)
            .await?;

        let revision = result.revision.clone().or_else(|| revision.map(str::to_string));
        info!(
            uri = %uri,
            revision = revision.as_deref().unwrap_or("-"),
            files = result.files,
            bytes = result.bytes,
            top_extensions = ?top_extensions(&result, 3),
            "Repository indexed"
        );
        Ok(JobOutput {
            uri,
            revision,
            detail: None,
        })
    }
}
