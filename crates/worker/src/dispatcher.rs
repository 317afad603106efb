//! Enqueue entry point, status reads and the generic job driver.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info};

use repoflow_core::{JobType, RepositoryStatus, WorkerProgress};
use repoflow_notify::ProgressNotifier;
use repoflow_queue::{Job, JobId, JobOptions, JobPayload, JobQueue};
use repoflow_storage::StatusStore;

use crate::context::{ProgressReporter, WorkerContext};
use crate::error::WorkerError;
use crate::lifecycle::{JobOutput, WorkerLifecycle};
use crate::metrics::WorkerMetrics;
use crate::stages::StageTable;

/// How one delivered job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Execution and completion hook succeeded; `next` is the chained job.
    Completed { job_id: JobId, next: Option<JobId> },
    /// The job completed but its follow-up stage could not be enqueued, so
    /// the pipeline stops here.
    ChainBroken {
        job_id: JobId,
        next_stage: JobType,
        error: String,
    },
    Failed { job_id: JobId, error: String },
}

impl JobOutcome {
    pub fn job_id(&self) -> JobId {
        match self {
            JobOutcome::Completed { job_id, .. }
            | JobOutcome::ChainBroken { job_id, .. }
            | JobOutcome::Failed { job_id, .. } => *job_id,
        }
    }

    pub fn is_completed(&self) -> bool {
        !matches!(self, JobOutcome::Failed { .. })
    }
}

/// Fluent builder for a [`JobDispatcher`].
pub struct JobDispatcherBuilder {
    queue: Arc<dyn JobQueue>,
    ctx: WorkerContext,
    workers: HashMap<JobType, Arc<dyn WorkerLifecycle>>,
    stages: StageTable,
    metrics: Option<Arc<WorkerMetrics>>,
}

impl JobDispatcherBuilder {
    /// Realtime channel for progress (default: none).
    pub fn notifier(mut self, notifier: Arc<dyn ProgressNotifier>) -> Self {
        self.ctx = self.ctx.with_notifier(notifier);
        self
    }

    /// Register the worker for its job type, replacing any earlier one.
    pub fn worker(mut self, worker: Arc<dyn WorkerLifecycle>) -> Self {
        self.workers.insert(worker.job_type(), worker);
        self
    }

    /// Chaining rules (default: `Clone → Index`).
    pub fn stages(mut self, stages: StageTable) -> Self {
        self.stages = stages;
        self
    }

    pub fn metrics(mut self, metrics: Arc<WorkerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> JobDispatcher {
        JobDispatcher {
            queue: self.queue,
            ctx: self.ctx,
            workers: self.workers,
            stages: self.stages,
            metrics: self.metrics.unwrap_or_default(),
        }
    }
}

/// Owns the registered workers and drives jobs through their hooks.
pub struct JobDispatcher {
    queue: Arc<dyn JobQueue>,
    ctx: WorkerContext,
    workers: HashMap<JobType, Arc<dyn WorkerLifecycle>>,
    stages: StageTable,
    metrics: Arc<WorkerMetrics>,
}

impl JobDispatcher {
    pub fn builder(queue: Arc<dyn JobQueue>, status: Arc<dyn StatusStore>) -> JobDispatcherBuilder {
        JobDispatcherBuilder {
            queue,
            ctx: WorkerContext::new(status),
            workers: HashMap::new(),
            stages: StageTable::default(),
            metrics: None,
        }
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    pub fn context(&self) -> &WorkerContext {
        &self.ctx
    }

    pub fn metrics(&self) -> &Arc<WorkerMetrics> {
        &self.metrics
    }

    /// Job types with a registered worker.
    pub fn job_types(&self) -> Vec<JobType> {
        JobType::ALL
            .into_iter()
            .filter(|t| self.workers.contains_key(t))
            .collect()
    }

    fn worker(&self, job_type: JobType) -> Result<&Arc<dyn WorkerLifecycle>, WorkerError> {
        self.workers
            .get(&job_type)
            .ok_or(WorkerError::NoWorker(job_type))
    }

    /// Create a job and hand it to the queue.
    ///
    /// The worker's enqueue hook runs first, so the status entry for the job's
    /// repository exists before this returns. If the hook fails nothing is
    /// enqueued.
    pub async fn enqueue_job(
        &self,
        job_type: JobType,
        payload: JobPayload,
        options: JobOptions,
    ) -> Result<Job, WorkerError> {
        let worker = self.worker(job_type)?;
        let job = Job::new(job_type, payload, options);

        worker.on_enqueued(&job, &self.ctx).await?;
        self.queue.enqueue(job.clone()).await?;
        self.metrics.record_enqueued(job_type);

        info!(
            job_id = %job.id,
            job_type = %job_type,
            uri = job.payload.uri.as_deref().or(job.payload.url.as_deref()).unwrap_or("-"),
            "Job enqueued"
        );
        Ok(job)
    }

    /// Latest snapshot of one stage for `uri`.
    pub async fn get_status(
        &self,
        uri: &str,
        stage: JobType,
    ) -> Result<Option<WorkerProgress>, WorkerError> {
        let entry = self.ctx.status.get_status(uri).await?;
        Ok(entry.and_then(|e| e.stage(stage).cloned()))
    }

    /// Everything known about `uri`.
    pub async fn get_repository_status(
        &self,
        uri: &str,
    ) -> Result<Option<RepositoryStatus>, WorkerError> {
        Ok(self.ctx.status.get_status(uri).await?)
    }

    /// Pull the next job of `job_type` and run it.
    pub async fn run_next(&self, job_type: JobType) -> Result<Option<JobOutcome>, WorkerError> {
        match self.queue.dequeue(job_type).await? {
            Some(job) => Ok(Some(self.run_job(job).await)),
            None => Ok(None),
        }
    }

    /// Drive a delivered (`Running`) job: execute, completion hook, chaining,
    /// then mark it done in the queue.
    ///
    /// A failure leaves the status entry at whatever was last reported.
    pub async fn run_job(&self, job: Job) -> JobOutcome {
        self.metrics.record_started(job.job_type);
        info!(job_id = %job.id, job_type = %job.job_type, attempt = job.attempts, "Job started");

        let output = match self.execute(&job).await {
            Ok(output) => output,
            Err(e) => return self.fail(&job, e).await,
        };

        let chained = self.chain(&job, &output).await;

        if let Err(e) = self.queue.complete(job.id).await {
            error!(job_id = %job.id, error = %e, "Failed to mark job completed");
        }
        self.metrics.record_completed(job.job_type);
        info!(job_id = %job.id, job_type = %job.job_type, uri = %output.uri, "Job completed");

        match chained {
            Ok(next) => JobOutcome::Completed {
                job_id: job.id,
                next,
            },
            Err((next_stage, error)) => JobOutcome::ChainBroken {
                job_id: job.id,
                next_stage,
                error,
            },
        }
    }

    async fn execute(&self, job: &Job) -> Result<JobOutput, WorkerError> {
        let worker = self.worker(job.job_type)?;
        let uri = job.payload.subject_uri()?;
        let reporter = ProgressReporter::new(self.ctx.clone(), job.job_type, uri);

        let output = worker.execute(job, &reporter).await?;
        worker.on_completed(job, &output, &reporter).await?;
        Ok(output)
    }

    async fn fail(&self, job: &Job, e: WorkerError) -> JobOutcome {
        let error = e.to_string();
        error!(
            job_id = %job.id,
            job_type = %job.job_type,
            failure = "execution",
            error = %error,
            "Job failed"
        );
        self.metrics.record_failed(job.job_type);
        if let Err(qe) = self.queue.fail(job.id, &error).await {
            error!(job_id = %job.id, error = %qe, "Failed to mark job failed");
        }
        JobOutcome::Failed {
            job_id: job.id,
            error,
        }
    }

    async fn chain(
        &self,
        job: &Job,
        output: &JobOutput,
    ) -> Result<Option<JobId>, (JobType, String)> {
        let Some((next_type, payload)) = self.stages.next(job, output) else {
            return Ok(None);
        };

        match self.enqueue_job(next_type, payload, job.options.clone()).await {
            Ok(next) => Ok(Some(next.id)),
            Err(e) => {
                error!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    next_stage = %next_type,
                    uri = %output.uri,
                    failure = "chain",
                    error = %e,
                    "Follow-up stage could not be enqueued"
                );
                self.metrics.record_chain_failure(job.job_type);
                Err((next_type, e.to_string()))
            }
        }
    }
}
