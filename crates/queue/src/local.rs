//! In-process job queue with an optional JSON journal.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use repoflow_core::JobType;
use repoflow_storage::JsonFile;

use crate::error::QueueError;
use crate::job::{Job, JobId, JobStatus};
use crate::queue::{JobQueue, QueueHealth};

pub const DEFAULT_ARCHIVE_LIMIT: usize = 500;

/// On-disk form: running jobs first, then waiting jobs in delivery order,
/// then archived jobs oldest first.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Journal {
    jobs: Vec<Job>,
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<JobId, Job>,
    pending: HashMap<JobType, VecDeque<JobId>>,
    running: Vec<JobId>,
    archived: VecDeque<JobId>,
}

impl QueueState {
    fn journal(&self) -> Journal {
        let ids = self
            .running
            .iter()
            .chain(
                JobType::ALL
                    .into_iter()
                    .flat_map(|t| self.pending.get(&t).into_iter().flatten()),
            )
            .chain(self.archived.iter());
        Journal {
            jobs: ids.filter_map(|id| self.jobs.get(id).cloned()).collect(),
        }
    }

    fn push_pending(&mut self, job: Job) {
        self.pending.entry(job.job_type).or_default().push_back(job.id);
        self.jobs.insert(job.id, job);
    }

    fn job_mut(&mut self, id: JobId) -> Result<&mut Job, QueueError> {
        self.jobs.get_mut(&id).ok_or(QueueError::NotFound(id))
    }

    fn archive(&mut self, id: JobId, limit: usize) {
        self.running.retain(|r| *r != id);
        self.archived.push_back(id);
        while self.archived.len() > limit {
            if let Some(old) = self.archived.pop_front() {
                self.jobs.remove(&old);
            }
        }
    }
}

/// FIFO queue per job type held in memory. When opened on a path, every
/// state transition is journaled before the call returns.
pub struct LocalJobQueue {
    state: Mutex<QueueState>,
    journal: Option<JsonFile>,
    wakers: HashMap<JobType, Arc<Notify>>,
    archive_limit: usize,
}

impl LocalJobQueue {
    pub fn in_memory() -> Self {
        Self::with_state(QueueState::default(), None, DEFAULT_ARCHIVE_LIMIT)
    }

    /// Open a journaled queue. Jobs that were `Running` when the journal was
    /// last written are put back in line ahead of waiting jobs.
    pub async fn open(path: impl Into<PathBuf>, archive_limit: usize) -> Result<Self, QueueError> {
        let file = JsonFile::new(path);
        let journal: Journal = file.load().await?;

        let mut state = QueueState::default();
        let mut recovered = 0usize;
        for mut job in journal.jobs {
            match job.status {
                JobStatus::Running => {
                    warn!(
                        job_id = %job.id,
                        job_type = %job.job_type,
                        attempts = job.attempts,
                        "Redelivering job abandoned while running"
                    );
                    job.requeue_abandoned();
                    recovered += 1;
                    state.push_pending(job);
                }
                JobStatus::Enqueued => state.push_pending(job),
                JobStatus::Completed | JobStatus::Failed => {
                    state.archived.push_back(job.id);
                    state.jobs.insert(job.id, job);
                }
            }
        }

        info!(
            path = %file.path().display(),
            jobs = state.jobs.len(),
            recovered,
            "Job queue opened"
        );

        let queue = Self::with_state(state, Some(file), archive_limit);
        if recovered > 0 {
            let state = queue.state.lock().await;
            queue.persist(&state).await?;
            drop(state);
        }
        Ok(queue)
    }

    fn with_state(state: QueueState, journal: Option<JsonFile>, archive_limit: usize) -> Self {
        let wakers = JobType::ALL
            .iter()
            .map(|t| (*t, Arc::new(Notify::new())))
            .collect();
        Self {
            state: Mutex::new(state),
            journal,
            wakers,
            archive_limit,
        }
    }

    async fn persist(&self, state: &QueueState) -> Result<(), QueueError> {
        if let Some(file) = &self.journal {
            file.save(&state.journal()).await?;
        }
        Ok(())
    }

    async fn finish<F>(&self, id: JobId, apply: F) -> Result<(), QueueError>
    where
        F: FnOnce(&mut Job) -> Result<(), QueueError>,
    {
        let mut state = self.state.lock().await;
        apply(state.job_mut(id)?)?;
        state.archive(id, self.archive_limit);
        self.persist(&state).await
    }
}

#[async_trait]
impl JobQueue for LocalJobQueue {
    async fn enqueue(&self, job: Job) -> Result<JobId, QueueError> {
        if job.status != JobStatus::Enqueued {
            return Err(QueueError::InvalidTransition {
                id: job.id,
                from: job.status,
                to: JobStatus::Enqueued,
            });
        }
        let id = job.id;
        let job_type = job.job_type;
        {
            let mut state = self.state.lock().await;
            state.push_pending(job);
            if let Err(e) = self.persist(&state).await {
                state.jobs.remove(&id);
                if let Some(lane) = state.pending.get_mut(&job_type) {
                    lane.retain(|p| *p != id);
                }
                return Err(e);
            }
        }
        debug!(job_id = %id, job_type = %job_type, "Job enqueued");
        if let Some(waker) = self.wakers.get(&job_type) {
            waker.notify_one();
        }
        Ok(id)
    }

    async fn dequeue(&self, job_type: JobType) -> Result<Option<Job>, QueueError> {
        let mut state = self.state.lock().await;
        let Some(id) = state.pending.get_mut(&job_type).and_then(|lane| lane.pop_front()) else {
            return Ok(None);
        };
        let before = state.job_mut(id)?.clone();
        let mut job = before.clone();
        if let Err(e) = job.start() {
            state.pending.entry(job_type).or_default().push_front(id);
            return Err(e);
        }
        state.jobs.insert(id, job.clone());
        state.running.push(id);

        // An unjournaled delivery must not strand the job as Running.
        if let Err(e) = self.persist(&state).await {
            warn!(
                job_id = %id,
                job_type = %job_type,
                error = %e,
                "Journal write failed, job put back in line"
            );
            state.running.retain(|r| *r != id);
            state.jobs.insert(id, before);
            state.pending.entry(job_type).or_default().push_front(id);
            return Err(e);
        }
        Ok(Some(job))
    }

    async fn complete(&self, id: JobId) -> Result<(), QueueError> {
        self.finish(id, |job| job.complete()).await
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<(), QueueError> {
        self.finish(id, |job| job.fail(error)).await
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, QueueError> {
        Ok(self.state.lock().await.jobs.get(&id).cloned())
    }

    async fn list(&self, job_type: JobType) -> Result<Vec<Job>, QueueError> {
        let state = self.state.lock().await;
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|j| j.job_type == job_type)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    async fn depth(&self, job_type: JobType) -> Result<usize, QueueError> {
        let state = self.state.lock().await;
        Ok(state.pending.get(&job_type).map_or(0, VecDeque::len))
    }

    async fn health(&self) -> Result<QueueHealth, QueueError> {
        let state = self.state.lock().await;
        Ok(QueueHealth {
            provider: "local".to_string(),
            durable: self.journal.is_some(),
            pending: state.pending.values().map(VecDeque::len).sum(),
            running: state.running.len(),
            archived: state.archived.len(),
        })
    }

    async fn wait_for_job(&self, job_type: JobType) {
        match self.wakers.get(&job_type) {
            Some(waker) => waker.notified().await,
            None => std::future::pending::<()>().await,
        }
    }
}
