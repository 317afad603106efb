//! End-to-end behaviour of the clone → index pipeline and standalone deletes,
//! driven with in-memory stores and scripted domain actions.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use repoflow_core::{CloneProgress, JobType, Repository, RepositoryStatus, WorkerProgress};
use repoflow_notify::{NotifyError, ProgressEvent, ProgressNotifier};
use repoflow_queue::{
    Job, JobId, JobOptions, JobPayload, JobQueue, JobStatus, LocalJobQueue, QueueError, QueueHealth,
};
use repoflow_storage::{LocalStatusStore, StatusStore, StorageError};
use repoflow_worker::{
    CloneResult, CloneWorker, Cloner, DeleteWorker, IndexResult, IndexWorker, Indexer,
    JobDispatcher, JobOutcome, ProgressReporter, Remover, WorkerError, WorkerRunner,
    WorkerRunnerBuilder,
};

// ── Fakes ────────────────────────────────────────────────────────────

/// Reports each step in turn, failing once `fail_at` is reached.
struct ScriptedCloner {
    revision: String,
    steps: Vec<u8>,
    fail_at: Option<u8>,
    step_delay: Duration,
}

impl ScriptedCloner {
    fn succeeding(revision: &str) -> Self {
        Self {
            revision: revision.to_string(),
            steps: vec![10, 25, 40, 70, 90],
            fail_at: None,
            step_delay: Duration::ZERO,
        }
    }

    fn failing_at(progress: u8) -> Self {
        Self {
            fail_at: Some(progress),
            ..Self::succeeding("unused")
        }
    }

    fn slow(mut self) -> Self {
        self.step_delay = Duration::from_millis(5);
        self
    }
}

#[async_trait]
impl Cloner for ScriptedCloner {
    async fn clone_repository(
        &self,
        repo: &Repository,
        _data_path: &Path,
        reporter: &ProgressReporter,
    ) -> Result<CloneResult, WorkerError> {
        for step in &self.steps {
            if self.fail_at.is_some_and(|f| *step > f) {
                return Err(WorkerError::action("clone", "network unreachable"));
            }
            let detail = CloneProgress {
                received_objects: *step as u64,
                total_objects: 100,
                ..Default::default()
            };
            reporter.report(*step, Some(detail)).await;
            if !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }
        }
        Ok(CloneResult {
            uri: repo.uri.clone(),
            revision: self.revision.clone(),
            detail: None,
        })
    }
}

struct NullIndexer;

#[async_trait]
impl Indexer for NullIndexer {
    async fn index(
        &self,
        _uri: &str,
        _revision: Option<&str>,
        _data_path: &Path,
        reporter: &ProgressReporter,
    ) -> Result<IndexResult, WorkerError> {
        reporter.report(50, None).await;
        Ok(IndexResult::default())
    }
}

#[derive(Default)]
struct RecordingRemover {
    removed: Mutex<Vec<String>>,
}

#[async_trait]
impl Remover for RecordingRemover {
    async fn remove(&self, uri: &str, _data_path: &Path) -> Result<(), WorkerError> {
        self.removed.lock().unwrap().push(uri.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingNotifier {
    fn events_for(&self, uri: &str, stage: JobType) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.uri == uri && e.stage == stage)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ProgressNotifier for RecordingNotifier {
    async fn broadcast(&self, event: &ProgressEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

/// Local queue that refuses jobs of one type and, on every accepted enqueue,
/// records whether the job's status entry already existed.
struct ProbeQueue {
    inner: LocalJobQueue,
    status: Arc<LocalStatusStore>,
    refuse: Option<JobType>,
    saw_status_first: Mutex<Vec<bool>>,
}

impl ProbeQueue {
    fn new(status: Arc<LocalStatusStore>, refuse: Option<JobType>) -> Self {
        Self {
            inner: LocalJobQueue::in_memory(),
            status,
            refuse,
            saw_status_first: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl JobQueue for ProbeQueue {
    async fn enqueue(&self, job: Job) -> Result<JobId, QueueError> {
        if self.refuse == Some(job.job_type) {
            return Err(QueueError::Unavailable("queue is down".into()));
        }
        let uri = job.payload.subject_uri()?;
        let exists = self.status.get_status(&uri).await?.is_some();
        self.saw_status_first.lock().unwrap().push(exists);
        self.inner.enqueue(job).await
    }

    async fn dequeue(&self, job_type: JobType) -> Result<Option<Job>, QueueError> {
        self.inner.dequeue(job_type).await
    }

    async fn complete(&self, id: JobId) -> Result<(), QueueError> {
        self.inner.complete(id).await
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<(), QueueError> {
        self.inner.fail(id, error).await
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, QueueError> {
        self.inner.get(id).await
    }

    async fn list(&self, job_type: JobType) -> Result<Vec<Job>, QueueError> {
        self.inner.list(job_type).await
    }

    async fn depth(&self, job_type: JobType) -> Result<usize, QueueError> {
        self.inner.depth(job_type).await
    }

    async fn health(&self) -> Result<QueueHealth, QueueError> {
        self.inner.health().await
    }
}

struct BrokenStatusStore;

#[async_trait]
impl StatusStore for BrokenStatusStore {
    async fn set_status(
        &self,
        _uri: &str,
        _stage: JobType,
        _snapshot: WorkerProgress,
    ) -> Result<RepositoryStatus, StorageError> {
        Err(StorageError::Other("disk full".into()))
    }

    async fn get_status(&self, _uri: &str) -> Result<Option<RepositoryStatus>, StorageError> {
        Ok(None)
    }

    async fn delete_status(&self, _uri: &str) -> Result<bool, StorageError> {
        Ok(false)
    }

    async fn list_status(&self) -> Result<Vec<RepositoryStatus>, StorageError> {
        Ok(Vec::new())
    }
}

// ── Harness ──────────────────────────────────────────────────────────

struct Harness {
    dispatcher: Arc<JobDispatcher>,
    queue: Arc<ProbeQueue>,
    status: Arc<LocalStatusStore>,
    notifier: Arc<RecordingNotifier>,
    remover: Arc<RecordingRemover>,
}

fn harness(cloner: ScriptedCloner, refuse: Option<JobType>) -> Harness {
    let status = Arc::new(LocalStatusStore::in_memory());
    let queue = Arc::new(ProbeQueue::new(status.clone(), refuse));
    let notifier = Arc::new(RecordingNotifier::default());
    let remover = Arc::new(RecordingRemover::default());

    let dispatcher = JobDispatcher::builder(queue.clone(), status.clone())
        .notifier(notifier.clone())
        .worker(Arc::new(CloneWorker::new(Arc::new(cloner))))
        .worker(Arc::new(IndexWorker::new(Arc::new(NullIndexer))))
        .worker(Arc::new(DeleteWorker::new(remover.clone())))
        .build();

    Harness {
        dispatcher: Arc::new(dispatcher),
        queue,
        status,
        notifier,
        remover,
    }
}

const URL: &str = "https://example.com/r.git";
const URI: &str = "example.com/r";
const REVISION: &str = "3f786850e387550fdab836ed7e6dc881de23001b";

async fn enqueue_clone(h: &Harness, url: &str) -> Job {
    h.dispatcher
        .enqueue_job(JobType::Clone, JobPayload::clone_url(url, "/data"), JobOptions::new())
        .await
        .unwrap()
}

fn assert_monotonic(events: &[ProgressEvent]) {
    for pair in events.windows(2) {
        assert!(pair[0].progress <= pair[1].progress, "progress went backwards: {pair:?}");
        assert!(pair[0].timestamp <= pair[1].timestamp, "timestamp went backwards: {pair:?}");
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn clone_scenario_initial_status_then_done_then_index() {
    let h = harness(ScriptedCloner::succeeding(REVISION), None);

    let job = enqueue_clone(&h, URL).await;
    assert_eq!(job.status, JobStatus::Enqueued);

    let initial = h.dispatcher.get_status(URI, JobType::Clone).await.unwrap().unwrap();
    assert_eq!(initial.uri, URI);
    assert_eq!(initial.progress, 0);

    let outcome = h.dispatcher.run_next(JobType::Clone).await.unwrap().unwrap();
    let JobOutcome::Completed { job_id, next: Some(index_id) } = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(job_id, job.id);

    let done = h.dispatcher.get_status(URI, JobType::Clone).await.unwrap().unwrap();
    assert_eq!(done.progress, 100);
    assert_eq!(done.revision.as_deref(), Some(REVISION));
    assert!(done.clone_progress.unwrap().is_cloned);

    let index_job = h.queue.get(index_id).await.unwrap().unwrap();
    assert_eq!(index_job.job_type, JobType::Index);
    assert_eq!(index_job.payload.uri.as_deref(), Some(URI));
    assert_eq!(index_job.payload.revision.as_deref(), Some(REVISION));
    assert_eq!(index_job.payload.data_path, Path::new("/data"));

    let clone_job = h.queue.get(job.id).await.unwrap().unwrap();
    assert_eq!(clone_job.status, JobStatus::Completed);
}

#[tokio::test]
async fn status_entry_exists_before_every_enqueue() {
    let h = harness(ScriptedCloner::succeeding(REVISION), None);
    enqueue_clone(&h, URL).await;
    h.dispatcher.run_next(JobType::Clone).await.unwrap();
    h.dispatcher
        .enqueue_job(JobType::Delete, JobPayload::delete("example.com/other", "/data"), JobOptions::new())
        .await
        .unwrap();

    let seen = h.queue.saw_status_first.lock().unwrap().clone();
    assert_eq!(seen, vec![true, true, true]);
}

#[tokio::test]
async fn exactly_one_index_job_per_successful_clone() {
    let h = harness(ScriptedCloner::succeeding(REVISION), None);
    enqueue_clone(&h, URL).await;
    h.dispatcher.run_next(JobType::Clone).await.unwrap();

    let index_jobs = h.queue.list(JobType::Index).await.unwrap();
    assert_eq!(index_jobs.len(), 1);
    assert_eq!(index_jobs[0].payload.revision.as_deref(), Some(REVISION));

    let outcome = h.dispatcher.run_next(JobType::Index).await.unwrap().unwrap();
    assert_eq!(outcome, JobOutcome::Completed { job_id: index_jobs[0].id, next: None });

    let status = h.dispatcher.get_repository_status(URI).await.unwrap().unwrap();
    assert!(status.index.unwrap().is_done());
    assert_eq!(h.queue.list(JobType::Index).await.unwrap().len(), 1);
}

#[tokio::test]
async fn progress_is_monotonic_within_a_job() {
    let h = harness(ScriptedCloner::succeeding(REVISION), None);
    enqueue_clone(&h, URL).await;
    h.dispatcher.run_next(JobType::Clone).await.unwrap();

    let events = h.notifier.events_for(URI, JobType::Clone);
    assert_eq!(events.first().unwrap().progress, 0);
    assert_eq!(events.last().unwrap().progress, 100);
    assert_monotonic(&events);
}

#[tokio::test]
async fn recloning_same_revision_converges() {
    let h = harness(ScriptedCloner::succeeding(REVISION), None);
    enqueue_clone(&h, URL).await;
    h.dispatcher.run_next(JobType::Clone).await.unwrap();
    let first = h.dispatcher.get_repository_status(URI).await.unwrap().unwrap();

    enqueue_clone(&h, URL).await;
    let outcome = h.dispatcher.run_next(JobType::Clone).await.unwrap().unwrap();
    assert!(outcome.is_completed());

    let second = h.dispatcher.get_repository_status(URI).await.unwrap().unwrap();
    assert_eq!(second.revision, first.revision);
    assert_eq!(second.clone.as_ref().unwrap().progress, 100);
    assert_eq!(second.clone.unwrap().revision.as_deref(), Some(REVISION));
}

#[tokio::test]
async fn concurrent_clones_do_not_cross_write() {
    let h = harness(ScriptedCloner::succeeding(REVISION).slow(), None);
    enqueue_clone(&h, "https://example.com/one.git").await;
    enqueue_clone(&h, "https://example.com/two.git").await;

    let (a, b) = tokio::join!(
        h.dispatcher.run_next(JobType::Clone),
        h.dispatcher.run_next(JobType::Clone)
    );
    assert!(a.unwrap().unwrap().is_completed());
    assert!(b.unwrap().unwrap().is_completed());

    for uri in ["example.com/one", "example.com/two"] {
        let events = h.notifier.events_for(uri, JobType::Clone);
        assert!(events.iter().all(|e| e.uri == uri));
        assert_monotonic(&events);
        let status = h.status.get_status(uri).await.unwrap().unwrap();
        assert_eq!(status.uri, uri);
        assert_eq!(status.clone.unwrap().uri, uri);
    }
    assert_eq!(h.queue.list(JobType::Index).await.unwrap().len(), 2);
}

#[tokio::test]
async fn failing_clone_keeps_last_progress_and_skips_index() {
    let h = harness(ScriptedCloner::failing_at(40), None);
    let job = enqueue_clone(&h, URL).await;

    let outcome = h.dispatcher.run_next(JobType::Clone).await.unwrap().unwrap();
    assert!(matches!(outcome, JobOutcome::Failed { ref error, .. } if error.contains("network unreachable")));

    let status = h.dispatcher.get_status(URI, JobType::Clone).await.unwrap().unwrap();
    assert_eq!(status.progress, 40);
    assert!(h.queue.list(JobType::Index).await.unwrap().is_empty());

    let failed = h.queue.get(job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(h.dispatcher.metrics().snapshot().stage(JobType::Clone).failed, 1);
}

#[tokio::test]
async fn chain_failure_still_completes_clone() {
    let h = harness(ScriptedCloner::succeeding(REVISION), Some(JobType::Index));
    let job = enqueue_clone(&h, URL).await;

    let outcome = h.dispatcher.run_next(JobType::Clone).await.unwrap().unwrap();
    match outcome {
        JobOutcome::ChainBroken { job_id, next_stage, error } => {
            assert_eq!(job_id, job.id);
            assert_eq!(next_stage, JobType::Index);
            assert!(error.contains("queue is down"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert_eq!(h.queue.get(job.id).await.unwrap().unwrap().status, JobStatus::Completed);
    let status = h.dispatcher.get_status(URI, JobType::Clone).await.unwrap().unwrap();
    assert_eq!(status.progress, 100);

    let counts = h.dispatcher.metrics().snapshot().stage(JobType::Clone);
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.chain_failures, 1);
    assert_eq!(counts.failed, 0);
}

#[tokio::test]
async fn delete_without_prior_status_completes() {
    let h = harness(ScriptedCloner::succeeding(REVISION), None);
    h.dispatcher
        .enqueue_job(JobType::Delete, JobPayload::delete("example.com/ghost", "/data"), JobOptions::new())
        .await
        .unwrap();

    let outcome = h.dispatcher.run_next(JobType::Delete).await.unwrap().unwrap();
    assert!(matches!(outcome, JobOutcome::Completed { next: None, .. }));
    assert!(h.status.get_status("example.com/ghost").await.unwrap().is_none());
    assert_eq!(*h.remover.removed.lock().unwrap(), vec!["example.com/ghost".to_string()]);
}

#[tokio::test]
async fn delete_removes_existing_status() {
    let h = harness(ScriptedCloner::succeeding(REVISION), None);
    enqueue_clone(&h, URL).await;
    h.dispatcher.run_next(JobType::Clone).await.unwrap();
    assert!(h.status.get_status(URI).await.unwrap().is_some());

    h.dispatcher
        .enqueue_job(JobType::Delete, JobPayload::delete(URI, "/data"), JobOptions::new())
        .await
        .unwrap();
    h.dispatcher.run_next(JobType::Delete).await.unwrap();

    assert!(h.status.get_status(URI).await.unwrap().is_none());
    let done = h.notifier.events_for(URI, JobType::Delete);
    assert_eq!(done.last().unwrap().progress, 100);
}

#[tokio::test]
async fn invalid_url_is_rejected_before_enqueue() {
    let h = harness(ScriptedCloner::succeeding(REVISION), None);
    let err = h
        .dispatcher
        .enqueue_job(JobType::Clone, JobPayload::clone_url("not a url", "/data"), JobOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(h.queue.depth(JobType::Clone).await.unwrap(), 0);
    assert!(h.status.list_status().await.unwrap().is_empty());
}

#[tokio::test]
async fn status_write_failure_aborts_enqueue() {
    let queue = Arc::new(LocalJobQueue::in_memory());
    let dispatcher = JobDispatcher::builder(queue.clone(), Arc::new(BrokenStatusStore))
        .worker(Arc::new(CloneWorker::new(Arc::new(ScriptedCloner::succeeding(REVISION)))))
        .build();

    let err = dispatcher
        .enqueue_job(JobType::Clone, JobPayload::clone_url(URL, "/data"), JobOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Status(_)));
    assert_eq!(queue.depth(JobType::Clone).await.unwrap(), 0);
}

#[tokio::test]
async fn unregistered_job_type_is_refused() {
    let queue = Arc::new(LocalJobQueue::in_memory());
    let dispatcher =
        JobDispatcher::builder(queue, Arc::new(LocalStatusStore::in_memory())).build();
    let err = dispatcher
        .enqueue_job(JobType::Index, JobPayload::index(URI, None, "/data"), JobOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::NoWorker(JobType::Index)));
}

#[tokio::test]
async fn runner_drives_pipeline_and_shuts_down() {
    let h = harness(ScriptedCloner::succeeding(REVISION).slow(), None);
    let shutdown = Arc::new(Notify::new());
    let config = WorkerRunnerBuilder::new()
        .poll_interval(Duration::from_millis(20))
        .shutdown_timeout(Duration::from_secs(5))
        .concurrency(JobType::Clone, 2)
        .build();

    let runner = tokio::spawn(WorkerRunner::run(h.dispatcher.clone(), config, shutdown.clone()));

    enqueue_clone(&h, "https://example.com/one.git").await;
    enqueue_clone(&h, "https://example.com/two.git").await;

    let all_indexed = async {
        loop {
            let jobs = h.queue.list(JobType::Index).await.unwrap();
            if jobs.len() == 2 && jobs.iter().all(|j| j.status == JobStatus::Completed) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), all_indexed)
        .await
        .expect("pipeline did not finish");

    shutdown.notify_one();
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("runner did not stop")
        .unwrap()
        .unwrap();

    for uri in ["example.com/one", "example.com/two"] {
        let status = h.status.get_status(uri).await.unwrap().unwrap();
        assert!(status.clone.unwrap().is_done());
        assert!(status.index.unwrap().is_done());
    }
}
