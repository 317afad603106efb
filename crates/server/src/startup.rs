//! Service wiring: stores, queue, notifiers and workers built from config.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use repoflow_core::config::NotifyConfig;
use repoflow_core::{Config, JobType, PROGRESS_DONE};
use repoflow_notify::{
    BroadcastNotifier, FanoutNotifier, ProgressEvent, ProgressNotifier, QueuedNotifier,
    WebhookNotifier,
};
use repoflow_queue::LocalJobQueue;
use repoflow_storage::{LocalRepositoryStore, LocalStatusStore, RepositoryStore};
use repoflow_worker::{
    CloneWorker, DeleteWorker, GitCli, IndexWorker, InventoryIndexer, JobDispatcher,
};

use crate::state::AppState;

/// Open the durable stores under `DATA_DIR` and register the clone, index
/// and delete workers.
pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    tokio::fs::create_dir_all(&config.storage.data_dir).await?;
    tokio::fs::create_dir_all(&config.storage.repo_path).await?;

    let status = Arc::new(LocalStatusStore::open(config.storage.status_path()).await?);
    let repositories =
        Arc::new(LocalRepositoryStore::open(config.storage.repositories_path()).await?);
    let queue = Arc::new(
        LocalJobQueue::open(config.storage.jobs_path(), config.queue.archive_limit).await?,
    );
    info!(path = %config.storage.jobs_path().display(), "job queue opened");

    let progress = Arc::new(BroadcastNotifier::new());
    let notifier = build_notifier(&config.notify, progress.clone())?;

    let git = Arc::new(GitCli::from_config(&config.git));
    let dispatcher = JobDispatcher::builder(queue, status)
        .notifier(notifier)
        .worker(Arc::new(CloneWorker::new(git.clone())))
        .worker(Arc::new(IndexWorker::new(Arc::new(InventoryIndexer::with_git(
            git.clone(),
        )))))
        .worker(Arc::new(DeleteWorker::new(git)))
        .build();

    Ok(Arc::new(AppState {
        config: config.clone(),
        repositories,
        dispatcher: Arc::new(dispatcher),
        progress,
    }))
}

/// Websocket broadcast, plus the webhook when `PROGRESS_WEBHOOK_URL` is set.
/// Webhook posts run on a background task behind a bounded buffer.
fn build_notifier(
    config: &NotifyConfig,
    progress: Arc<BroadcastNotifier>,
) -> anyhow::Result<Arc<dyn ProgressNotifier>> {
    let Some(url) = config.webhook_url.as_deref() else {
        return Ok(progress as Arc<dyn ProgressNotifier>);
    };

    let webhook = WebhookNotifier::new(
        url,
        config.webhook_headers.clone(),
        config.webhook_timeout(),
    )?;
    info!(
        url = webhook.url(),
        headers = config.webhook_headers.len(),
        buffer = config.webhook_buffer,
        "progress webhook enabled"
    );

    let mut fanout = FanoutNotifier::new(Vec::new());
    fanout.push(progress);
    fanout.push(Arc::new(QueuedNotifier::spawn(
        Arc::new(webhook),
        config.webhook_buffer,
    )));
    Ok(Arc::new(fanout))
}

/// Copy the revision reached by each finished clone onto its repository
/// record. Runs until the progress channel closes.
pub async fn track_revisions(
    repositories: Arc<dyn RepositoryStore>,
    mut rx: broadcast::Receiver<ProgressEvent>,
) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "revision tracker lagging, progress events dropped");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        if event.stage != JobType::Clone || event.progress < PROGRESS_DONE {
            continue;
        }
        let Some(revision) = event.revision else {
            continue;
        };

        match repositories.get_repository(&event.uri).await {
            Ok(Some(repo)) if repo.revision.as_deref() != Some(revision.as_str()) => {
                debug!(uri = %event.uri, revision = %revision, "recording cloned revision");
                if let Err(e) = repositories.set_repository(repo.with_revision(revision)).await {
                    warn!(uri = %event.uri, error = %e, "failed to record revision");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(uri = %event.uri, error = %e, "failed to load repository record"),
        }
    }
}
