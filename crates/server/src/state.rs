use std::path::PathBuf;
use std::sync::Arc;

use repoflow_core::Config;
use repoflow_notify::BroadcastNotifier;
use repoflow_storage::RepositoryStore;
use repoflow_worker::JobDispatcher;

pub struct AppState {
    pub config: Config,
    pub repositories: Arc<dyn RepositoryStore>,
    pub dispatcher: Arc<JobDispatcher>,
    /// Source of the websocket progress feed.
    pub progress: Arc<BroadcastNotifier>,
}

impl AppState {
    /// Root below which jobs check repositories out.
    pub fn data_path(&self) -> PathBuf {
        self.config.storage.repo_path.clone()
    }
}
