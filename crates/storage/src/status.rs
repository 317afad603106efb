//! Per-repository status store.
//!
//! One entry per repository uri, holding the latest progress snapshot for each
//! stage. Writes are last-write-wins; no history is kept.

use std::path::PathBuf;

use async_trait::async_trait;
use repoflow_core::{JobType, RepositoryStatus, WorkerProgress};
use tracing::debug;

use crate::error::StorageError;
use crate::map::PersistentMap;

/// Shared status namespace written by workers and read by status pollers.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Replace the `stage` snapshot for `uri`, creating the entry if needed.
    /// Returns the entry as stored.
    async fn set_status(
        &self,
        uri: &str,
        stage: JobType,
        snapshot: WorkerProgress,
    ) -> Result<RepositoryStatus, StorageError>;

    async fn get_status(&self, uri: &str) -> Result<Option<RepositoryStatus>, StorageError>;

    /// Remove the entry for `uri`. Removing an absent entry is not an error;
    /// the return value says whether anything was removed.
    async fn delete_status(&self, uri: &str) -> Result<bool, StorageError>;

    async fn list_status(&self) -> Result<Vec<RepositoryStatus>, StorageError>;
}

/// Status store kept in memory, optionally durable via a JSON file.
pub struct LocalStatusStore {
    entries: PersistentMap<RepositoryStatus>,
}

impl LocalStatusStore {
    pub fn in_memory() -> Self {
        Self {
            entries: PersistentMap::in_memory(),
        }
    }

    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Ok(Self {
            entries: PersistentMap::open(path).await?,
        })
    }
}

#[async_trait]
impl StatusStore for LocalStatusStore {
    async fn set_status(
        &self,
        uri: &str,
        stage: JobType,
        snapshot: WorkerProgress,
    ) -> Result<RepositoryStatus, StorageError> {
        debug!(uri, stage = %stage, progress = snapshot.progress, "set status");
        self.entries
            .upsert(uri, || RepositoryStatus::new(uri), |entry| entry.apply(stage, snapshot))
            .await
    }

    async fn get_status(&self, uri: &str) -> Result<Option<RepositoryStatus>, StorageError> {
        Ok(self.entries.get(uri).await)
    }

    async fn delete_status(&self, uri: &str) -> Result<bool, StorageError> {
        let removed = self.entries.remove(uri).await?;
        debug!(uri, removed, "delete status");
        Ok(removed)
    }

    async fn list_status(&self) -> Result<Vec<RepositoryStatus>, StorageError> {
        Ok(self.entries.values().await)
    }
}
