//! Repository records, keyed by uri.

use std::path::PathBuf;

use async_trait::async_trait;
use repoflow_core::Repository;

use crate::error::StorageError;
use crate::map::PersistentMap;

#[async_trait]
pub trait RepositoryStore: Send + Sync {
    async fn get_repository(&self, uri: &str) -> Result<Option<Repository>, StorageError>;

    /// Insert a new record. Fails with [`StorageError::AlreadyExists`] if the
    /// uri is taken.
    async fn add_repository(&self, repo: Repository) -> Result<(), StorageError>;

    /// Insert or replace a record.
    async fn set_repository(&self, repo: Repository) -> Result<(), StorageError>;

    async fn delete_repository(&self, uri: &str) -> Result<bool, StorageError>;

    async fn list_repositories(&self) -> Result<Vec<Repository>, StorageError>;
}

pub struct LocalRepositoryStore {
    records: PersistentMap<Repository>,
}

impl LocalRepositoryStore {
    pub fn in_memory() -> Self {
        Self {
            records: PersistentMap::in_memory(),
        }
    }

    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Ok(Self {
            records: PersistentMap::open(path).await?,
        })
    }
}

#[async_trait]
impl RepositoryStore for LocalRepositoryStore {
    async fn get_repository(&self, uri: &str) -> Result<Option<Repository>, StorageError> {
        Ok(self.records.get(uri).await)
    }

    async fn add_repository(&self, repo: Repository) -> Result<(), StorageError> {
        // Existence check and insert are separate steps; two concurrent adds
        // of the same uri can both pass the check.
        if self.records.contains(&repo.uri).await {
            return Err(StorageError::AlreadyExists(repo.uri));
        }
        let uri = repo.uri.clone();
        self.records.insert(&uri, repo).await
    }

    async fn set_repository(&self, repo: Repository) -> Result<(), StorageError> {
        let uri = repo.uri.clone();
        self.records.insert(&uri, repo).await
    }

    async fn delete_repository(&self, uri: &str) -> Result<bool, StorageError> {
        self.records.remove(uri).await
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>, StorageError> {
        Ok(self.records.values().await)
    }
}
