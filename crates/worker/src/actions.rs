//! Domain actions the workers delegate to.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;

use repoflow_core::{CloneProgress, Repository};

use crate::context::ProgressReporter;
use crate::error::WorkerError;

#[derive(Debug, Clone, PartialEq)]
pub struct CloneResult {
    pub uri: String,
    /// Commit the checkout is at after the clone or update.
    pub revision: String,
    pub detail: Option<CloneProgress>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexResult {
    /// Commit the walk actually ran against, when known.
    pub revision: Option<String>,
    pub files: usize,
    pub bytes: u64,
    /// File count per extension (`""` for files without one).
    pub extensions: BTreeMap<String, usize>,
}

/// Brings `{data_path}/{uri}` to the remote's current state.
#[async_trait]
pub trait Cloner: Send + Sync {
    async fn clone_repository(
        &self,
        repo: &Repository,
        data_path: &Path,
        reporter: &ProgressReporter,
    ) -> Result<CloneResult, WorkerError>;
}

#[async_trait]
pub trait Indexer: Send + Sync {
    async fn index(
        &self,
        uri: &str,
        revision: Option<&str>,
        data_path: &Path,
        reporter: &ProgressReporter,
    ) -> Result<IndexResult, WorkerError>;
}

/// Removes a repository's local data. Removing something already gone
/// succeeds.
#[async_trait]
pub trait Remover: Send + Sync {
    async fn remove(&self, uri: &str, data_path: &Path) -> Result<(), WorkerError>;
}
