//! Index action that inventories a checkout's files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use walkdir::WalkDir;

use repoflow_core::repository_path;

use crate::actions::{IndexResult, Indexer};
use crate::context::ProgressReporter;
use crate::error::WorkerError;
use crate::git::GitCli;

/// Walks `{data_path}/{uri}` (skipping `.git`) and tallies files by
/// extension, reporting progress by files visited.
///
/// With git attached, the checkout's HEAD is read before the walk. A later
/// clone may have moved it past the requested revision; the walk then covers
/// HEAD and the result names HEAD.
#[derive(Default, Clone)]
pub struct InventoryIndexer {
    git: Option<Arc<GitCli>>,
}

impl InventoryIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_git(git: Arc<GitCli>) -> Self {
        Self { git: Some(git) }
    }

    async fn checked_out_revision(
        &self,
        uri: &str,
        root: &Path,
        requested: Option<&str>,
    ) -> Result<Option<String>, WorkerError> {
        let Some(git) = self.git.as_ref().filter(|_| root.join(".git").exists()) else {
            return Ok(requested.map(str::to_string));
        };
        let head = git.head_revision(root).await?;
        if let Some(requested) = requested.filter(|r| *r != head) {
            warn!(
                uri,
                requested,
                head = %head,
                "Checkout is not at the requested revision, indexing HEAD"
            );
        }
        Ok(Some(head))
    }
}

fn list_files(root: &Path) -> Vec<(PathBuf, u64)> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let size = e.metadata().map(|m| m.len()).unwrap_or(0);
            (e.into_path(), size)
        })
        .collect()
}

#[async_trait]
impl Indexer for InventoryIndexer {
    async fn index(
        &self,
        uri: &str,
        revision: Option<&str>,
        data_path: &Path,
        reporter: &ProgressReporter,
    ) -> Result<IndexResult, WorkerError> {
        let root = repository_path(data_path, uri)?;
        if !root.is_dir() {
            return Err(WorkerError::action(
                "index",
                format!("no checkout at {}", root.display()),
            ));
        }
        let revision = self.checked_out_revision(uri, &root, revision).await?;
        debug!(
            uri,
            revision = revision.as_deref().unwrap_or("-"),
            path = %root.display(),
            "Indexing"
        );

        let walk_root = root.clone();
        let files = tokio::task::spawn_blocking(move || list_files(&walk_root))
            .await
            .map_err(|e| WorkerError::action("index", e.to_string()))?;

        let total = files.len();
        let mut result = IndexResult {
            revision,
            ..IndexResult::default()
        };
        let mut last_pct = 0u8;
        for (i, (path, size)) in files.iter().enumerate() {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            *result.extensions.entry(ext).or_insert(0) += 1;
            result.files += 1;
            result.bytes += size;

            let pct = ((i + 1) * 99 / total.max(1)) as u8;
            if pct > last_pct {
                last_pct = pct;
                reporter.report(pct, None).await;
            }
        }
        Ok(result)
    }
}

/// Extension tallies sorted by count, most common first.
pub fn top_extensions(result: &IndexResult, limit: usize) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = result
        .extensions
        .iter()
        .map(|(k, v)| (k.clone(), *v))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts.truncate(limit);
    counts
}
