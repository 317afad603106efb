//! Progress snapshots persisted in the status store and pushed to observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job_type::JobType;

/// Progress ceiling. A snapshot at this value marks a finished stage.
pub const PROGRESS_DONE: u8 = 100;

/// Structured transfer detail reported by `git clone --progress`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneProgress {
    pub is_cloned: bool,
    pub received_objects: u64,
    pub indexed_objects: u64,
    pub total_objects: u64,
    pub local_objects: u64,
    pub total_deltas: u64,
    pub indexed_deltas: u64,
    pub received_bytes: u64,
}

/// Latest known progress of one stage for one repository.
///
/// Last write wins; no history is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerProgress {
    pub uri: String,
    /// 0..=100
    pub progress: u8,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_progress: Option<CloneProgress>,
}

impl WorkerProgress {
    /// Initial snapshot written when a job is enqueued.
    pub fn started(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            progress: 0,
            timestamp: Utc::now(),
            revision: None,
            clone_progress: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.progress >= PROGRESS_DONE
    }
}

/// Everything the status store knows about one repository uri.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryStatus {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone: Option<WorkerProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<WorkerProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<WorkerProgress>,
}

impl RepositoryStatus {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            revision: None,
            clone: None,
            index: None,
            delete: None,
        }
    }

    pub fn stage(&self, stage: JobType) -> Option<&WorkerProgress> {
        match stage {
            JobType::Clone => self.clone.as_ref(),
            JobType::Index => self.index.as_ref(),
            JobType::Delete => self.delete.as_ref(),
        }
    }

    /// Replace the snapshot for `stage`. A snapshot carrying a revision also
    /// updates the repository-level revision.
    pub fn apply(&mut self, stage: JobType, snapshot: WorkerProgress) {
        if let Some(rev) = &snapshot.revision {
            self.revision = Some(rev.clone());
        }
        match stage {
            JobType::Clone => self.clone = Some(snapshot),
            JobType::Index => self.index = Some(snapshot),
            JobType::Delete => self.delete = Some(snapshot),
        }
    }
}
