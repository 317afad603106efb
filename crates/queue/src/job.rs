//! Job records and their state machine.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use repoflow_core::{uri_from_url, validate_uri, JobType};

use crate::error::QueueError;

/// Opaque job handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| QueueError::InvalidPayload(format!("bad job id: {s}")))
    }
}

/// `Enqueued → Running → {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Enqueued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    fn can_move_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Enqueued, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Enqueued => "enqueued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Type-specific job input: `{url?, uri?, dataPath, revision?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub data_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl JobPayload {
    pub fn clone_url(url: impl Into<String>, data_path: impl Into<PathBuf>) -> Self {
        Self {
            url: Some(url.into()),
            uri: None,
            data_path: data_path.into(),
            revision: None,
        }
    }

    pub fn index(
        uri: impl Into<String>,
        revision: Option<String>,
        data_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            url: None,
            uri: Some(uri.into()),
            data_path: data_path.into(),
            revision,
        }
    }

    pub fn delete(uri: impl Into<String>, data_path: impl Into<PathBuf>) -> Self {
        Self {
            url: None,
            uri: Some(uri.into()),
            data_path: data_path.into(),
            revision: None,
        }
    }

    /// The repository uri this job is about: the explicit `uri`, or the one
    /// derived from `url`.
    pub fn subject_uri(&self) -> Result<String, QueueError> {
        match (&self.uri, &self.url) {
            (Some(uri), _) => {
                validate_uri(uri)?;
                Ok(uri.clone())
            }
            (None, Some(url)) => Ok(uri_from_url(url)?),
            (None, None) => Err(QueueError::InvalidPayload(
                "payload carries neither uri nor url".into(),
            )),
        }
    }
}

/// Free-form knobs passed through with the job (retry/backoff hints etc.).
pub type JobOptions = serde_json::Map<String, serde_json::Value>;

/// A durable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub payload: JobPayload,
    #[serde(default)]
    pub options: JobOptions,
    pub status: JobStatus,
    /// Number of times the job has been handed to a worker.
    #[serde(default)]
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    pub fn new(job_type: JobType, payload: JobPayload, options: JobOptions) -> Self {
        Self {
            id: JobId::new(),
            job_type,
            payload,
            options,
            status: JobStatus::Enqueued,
            attempts: 0,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn start(&mut self) -> Result<(), QueueError> {
        self.transition(JobStatus::Running)?;
        self.attempts += 1;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), QueueError> {
        self.transition(JobStatus::Completed)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), QueueError> {
        self.transition(JobStatus::Failed)?;
        self.finished_at = Some(Utc::now());
        self.error = Some(error.into());
        Ok(())
    }

    /// Put a job that was running when the process died back in line.
    pub(crate) fn requeue_abandoned(&mut self) {
        self.status = JobStatus::Enqueued;
        self.started_at = None;
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), QueueError> {
        if !self.status.can_move_to(next) {
            return Err(QueueError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
