use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Kind of background work a job carries. Each kind has its own queue lane
/// and its own worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Clone,
    Index,
    Delete,
}

impl JobType {
    pub const ALL: [JobType; 3] = [JobType::Clone, JobType::Index, JobType::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Clone => "clone",
            JobType::Index => "index",
            JobType::Delete => "delete",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "clone" => Ok(JobType::Clone),
            "index" => Ok(JobType::Index),
            "delete" => Ok(JobType::Delete),
            other => Err(CoreError::UnknownJobType(other.to_string())),
        }
    }
}
