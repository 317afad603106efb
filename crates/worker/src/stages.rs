//! Pipeline wiring: which stage follows which.

use std::collections::HashMap;

use repoflow_core::JobType;
use repoflow_queue::{Job, JobPayload};

use crate::lifecycle::JobOutput;

/// Builds the follow-up payload from the finished job and its output.
pub type StageBuilder = fn(&Job, &JobOutput) -> JobPayload;

#[derive(Clone, Copy)]
struct StageLink {
    next: JobType,
    build: StageBuilder,
}

/// Lookup from a completed stage to the stage enqueued after it.
///
/// The default table is the repository pipeline `Clone → Index`. Delete is
/// standalone and never reached by chaining.
#[derive(Clone)]
pub struct StageTable {
    links: HashMap<JobType, StageLink>,
}

impl StageTable {
    /// No chaining at all.
    pub fn empty() -> Self {
        Self {
            links: HashMap::new(),
        }
    }

    /// Enqueue `to` whenever a `from` job completes. Replaces any existing
    /// link for `from`.
    pub fn link(mut self, from: JobType, to: JobType, build: StageBuilder) -> Self {
        self.links.insert(from, StageLink { next: to, build });
        self
    }

    pub fn successor(&self, completed: JobType) -> Option<JobType> {
        self.links.get(&completed).map(|l| l.next)
    }

    /// The job type and payload to enqueue after `job` completed with `output`.
    pub fn next(&self, job: &Job, output: &JobOutput) -> Option<(JobType, JobPayload)> {
        self.links
            .get(&job.job_type)
            .map(|link| (link.next, (link.build)(job, output)))
    }
}

impl Default for StageTable {
    fn default() -> Self {
        Self::empty().link(JobType::Clone, JobType::Index, index_after_clone)
    }
}

fn index_after_clone(job: &Job, output: &JobOutput) -> JobPayload {
    JobPayload::index(
        output.uri.clone(),
        output.revision.clone(),
        job.payload.data_path.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoflow_queue::JobOptions;

    #[test]
    fn test_default_pipeline() {
        let table = StageTable::default();
        assert_eq!(table.successor(JobType::Clone), Some(JobType::Index));
        assert_eq!(table.successor(JobType::Index), None);
        assert_eq!(table.successor(JobType::Delete), None);
    }

    #[test]
    fn test_index_payload_carries_clone_result() {
        let job = Job::new(
            JobType::Clone,
            JobPayload::clone_url("https://example.com/r.git", "/data"),
            JobOptions::new(),
        );
        let output = JobOutput {
            uri: "example.com/r".into(),
            revision: Some("abc123".into()),
            detail: None,
        };

        let (next, payload) = StageTable::default().next(&job, &output).unwrap();
        assert_eq!(next, JobType::Index);
        assert_eq!(payload.uri.as_deref(), Some("example.com/r"));
        assert_eq!(payload.revision.as_deref(), Some("abc123"));
        assert_eq!(payload.data_path, std::path::PathBuf::from("/data"));
        assert!(payload.url.is_none());
    }

    #[test]
    fn test_extra_stage_without_touching_prior_ones() {
        fn delete_after_index(_: &Job, out: &JobOutput) -> JobPayload {
            JobPayload::delete(out.uri.clone(), "/tmp")
        }
        let table = StageTable::default().link(JobType::Index, JobType::Delete, delete_after_index);
        assert_eq!(table.successor(JobType::Clone), Some(JobType::Index));
        assert_eq!(table.successor(JobType::Index), Some(JobType::Delete));
    }
}
