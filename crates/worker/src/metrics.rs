//! Per-stage job counters.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use repoflow_core::JobType;

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    chain_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCounts {
    pub enqueued: u64,
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    /// Completed jobs whose follow-up stage could not be enqueued.
    pub chain_failures: u64,
    pub in_flight: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub stages: BTreeMap<String, StageCounts>,
}

impl MetricsSnapshot {
    pub fn stage(&self, job_type: JobType) -> StageCounts {
        self.stages.get(job_type.as_str()).copied().unwrap_or_default()
    }
}

pub struct WorkerMetrics {
    counters: HashMap<JobType, Counters>,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        Self {
            counters: JobType::ALL.iter().map(|t| (*t, Counters::default())).collect(),
        }
    }

    pub fn record_enqueued(&self, job_type: JobType) {
        self.bump(job_type, |c| &c.enqueued);
    }

    pub fn record_started(&self, job_type: JobType) {
        self.bump(job_type, |c| &c.started);
    }

    pub fn record_completed(&self, job_type: JobType) {
        self.bump(job_type, |c| &c.completed);
    }

    pub fn record_failed(&self, job_type: JobType) {
        self.bump(job_type, |c| &c.failed);
    }

    pub fn record_chain_failure(&self, job_type: JobType) {
        self.bump(job_type, |c| &c.chain_failures);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let stages = JobType::ALL
            .iter()
            .filter_map(|t| self.counters.get(t).map(|c| (t, c)))
            .map(|(t, c)| {
                let started = c.started.load(Ordering::Relaxed);
                let completed = c.completed.load(Ordering::Relaxed);
                let failed = c.failed.load(Ordering::Relaxed);
                let counts = StageCounts {
                    enqueued: c.enqueued.load(Ordering::Relaxed),
                    started,
                    completed,
                    failed,
                    chain_failures: c.chain_failures.load(Ordering::Relaxed),
                    in_flight: started.saturating_sub(completed + failed),
                };
                (t.as_str().to_string(), counts)
            })
            .collect();
        MetricsSnapshot { stages }
    }

    fn bump(&self, job_type: JobType, field: impl Fn(&Counters) -> &AtomicU64) {
        if let Some(c) = self.counters.get(&job_type) {
            field(c).fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for WorkerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
