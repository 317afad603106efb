//! Job execution for repoflow.
//!
//! Workers implement [`WorkerLifecycle`]: an enqueue hook that writes the
//! initial status, the domain action itself, and a completion hook. The
//! [`JobDispatcher`] drives every job through those hooks the same way,
//! chains follow-up stages from a [`StageTable`], and the [`WorkerRunner`]
//! pulls jobs from the queue concurrently.

pub mod actions;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod git;
pub mod inventory;
pub mod lifecycle;
pub mod metrics;
pub mod runner;
pub mod stages;
pub mod workers;

pub use actions::{CloneResult, Cloner, IndexResult, Indexer, Remover};
pub use context::{ProgressReporter, WorkerContext};
pub use dispatcher::{JobDispatcher, JobDispatcherBuilder, JobOutcome};
pub use error::WorkerError;
pub use git::GitCli;
pub use inventory::InventoryIndexer;
pub use lifecycle::{JobOutput, WorkerLifecycle};
pub use metrics::{MetricsSnapshot, StageCounts, WorkerMetrics};
pub use runner::{shutdown_signal, WorkerRunner, WorkerRunnerBuilder, WorkerRunnerConfig};
pub use stages::StageTable;
pub use workers::{CloneWorker, DeleteWorker, IndexWorker};
