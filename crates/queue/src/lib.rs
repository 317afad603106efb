//! Durable job queue for repoflow.
//!
//! A [`Job`] moves through `Enqueued → Running → {Completed | Failed}`. The
//! [`JobQueue`] trait hands each job to one worker; [`LocalJobQueue`] is the
//! in-process implementation with an optional crash-safe journal.

pub mod error;
pub mod job;
pub mod local;
pub mod queue;

pub use error::QueueError;
pub use job::{Job, JobId, JobOptions, JobPayload, JobStatus};
pub use local::{LocalJobQueue, DEFAULT_ARCHIVE_LIMIT};
pub use queue::{JobQueue, QueueHealth};
