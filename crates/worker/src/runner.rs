//! Concurrent pull loops with graceful shutdown.
//!
//! [`WorkerRunner`] runs one loop per registered job type. Each loop takes
//! jobs from the queue as long as its concurrency limit allows and runs them
//! on their own tasks, so a long clone never holds up index or delete jobs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{watch, Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use repoflow_core::{Config, JobType};

use crate::dispatcher::{JobDispatcher, JobOutcome};
use crate::error::WorkerError;

// ── WorkerRunnerBuilder ──────────────────────────────────────────────

/// Fluent builder for a [`WorkerRunnerConfig`].
pub struct WorkerRunnerBuilder {
    poll_interval: Duration,
    shutdown_timeout: Duration,
    concurrency: HashMap<JobType, usize>,
}

impl WorkerRunnerBuilder {
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(30),
            concurrency: HashMap::new(),
        }
    }

    /// Upper bound on how long an idle loop sleeps before checking the queue
    /// again (default: 1s).
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// How long to wait for in-flight jobs during shutdown (default: 30s).
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Maximum jobs of `job_type` running at once (default: 1).
    pub fn concurrency(mut self, job_type: JobType, limit: usize) -> Self {
        self.concurrency.insert(job_type, limit.max(1));
        self
    }

    pub fn build(self) -> WorkerRunnerConfig {
        WorkerRunnerConfig {
            poll_interval: self.poll_interval,
            shutdown_timeout: self.shutdown_timeout,
            concurrency: self.concurrency,
        }
    }
}

impl Default for WorkerRunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ── WorkerRunnerConfig ───────────────────────────────────────────────

pub struct WorkerRunnerConfig {
    pub poll_interval: Duration,
    pub shutdown_timeout: Duration,
    pub concurrency: HashMap<JobType, usize>,
}

impl WorkerRunnerConfig {
    pub fn from_config(config: &Config) -> Self {
        WorkerRunnerBuilder::new()
            .poll_interval(config.queue.poll_interval())
            .shutdown_timeout(Duration::from_secs(config.worker.shutdown_timeout_secs))
            .concurrency(JobType::Clone, config.worker.clone_concurrency)
            .concurrency(JobType::Index, config.worker.index_concurrency)
            .concurrency(JobType::Delete, config.worker.delete_concurrency)
            .build()
    }

    pub fn concurrency_for(&self, job_type: JobType) -> usize {
        self.concurrency.get(&job_type).copied().unwrap_or(1)
    }
}

// ── WorkerRunner ─────────────────────────────────────────────────────

pub struct WorkerRunner;

impl WorkerRunner {
    /// Run until `shutdown` is notified.
    ///
    /// Use `notify_one` to trigger shutdown so the signal is not lost if it
    /// arrives before the runner starts waiting. Jobs still running when the
    /// shutdown timeout expires are aborted and stay `Running` in the queue
    /// journal, to be redelivered on the next start.
    pub async fn run(
        dispatcher: Arc<JobDispatcher>,
        config: WorkerRunnerConfig,
        shutdown: Arc<Notify>,
    ) -> Result<(), WorkerError> {
        let job_types = dispatcher.job_types();
        if job_types.is_empty() {
            warn!("worker runner started with no registered workers");
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut lanes = JoinSet::new();
        for job_type in job_types {
            let limit = config.concurrency_for(job_type);
            info!(job_type = %job_type, concurrency = limit, "starting worker lane");
            lanes.spawn(Self::lane(
                dispatcher.clone(),
                job_type,
                limit,
                config.poll_interval,
                stop_rx.clone(),
            ));
        }

        shutdown.notified().await;
        info!(timeout = ?config.shutdown_timeout, "shutdown signal received, draining workers");
        let _ = stop_tx.send(true);

        let drain = async {
            while let Some(res) = lanes.join_next().await {
                if let Err(e) = res {
                    error!(error = %e, "worker lane panicked");
                }
            }
        };
        let drained = tokio::time::timeout(config.shutdown_timeout, drain).await;
        match drained {
            Ok(()) => info!("worker runner stopped gracefully"),
            Err(_) => {
                warn!("worker drain timed out, aborting in-flight jobs");
                lanes.abort_all();
            }
        }
        Ok(())
    }

    /// Pull loop for one job type.
    async fn lane(
        dispatcher: Arc<JobDispatcher>,
        job_type: JobType,
        limit: usize,
        poll_interval: Duration,
        mut stop: watch::Receiver<bool>,
    ) {
        let permits = Arc::new(Semaphore::new(limit.max(1)));
        let mut in_flight: JoinSet<JobOutcome> = JoinSet::new();

        loop {
            if *stop.borrow() {
                break;
            }

            let permit = tokio::select! {
                _ = stop.changed() => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            match dispatcher.queue().dequeue(job_type).await {
                Ok(Some(job)) => {
                    let dispatcher = dispatcher.clone();
                    in_flight.spawn(async move {
                        let outcome = dispatcher.run_job(job).await;
                        drop(permit);
                        outcome
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        _ = stop.changed() => break,
                        _ = dispatcher.queue().wait_for_job(job_type) => {}
                        _ = tokio::time::sleep(poll_interval) => {}
                    }
                }
                Err(e) => {
                    drop(permit);
                    warn!(job_type = %job_type, error = %e, "dequeue failed");
                    tokio::select! {
                        _ = stop.changed() => break,
                        _ = tokio::time::sleep(poll_interval) => {}
                    }
                }
            }

            while let Some(Some(res)) = in_flight.join_next().now_or_never() {
                Self::reap(job_type, res);
            }
        }

        info!(job_type = %job_type, in_flight = in_flight.len(), "worker lane stopping");
        while let Some(res) = in_flight.join_next().await {
            Self::reap(job_type, res);
        }
    }

    fn reap(job_type: JobType, res: Result<JobOutcome, tokio::task::JoinError>) {
        if let Err(e) = res {
            error!(job_type = %job_type, error = %e, "job task panicked");
        }
    }
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C elsewhere.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => {}
                    _ = sigterm.recv() => {}
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "failed to register signal handlers, falling back to ctrl_c");
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl_c");
        std::future::pending::<()>().await;
    }
}
