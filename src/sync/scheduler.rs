//! Periodic ladder synchronization
//!
//! The scheduler repeats each registered job on its interval. The first run
//! starts after an optional initial delay; later runs are spread with random
//! jitter. Each run is bounded by a timeout, and a broadcast shutdown signal
//! stops every job between runs.

use crate::config::SyncConfig;
use crate::error::SyncError;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};

/// Timing parameters for scheduled runs
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Delay before the first run (seconds)
    pub initial_delay_secs: u64,
    /// Upper bound of the random delay added to each scheduled run (seconds)
    pub jitter_secs: u64,
    /// Maximum duration of one run (seconds)
    pub run_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 0,
            jitter_secs: 60,
            run_timeout_secs: 21600,
        }
    }
}

impl From<&SyncConfig> for SchedulerConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            initial_delay_secs: config.initial_delay_secs,
            jitter_secs: config.jitter_secs,
            run_timeout_secs: config.run_timeout_secs,
        }
    }
}

/// Outcome of one full run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    /// Shard/queue pages fetched and merged
    pub pages_merged: u64,
    /// Records seen for the first time
    pub records_created: u64,
    /// Existing records refreshed
    pub records_updated: u64,
    /// History entries appended
    pub history_appended: u64,
}

impl SyncResult {
    /// Fold another page's counts into this result
    pub fn absorb(&mut self, other: &SyncResult) {
        self.pages_merged += other.pages_merged;
        self.records_created += other.records_created;
        self.records_updated += other.records_updated;
        self.history_appended += other.history_appended;
    }
}

/// A job the scheduler can run repeatedly
#[async_trait]
pub trait Syncable: Send + Sync {
    /// Job name used in logs
    fn name(&self) -> &str;

    /// Time between runs
    fn sync_interval(&self) -> Duration;

    /// Execute one run
    async fn sync(&self) -> Result<SyncResult, SyncError>;
}

/// How one scheduled run ended
#[derive(Debug, Clone, PartialEq)]
enum RunOutcome {
    Completed(SyncResult),
    Failed(SyncError),
    TimedOut,
}

/// Runs [`Syncable`] jobs on their intervals until shutdown
pub struct SyncScheduler {
    config: SchedulerConfig,
    jobs: Vec<Arc<dyn Syncable>>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl SyncScheduler {
    /// Create a scheduler for `jobs`
    pub fn new(
        config: SchedulerConfig,
        jobs: Vec<Arc<dyn Syncable>>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            jobs,
            shutdown_rx,
        }
    }

    /// Run until the shutdown signal fires
    pub async fn run(mut self) {
        info!(jobs = self.jobs.len(), "Starting sync scheduler");

        if self.config.initial_delay_secs > 0 {
            debug!(
                delay_secs = self.config.initial_delay_secs,
                "Waiting for initial delay"
            );
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received before first run");
                    return;
                }
                _ = tokio::time::sleep(Duration::from_secs(self.config.initial_delay_secs)) => {}
            }
        }

        let (task_shutdown_tx, _) = broadcast::channel::<()>(1);
        let handles: Vec<_> = self
            .jobs
            .iter()
            .map(|job| {
                let job = job.clone();
                let config = self.config.clone();
                let shutdown_rx = task_shutdown_tx.subscribe();
                tokio::spawn(async move {
                    Self::run_job(job, config, shutdown_rx).await;
                })
            })
            .collect();

        let _ = self.shutdown_rx.recv().await;
        info!("Shutdown signal received, stopping sync scheduler");
        let _ = task_shutdown_tx.send(());

        for handle in handles {
            let _ = handle.await;
        }

        info!("Sync scheduler stopped");
    }

    fn jitter(config: &SchedulerConfig) -> Duration {
        if config.jitter_secs > 0 {
            Duration::from_secs(rand::thread_rng().gen_range(0..config.jitter_secs))
        } else {
            Duration::ZERO
        }
    }

    async fn run_job(
        job: Arc<dyn Syncable>,
        config: SchedulerConfig,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let name = job.name().to_string();
        let interval = job.sync_interval();

        info!(job = name, "Performing initial sync");
        Self::perform_sync(&job, &config).await;

        let jitter = Self::jitter(&config);
        debug!(
            job = name,
            interval_secs = interval.as_secs(),
            jitter_secs = jitter.as_secs(),
            "Scheduled next sync"
        );
        let mut timer = interval_at(Instant::now() + interval + jitter, interval);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!(job = name, "Sync job shutting down");
                    break;
                }
                _ = timer.tick() => {
                    let jitter = Self::jitter(&config);
                    if !jitter.is_zero() {
                        tokio::time::sleep(jitter).await;
                    }

                    info!(job = name, "Performing scheduled sync");
                    Self::perform_sync(&job, &config).await;
                }
            }
        }
    }

    async fn perform_sync(job: &Arc<dyn Syncable>, config: &SchedulerConfig) -> RunOutcome {
        let name = job.name();
        let started = Instant::now();

        let outcome =
            match tokio::time::timeout(Duration::from_secs(config.run_timeout_secs), job.sync())
                .await
            {
                Ok(Ok(summary)) => RunOutcome::Completed(summary),
                Ok(Err(err)) => RunOutcome::Failed(err),
                Err(_) => RunOutcome::TimedOut,
            };

        let elapsed_secs = started.elapsed().as_secs();
        let next_sync_secs = job.sync_interval().as_secs();
        match &outcome {
            RunOutcome::Completed(summary) => info!(
                job = name,
                pages = summary.pages_merged,
                created = summary.records_created,
                updated = summary.records_updated,
                history = summary.history_appended,
                elapsed_secs,
                next_sync_secs,
                "Sync completed"
            ),
            RunOutcome::Failed(err) => warn!(
                job = name,
                error = %err,
                elapsed_secs,
                next_sync_secs,
                "Sync failed"
            ),
            RunOutcome::TimedOut => error!(
                job = name,
                timeout_secs = config.run_timeout_secs,
                next_sync_secs,
                "Sync timed out, next run continues the pass"
            ),
        }
        outcome
    }
}
