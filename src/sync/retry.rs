//! Caller-level retries for ladder fetches
//!
//! Quota waits are handled inside the dispatcher. This layer only covers
//! failures the dispatcher propagates: timeouts, refused connections and
//! server-side 5xx. Backoff grows exponentially and is capped, with optional
//! jitter to keep shards from retrying in lockstep.

use crate::config::RetryConfig;
use crate::error::RetryableError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryManager {
    config: RetryConfig,
}

impl RetryManager {
    /// Create a manager from configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Manager with default configuration
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Fetch one `shard`/`queue` page with `operation`, retrying transient errors
    ///
    /// At most `max_retries + 1` attempts are made.
    pub async fn execute<F, Fut, T, E>(&self, shard: &str, queue: &str, operation: F) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + std::fmt::Display,
    {
        let mut attempt = 0u32;

        loop {
            let err = match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= self.config.max_retries {
                warn!(
                    shard,
                    queue,
                    attempts = attempt + 1,
                    error = %err,
                    "Retries exhausted"
                );
                return Err(err);
            }

            let backoff = self.calculate_backoff(attempt);
            debug!(
                shard,
                queue,
                attempt = attempt + 1,
                max_retries = self.config.max_retries,
                backoff_ms = backoff.as_millis() as u64,
                error = %err,
                "Retrying after transient error"
            );

            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    /// Backoff before retry number `attempt + 1`
    ///
    /// `initial * multiplier^attempt`, capped at `max_backoff_secs`; jitter
    /// scales the result into 50-100% of that.
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base = self.config.initial_backoff_secs as f64
            * self.config.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.config.max_backoff_secs as f64);

        let delay = if self.config.jitter {
            capped * rand::thread_rng().gen_range(0.5..1.0)
        } else {
            capped
        };

        Duration::from_secs_f64(delay)
    }

    /// Retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}
