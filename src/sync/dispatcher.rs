//! Quota-aware request dispatcher
//!
//! Every request is held back until all of its scopes report zero wait, then
//! sent once. The send instant is recorded against each scope, and responses
//! with the quota-exceeded status are swallowed and retried after a fallback
//! wait. Every other status is returned untouched.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::{ConfigError, RateLimitConfig};
use crate::error::DispatchError;
use crate::limiter::{QuotaProtocol, RateLimitRegistry, ResponseQuota, ScopeSet};

use super::http_client::{ApiRequest, ApiResponse, Transport};

/// Sends requests through a [`Transport`] without exceeding any known quota
pub struct RequestDispatcher<T: Transport> {
    transport: T,
    registry: RateLimitRegistry,
    protocol: QuotaProtocol,
    fallback_wait: Duration,
    max_wait: Option<Duration>,
    shutdown: Option<broadcast::Receiver<()>>,
}

enum Pause {
    Elapsed,
    Shutdown,
    SignalClosed,
}

impl<T: Transport> RequestDispatcher<T> {
    /// Create a dispatcher with a one second fallback wait and no deadline
    pub fn new(transport: T, registry: RateLimitRegistry, protocol: QuotaProtocol) -> Self {
        Self {
            transport,
            registry,
            protocol,
            fallback_wait: Duration::from_secs(1),
            max_wait: None,
            shutdown: None,
        }
    }

    /// Create a dispatcher from rate limit configuration
    pub fn from_config(
        transport: T,
        config: &RateLimitConfig,
        routes: &[String],
    ) -> Result<Self, ConfigError> {
        let registry = RateLimitRegistry::from_config(config, routes)?;
        let mut dispatcher = Self::new(
            transport,
            registry,
            QuotaProtocol::from_config(&config.protocol),
        )
        .with_fallback_wait(Duration::from_millis(config.fallback_wait_ms));
        if let Some(secs) = config.max_wait_secs {
            dispatcher = dispatcher.with_max_wait(Duration::from_secs(secs));
        }
        Ok(dispatcher)
    }

    /// Minimum wait after a quota-exceeded response
    pub fn with_fallback_wait(mut self, wait: Duration) -> Self {
        self.fallback_wait = wait;
        self
    }

    /// Upper bound on the total time one dispatch may spend waiting
    pub fn with_max_wait(mut self, limit: Duration) -> Self {
        self.max_wait = Some(limit);
        self
    }

    /// Abort waits when a shutdown signal arrives
    pub fn with_shutdown(mut self, shutdown: broadcast::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Tracker registry
    pub fn registry(&self) -> &RateLimitRegistry {
        &self.registry
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `request`, counting it against `scopes`
    ///
    /// Returns the first response whose status is not the quota-exceeded
    /// status. A successful response without valid quota headers fails with
    /// [`DispatchError::QuotaHeader`] after the call has been counted.
    /// Limit definitions on other responses are ignored; their counts still
    /// reconcile scopes that already exist.
    pub async fn dispatch(
        &mut self,
        request: &ApiRequest,
        scopes: &ScopeSet,
    ) -> Result<ApiResponse, DispatchError> {
        let mut waited = Duration::ZERO;

        loop {
            loop {
                let wait = self.registry.wait_time(scopes, Instant::now());
                if wait.is_zero() {
                    break;
                }
                debug!(
                    url = %request.url,
                    route = %scopes.route,
                    method = %scopes.method,
                    wait_ms = wait.as_millis() as u64,
                    "Waiting for quota"
                );
                self.pause(wait, &mut waited).await?;
            }

            let sent_at = Instant::now();
            let response = self.transport.send(request).await?;

            let strict = response.status.is_success();
            let quota = match self.protocol.read(&response.headers, strict) {
                Ok(quota) => quota,
                Err(err) => {
                    self.registry
                        .record(scopes, sent_at, &ResponseQuota::default());
                    warn!(url = %request.url, error = %err, "Unusable quota headers");
                    return Err(err.into());
                }
            };
            if strict {
                self.registry.record(scopes, sent_at, &quota);
            } else {
                // Limits are only learned from successful responses
                let counted = ResponseQuota {
                    app_limits: None,
                    method_limits: None,
                    ..quota.clone()
                };
                self.registry.record(scopes, sent_at, &counted);
            }

            if !self.protocol.is_quota_exceeded(response.status) {
                return Ok(response);
            }

            let wait = self.fallback_for(&quota);
            warn!(
                url = %request.url,
                status = response.status.as_u16(),
                wait_ms = wait.as_millis() as u64,
                "Quota exceeded, retrying"
            );
            self.pause(wait, &mut waited).await?;
        }
    }

    /// Wait after a quota-exceeded response
    fn fallback_for(&self, quota: &ResponseQuota) -> Duration {
        [
            Some(self.fallback_wait),
            quota.saturated_period(),
            quota.retry_after,
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(self.fallback_wait)
    }

    async fn pause(&mut self, wait: Duration, waited: &mut Duration) -> Result<(), DispatchError> {
        if let Some(limit) = self.max_wait {
            if *waited + wait > limit {
                return Err(DispatchError::DeadlineExceeded {
                    waited: *waited,
                    limit,
                });
            }
        }

        let sleep = tokio::time::sleep(wait);
        tokio::pin!(sleep);

        loop {
            let outcome = match self.shutdown.as_mut() {
                None => {
                    (&mut sleep).await;
                    Pause::Elapsed
                }
                Some(rx) => tokio::select! {
                    _ = &mut sleep => Pause::Elapsed,
                    signal = rx.recv() => match signal {
                        Err(RecvError::Closed) => Pause::SignalClosed,
                        _ => Pause::Shutdown,
                    },
                },
            };

            match outcome {
                Pause::Elapsed => break,
                Pause::Shutdown => return Err(DispatchError::Cancelled),
                Pause::SignalClosed => self.shutdown = None,
            }
        }

        *waited += wait;
        Ok(())
    }
}
