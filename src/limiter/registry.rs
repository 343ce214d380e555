//! Scope-keyed registry of limit trackers
//!
//! Route trackers come from the static tier table and exist from the start.
//! Application and method trackers stay absent until a successful response
//! advertises their limits; after that they are only ever refreshed.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{ConfigError, RateLimitConfig};

use super::headers::{QuotaPair, ResponseQuota};
use super::window::LimitTracker;

/// Axis along which the remote enforces an independent quota
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeKey {
    /// Per platform / region
    Route(String),
    /// Per application key
    Application(String),
    /// Per endpoint
    Method(String),
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKey::Route(id) => write!(f, "route:{}", id),
            ScopeKey::Application(id) => write!(f, "application:{}", id),
            ScopeKey::Method(id) => write!(f, "method:{}", id),
        }
    }
}

/// The three scopes a single request counts against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSet {
    /// Platform the request is routed to
    pub route: String,
    /// Application key identifier
    pub application: String,
    /// Endpoint identifier
    pub method: String,
}

impl ScopeSet {
    /// Create a scope set
    pub fn new(
        route: impl Into<String>,
        application: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            route: route.into(),
            application: application.into(),
            method: method.into(),
        }
    }

    /// Route, application and method keys
    pub fn keys(&self) -> [ScopeKey; 3] {
        [
            ScopeKey::Route(self.route.clone()),
            ScopeKey::Application(self.application.clone()),
            ScopeKey::Method(self.method.clone()),
        ]
    }
}

/// Owner of every tracker used by one dispatcher
#[derive(Debug)]
pub struct RateLimitRegistry {
    route_limits: Vec<QuotaPair>,
    margin: f64,
    trackers: HashMap<ScopeKey, LimitTracker>,
}

impl RateLimitRegistry {
    /// Create a registry with the static route table
    pub fn new(route_limits: Vec<QuotaPair>, margin: f64) -> Self {
        Self {
            route_limits,
            margin,
            trackers: HashMap::new(),
        }
    }

    /// Create a registry from configuration, with route trackers for `routes`
    pub fn from_config(config: &RateLimitConfig, routes: &[String]) -> Result<Self, ConfigError> {
        let limits = config
            .route_limits()?
            .into_iter()
            .map(QuotaPair::from)
            .collect();
        Ok(Self::new(limits, config.margin).with_routes(routes.iter().cloned()))
    }

    /// Eagerly create route trackers
    pub fn with_routes<I, S>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for route in routes {
            self.ensure_route(&route.into());
        }
        self
    }

    /// Tracker for `key`, if one exists
    pub fn resolve(&self, key: &ScopeKey) -> Option<&LimitTracker> {
        self.trackers.get(key)
    }

    /// Number of trackers created so far
    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    /// True when no tracker exists
    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    fn ensure_route(&mut self, route: &str) -> &mut LimitTracker {
        let limits = &self.route_limits;
        let margin = self.margin;
        self.trackers
            .entry(ScopeKey::Route(route.to_string()))
            .or_insert_with(|| LimitTracker::new(limits, margin))
    }

    /// Largest wait over the scopes of a request
    ///
    /// Route trackers are created on demand from the static table; scopes
    /// without a tracker contribute nothing.
    pub fn wait_time(&mut self, scopes: &ScopeSet, now: Instant) -> Duration {
        self.ensure_route(&scopes.route);

        scopes
            .keys()
            .iter()
            .filter_map(|key| {
                let tracker = self.trackers.get_mut(key)?;
                let wait = tracker.wait_time_at(now);
                if !wait.is_zero() {
                    debug!(scope = %key, wait_ms = wait.as_millis() as u64, "Scope saturated");
                }
                Some(wait)
            })
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Record a call sent at `sent_at` against every scope
    ///
    /// Trackers for application and method scopes are created from the
    /// advertised limits on first sight and refreshed afterwards.
    pub fn record(&mut self, scopes: &ScopeSet, sent_at: Instant, quota: &ResponseQuota) {
        self.ensure_route(&scopes.route).add(sent_at);

        self.record_learned(
            ScopeKey::Application(scopes.application.clone()),
            sent_at,
            quota.app_limits.as_deref(),
            quota.app_counts.as_deref(),
        );
        self.record_learned(
            ScopeKey::Method(scopes.method.clone()),
            sent_at,
            quota.method_limits.as_deref(),
            quota.method_counts.as_deref(),
        );
    }

    fn record_learned(
        &mut self,
        key: ScopeKey,
        sent_at: Instant,
        limits: Option<&[QuotaPair]>,
        counts: Option<&[QuotaPair]>,
    ) {
        let tracker = match (self.trackers.get_mut(&key), limits) {
            (Some(tracker), Some(limits)) => {
                tracker.refresh(limits);
                tracker
            }
            (Some(tracker), None) => tracker,
            (None, Some(limits)) => {
                info!(scope = %key, windows = limits.len(), "Learned quota for scope");
                self.trackers
                    .entry(key)
                    .or_insert_with(|| LimitTracker::new(limits, self.margin))
            }
            (None, None) => return,
        };

        tracker.add(sent_at);
        if let Some(counts) = counts {
            tracker.reconcile(counts, sent_at);
        }
    }
}
