//! Sliding-window quota counters
//!
//! A [`LimitWindow`] remembers the instants of calls made inside its period.
//! A [`LimitTracker`] groups the windows enforced on one scope and answers how
//! long the caller must wait before the next call is admissible.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use super::headers::QuotaPair;

/// A single `(threshold, period)` sliding-window counter
#[derive(Debug, Clone)]
pub struct LimitWindow {
    period: Duration,
    threshold: u32,
    timestamps: VecDeque<Instant>,
}

impl LimitWindow {
    /// Create an empty window
    pub fn new(threshold: u32, period: Duration) -> Self {
        Self {
            period,
            threshold,
            timestamps: VecDeque::new(),
        }
    }

    /// Window length
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Raw threshold as advertised or configured
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Calls currently remembered (may include stale ones until the next purge)
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// True when no call is remembered
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Admission threshold after subtracting the safety margin
    ///
    /// `floor(threshold * (1 - margin)) - 1`, clamped at zero so an empty
    /// window always admits one call.
    pub fn effective_threshold(&self, margin: f64) -> i64 {
        ((f64::from(self.threshold) * (1.0 - margin)).floor() as i64 - 1).max(0)
    }

    /// Drop timestamps that left the window
    fn purge(&mut self, now: Instant) {
        while let Some(oldest) = self.timestamps.front() {
            if now.saturating_duration_since(*oldest) >= self.period {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Remember a call, keeping timestamps ordered
    fn record(&mut self, at: Instant) {
        match self.timestamps.back() {
            Some(last) if *last > at => {
                let pos = self.timestamps.partition_point(|t| *t <= at);
                self.timestamps.insert(pos, at);
            }
            _ => self.timestamps.push_back(at),
        }
    }

    /// Full period when saturated, zero otherwise
    fn wait_time(&mut self, now: Instant, margin: f64) -> Duration {
        self.purge(now);
        if self.timestamps.len() as i64 > self.effective_threshold(margin) {
            self.period
        } else {
            Duration::ZERO
        }
    }
}

/// All windows enforced on one rate-limit scope
#[derive(Debug, Clone)]
pub struct LimitTracker {
    windows: Vec<LimitWindow>,
    margin: f64,
}

impl LimitTracker {
    /// Build a tracker from `(threshold, period)` pairs
    pub fn new(limits: &[QuotaPair], margin: f64) -> Self {
        Self {
            windows: limits
                .iter()
                .map(|l| LimitWindow::new(l.value, l.period))
                .collect(),
            margin,
        }
    }

    /// Windows in definition order
    pub fn windows(&self) -> &[LimitWindow] {
        &self.windows
    }

    /// Safety margin applied to every window
    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// Wait required before the next call, measured from now
    pub fn wait_time(&mut self) -> Duration {
        self.wait_time_at(Instant::now())
    }

    /// Wait required before the next call, measured from `now`
    ///
    /// Purges every window first. The binding (largest) wait wins.
    pub fn wait_time_at(&mut self, now: Instant) -> Duration {
        let margin = self.margin;
        self.windows
            .iter_mut()
            .map(|w| w.wait_time(now, margin))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Record a call that was actually sent at `at`
    pub fn add(&mut self, at: Instant) {
        for window in &mut self.windows {
            window.record(at);
        }
    }

    /// Apply newly advertised limits without discarding recorded calls
    ///
    /// Known periods get the new threshold; unknown periods become new windows
    /// seeded with nothing.
    pub fn refresh(&mut self, limits: &[QuotaPair]) {
        for limit in limits {
            match self.windows.iter_mut().find(|w| w.period == limit.period) {
                Some(window) => window.threshold = limit.value,
                None => self
                    .windows
                    .push(LimitWindow::new(limit.value, limit.period)),
            }
        }
    }

    /// Catch up with usage reported by the server
    ///
    /// When the server counted more calls in a window than we did (another
    /// consumer shares the key), the gap is filled with calls at `at`.
    pub fn reconcile(&mut self, counts: &[QuotaPair], at: Instant) {
        for count in counts {
            if let Some(window) = self.windows.iter_mut().find(|w| w.period == count.period) {
                window.purge(at);
                let reported = count.value as usize;
                for _ in window.len()..reported {
                    window.record(at);
                }
            }
        }
    }
}
