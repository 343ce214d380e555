//! Multi-scope adaptive rate limiting
//!
//! Quotas are enforced independently per route, per application key and per
//! method. Route quotas are known up front; the others are learned from the
//! headers of successful responses.

pub mod headers;
pub mod registry;
pub mod window;

pub use headers::{parse_pairs, QuotaPair, QuotaProtocol, ResponseQuota};
pub use registry::{RateLimitRegistry, ScopeKey, ScopeSet};
pub use window::{LimitTracker, LimitWindow};
