//! ranked-mirror - A quota-aware mirror of ranked ladder standings
//!
//! This crate pulls top-of-ladder pages from a rate-limited ranked API,
//! merges every player into a local store with per-queue history and
//! persists the result as CSV. All remote calls go through a dispatcher that
//! learns the server's quotas from response headers and never sends a
//! request that would exceed them.

pub mod api;
pub mod config;
pub mod error;
pub mod limiter;
pub mod logging;
pub mod models;
pub mod store;
pub mod sync;
