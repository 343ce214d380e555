//! Request dispatch and ladder synchronization
//!
//! # Components
//!
//! - [`http_client`]: transport seam and the `reqwest` implementation
//! - [`dispatcher`]: quota-aware request dispatcher
//! - [`retry`]: exponential backoff for transient page failures
//! - [`driver`]: fetch, merge and persist across queues and shards
//! - [`scheduler`]: periodic runs with jitter and graceful shutdown
//!
//! # Example
//!
//! ```ignore
//! use ranked_mirror::api::RiotApi;
//! use ranked_mirror::config::Config;
//! use ranked_mirror::sync::SyncDriver;
//!
//! let config = Config::from_file("config.yaml")?;
//! let api = RiotApi::from_config(&config, None)?;
//! let mut driver = SyncDriver::from_config(api, &config);
//! let summary = driver.run().await?;
//! ```

pub mod dispatcher;
pub mod driver;
pub mod http_client;
pub mod retry;
pub mod scheduler;

pub use dispatcher::RequestDispatcher;
pub use driver::{LadderSync, SyncDriver};
pub use http_client::{ApiRequest, ApiResponse, ReqwestTransport, Transport};
pub use retry::RetryManager;
pub use scheduler::{SchedulerConfig, SyncResult, SyncScheduler, Syncable};
