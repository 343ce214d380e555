//! Application error types for ranked-mirror
//!
//! This module defines common error types used throughout the application.
//! All error types use `thiserror` for ergonomic error handling.

use std::time::Duration;

use thiserror::Error;

/// Failures raised before any response was received
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    /// Request timed out
    #[error("Network timeout")]
    Timeout,

    /// Connection refused by the remote host
    #[error("Connection refused")]
    ConnectionRefused,

    /// Any other network failure
    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::ConnectionRefused
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

/// Quota metadata problems on a successful response
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QuotaHeaderError {
    /// A required quota header is absent
    #[error("Missing quota header: {0}")]
    Missing(String),

    /// A quota header is present but cannot be parsed
    #[error("Malformed quota header {header}: {value:?}")]
    Malformed {
        /// Header name
        header: String,
        /// Raw header value
        value: String,
    },
}

/// Errors surfaced by the request dispatcher
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    /// The request could not be sent
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server sent unusable quota metadata
    #[error("Quota header error: {0}")]
    QuotaHeader(#[from] QuotaHeaderError),

    /// Waiting for quota would run past the configured deadline
    #[error("Quota wait deadline exceeded after {waited:?} (limit {limit:?})")]
    DeadlineExceeded {
        /// Time already spent waiting
        waited: Duration,
        /// Configured deadline
        limit: Duration,
    },

    /// A shutdown signal interrupted the quota wait
    #[error("Quota wait cancelled")]
    Cancelled,
}

/// Synchronization-related errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    /// Network timeout
    #[error("Network timeout")]
    NetworkTimeout,

    /// Connection refused
    #[error("Connection refused")]
    ConnectionRefused,

    /// Server error
    #[error("Server error: HTTP {0}")]
    ServerError(u16),

    /// Invalid data received
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Resource not found
    #[error("Resource not found")]
    NotFound,

    /// Unauthorized
    #[error("Unauthorized")]
    Unauthorized,

    /// Generic network error
    #[error("Network error: {0}")]
    Network(String),

    /// Quota metadata could not be tracked
    #[error("Quota header error: {0}")]
    QuotaHeader(QuotaHeaderError),

    /// The quota wait was aborted by deadline or shutdown
    #[error("Quota wait aborted: {0}")]
    WaitAborted(String),

    /// Saving or loading the mirror failed
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl From<DispatchError> for SyncError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Transport(TransportError::Timeout) => SyncError::NetworkTimeout,
            DispatchError::Transport(TransportError::ConnectionRefused) => {
                SyncError::ConnectionRefused
            }
            DispatchError::Transport(TransportError::Network(msg)) => SyncError::Network(msg),
            DispatchError::QuotaHeader(err) => SyncError::QuotaHeader(err),
            other @ (DispatchError::DeadlineExceeded { .. } | DispatchError::Cancelled) => {
                SyncError::WaitAborted(other.to_string())
            }
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        SyncError::Persistence(e.to_string())
    }
}

/// Entity store persistence errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error while reading or writing the store file
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding or decoding error
    #[error("Store CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Nested history column could not be encoded or decoded
    #[error("Store history encoding error: {0}")]
    History(#[from] serde_json::Error),

    /// Structurally invalid store file
    #[error("Malformed store file: {0}")]
    Malformed(String),
}

/// Application-level error type
///
/// Aggregates the domain-specific error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Sync error
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Trait for determining if an error is retryable
pub trait RetryableError {
    /// Returns true if the error is retryable
    fn is_retryable(&self) -> bool;
}

impl RetryableError for SyncError {
    fn is_retryable(&self) -> bool {
        match self {
            SyncError::NetworkTimeout => true,
            SyncError::ConnectionRefused => true,
            SyncError::ServerError(code) if *code >= 500 => true,
            SyncError::Network(_) => true,

            SyncError::ServerError(_) => false,
            SyncError::InvalidData(_) => false,
            SyncError::NotFound => false,
            SyncError::Unauthorized => false,
            SyncError::QuotaHeader(_) => false,
            SyncError::WaitAborted(_) => false,
            SyncError::Persistence(_) => false,
        }
    }
}
