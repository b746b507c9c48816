//! Shared error type across data API crates.

use thiserror::Error;

/// Shared result type.
pub type Result<T> = std::result::Result<T, DataApiError>;

/// Unified error type used by core and metrics.
#[derive(Debug, Error)]
pub enum DataApiError {
    /// Invalid or unreadable configuration.
    #[error("config: {0}")]
    Config(String),
    /// A collector declared an invalid or conflicting metric.
    #[error("metric registration failed for {name}: {reason}")]
    Registration { name: String, reason: String },
    /// The blob metadata store could not answer a query.
    #[error("metadata store: {0}")]
    Store(String),
    #[error("internal: {0}")]
    Internal(String),
}
