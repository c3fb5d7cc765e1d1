//! Error types for the log.

use thiserror::Error;
use trustlog_core::CoreError;

/// Errors from a log backend.
///
/// The in-memory log never fails; these exist for transport-backed logs.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing transport is unavailable.
    #[error("transport error: {0}")]
    Transport(String),

    /// A record could not be encoded for writing.
    #[error("serialization error: {0}")]
    Serialization(#[from] CoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for log operations.
pub type Result<T> = std::result::Result<T, StoreError>;
