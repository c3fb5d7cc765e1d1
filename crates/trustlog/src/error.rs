//! Error types for the chain of trust.

use trustlog_core::CoreError;
use trustlog_forge::ForgeError;
use trustlog_store::StoreError;
use thiserror::Error;

/// Errors that can occur in chain operations.
///
/// Rejected messages are not errors; see [`Rejection`].
#[derive(Debug, Error)]
pub enum ChainError {
    /// Encoding or decoding error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Key material or primitive failure.
    #[error("forge error: {0}")]
    Forge(#[from] ForgeError),

    /// Log backend error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Why the trust validator refused a revision.
///
/// The display string is the drop reason reported to listeners and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("missing header or digest")]
    MissingDigest,

    #[error("unknown signing key")]
    UnknownSigningKey,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("missing parent")]
    MissingParent,

    #[error("write to immutable object")]
    Immutable,

    #[error("unauthorized write")]
    Unauthorized,
}

/// Result type for chain operations.
pub type Result<T> = std::result::Result<T, ChainError>;
