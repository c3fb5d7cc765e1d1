//! Error types for trustlog core.

use thiserror::Error;
use trustlog_forge::ForgeError;

/// Errors raised while building, encoding or decoding messages.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unhandled message type: {0}")]
    UnknownMessageType(u8),

    #[error("missing header")]
    MissingHeader,

    #[error("empty record")]
    EmptyRecord,

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error(transparent)]
    Forge(#[from] ForgeError),
}

/// Structural problems found by the pre-trust checks.
///
/// The `Display` text is used verbatim as a drop reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing payload type")]
    MissingPayloadType,

    #[error("missing signing key hash")]
    MissingSigningKey,

    #[error("missing signature")]
    MissingSignature,

    #[error("digest has the wrong length")]
    BadDigestLength,

    #[error("revision cannot be its own parent")]
    SelfParent,

    #[error("encrypted body without an encryption key hash")]
    MissingEncryptKey,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("public key hash mismatch")]
    KeyHashMismatch,

    #[error("alias already bound to another key: {0}")]
    AliasTaken(String),

    #[error("castle has no holders")]
    EmptyCastle,

    #[error("missing id")]
    MissingId,
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
