//! Error types for the key forge.

use thiserror::Error;

/// Errors raised by key generation and cryptographic primitives.
///
/// These are fatal for the operation that raised them. Signature and
/// decryption failures that happen while validating untrusted input are
/// reported as booleans by the callers, never through this type.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// A security level with no parameter profile was requested.
    #[error("unsupported security level: {0}")]
    UnsupportedLevel(u32),

    /// Every candidate key pair failed its self-test.
    #[error("key generation failed the self-test {attempts} times")]
    KeyGenExhausted { attempts: u32 },

    /// The underlying primitive rejected its parameters.
    #[error("cryptographic primitive unavailable: {0}")]
    PrimitiveUnavailable(String),

    /// Key bytes could not be interpreted.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Decryption error (bad tag, bad padding, truncated input).
    #[error("decryption error: {0}")]
    DecryptionError(String),

    /// Text encoding error (base64, utf-8).
    #[error("encoding error: {0}")]
    EncodingError(String),
}

/// Result type for forge operations.
pub type Result<T> = std::result::Result<T, ForgeError>;
