//! # trustlog core
//!
//! The data model shared by the log and the chain of trust. This crate does
//! no I/O and holds no state.
//!
//! ## Key Types
//!
//! - [`PartitionKey`] - topic, index and kind of a shard
//! - [`RevisionHeader`] / [`DataMessage`] - one signed version of an object
//! - [`PublicKeyMessage`] - a key published to a partition
//! - [`SecurityCastle`] - a secret wrapped for a set of key holders
//! - [`WireMessage`] - the tagged union carried in log records
//!
//! ## Canonicalization
//!
//! Revision digests cover deterministic CBOR of the header. See [`canonical`].

pub mod canonical;
pub mod error;
pub mod message;
pub mod revision;
pub mod types;
pub mod validation;

pub use canonical::canonical_header_bytes;
pub use error::{CoreError, Result, ValidationError};
pub use message::{MessageType, PublicKeyMessage, SecurityCastle, WireMessage};
pub use revision::{compute_digest, DataDigest, DataMessage, RevisionBuilder, RevisionHeader};
pub use types::{now_millis, CastleId, MessageMeta, ObjectId, PartitionKey, PartitionKind, VersionId};
pub use validation::{validate_castle, validate_data, validate_message, validate_public_key};
