//! # trustlog
//!
//! A partitioned, self-verifying data store. Every record in a partition
//! is signed; each node replays the partition through a chain of trust and
//! keeps only the revisions whose signatures, parents and write permissions
//! check out.
//!
//! ## Overview
//!
//! - **Log**: ordered, append-only records per partition ([`store`])
//! - **Revisions**: signed versions of objects, chained by parent ([`core`])
//! - **Chain of trust**: per-partition validation and trusted state ([`TrustChain`])
//! - **Keys**: pooled key generation and the crypto primitives ([`forge`])
//!
//! ## Key Types
//!
//! - [`TrustChain`] - trusted state of one partition
//! - [`RevisionChain`] - committed history of one object
//! - [`TrustValidator`] - the validation pipeline, over injected lookups
//! - [`ChainListener`] / [`StagingManager`] - collaborators the chain calls out to
//!
//! ## Usage
//!
//! ```rust,no_run
//! use trustlog::{ChainConfig, TrustChain};
//! use trustlog::core::{ObjectId, PartitionKey, RevisionBuilder, WireMessage};
//! use trustlog::forge::{ForgeConfig, KeyForge};
//! use trustlog::store::MemoryLog;
//!
//! async fn example() {
//!     let forge = KeyForge::new(ForgeConfig::default());
//!     let _refill = forge.spawn_refill();
//!
//!     let log = MemoryLog::new();
//!     let chain = TrustChain::new(PartitionKey::new("accounts", 0), ChainConfig::default()).unwrap();
//!
//!     // Objects with no write restriction accept the public write key.
//!     let public = forge.trust_of_public_write().unwrap();
//!     let revision = RevisionBuilder::new(ObjectId::random(), "Account")
//!         .body(b"balance=10".to_vec())
//!         .sign(public)
//!         .unwrap();
//!
//!     let accepted = chain
//!         .write_through(&log, "account-1", &WireMessage::Data(revision))
//!         .await
//!         .unwrap();
//!     assert!(accepted);
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `trustlog::core` - data model and wire codec
//! - `trustlog::forge` - keys and cryptography
//! - `trustlog::store` - the partitioned log

pub mod chain;
pub mod container;
pub mod error;
pub mod listener;
pub mod validator;

// Re-export component crates
pub use trustlog_core as core;
pub use trustlog_forge as forge;
pub use trustlog_store as store;

pub use chain::{ChainConfig, TrustChain};
pub use container::{Revision, RevisionChain};
pub use error::{ChainError, Rejection, Result};
pub use listener::{ChainListener, DropEvent, StagingManager};
pub use validator::TrustValidator;

// Re-export commonly used types
pub use trustlog_core::{
    DataMessage, MessageMeta, ObjectId, PartitionKey, PublicKeyMessage, RevisionBuilder, RevisionHeader,
    SecurityCastle, WireMessage,
};
pub use trustlog_forge::{KeyForge, PrivateKey, PublicKey};
