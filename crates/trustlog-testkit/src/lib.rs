//! # trustlog testkit
//!
//! Testing utilities for trustlog.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: canonical header bytes and digests that every node must reproduce
//! - **Generators**: Proptest strategies for revisions and keys
//! - **Fixtures**: a chain over a memory log, with recording listener and staging manager
//!
//! ## Golden Vectors
//!
//! ```rust
//! use trustlog_testkit::vectors::verify_all_vectors;
//!
//! for (name, header_ok, digest_ok) in verify_all_vectors() {
//!     assert!(header_ok && digest_ok, "{name}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use trustlog_testkit::generators::{revision_from_params, RevisionParams};
//!
//! proptest! {
//!     #[test]
//!     fn digest_matches(params: RevisionParams) {
//!         let key = trustlog_forge::public_write_key().unwrap();
//!         prop_assert!(revision_from_params(&params, key).digest_matches());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use trustlog_core::ObjectId;
//! use trustlog_testkit::fixtures::{Account, TestFixture};
//!
//! async fn example() {
//!     let fixture = TestFixture::new();
//!     let id = ObjectId::random();
//!     let msg = fixture.account(id, &Account::new("alice", 10), fixture.public_writer());
//!     assert!(fixture.submit(msg).await);
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{partition_fixtures, Account, MemoryStaging, RecordingListener, TestFixture, ACCOUNT};
pub use generators::{revision_from_params, RevisionParams};
pub use vectors::{all_vectors, header_from_vector, verify_all_vectors, GoldenVector};
