//! # trustlog store
//!
//! The partitioned append log underneath the chain of trust.
//!
//! ## Key Types
//!
//! - [`PartitionedLog`] - async trait for log backends
//! - [`MemoryLog`] - RAM-backed implementation
//! - [`Bundle`] - one record: partition, dedup key, offset, payload
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use trustlog_core::PartitionKey;
//! use trustlog_store::{MemoryLog, PartitionedLog};
//!
//! async fn example() {
//!     let log = MemoryLog::new();
//!     let partition = PartitionKey::new("accounts", 0);
//!
//!     let bundle = log.write(&partition, "key-1", Bytes::from_static(b"raw")).await.unwrap();
//!     assert_eq!(bundle.offset, 1);
//!
//!     let all = log.read(&partition).await.unwrap();
//!     assert_eq!(all.len(), 1);
//! }
//! ```

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryLog;
pub use traits::{Bundle, PartitionedLog};
