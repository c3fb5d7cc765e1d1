//! The partitioned log: ordered, append-only, per-partition record storage.
//!
//! The log knows nothing about trust. It assigns offsets and hands bytes
//! back; deciding what a record means is the chain's job.

use std::collections::HashSet;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use trustlog_core::{CoreError, DataMessage, PartitionKey, WireMessage};

use crate::error::Result;

/// One record in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub partition: PartitionKey,
    /// Dedup key; [`PartitionedLog::delete_many`] removes by this key.
    pub key: String,
    /// Position in the partition, starting at 1.
    pub offset: u64,
    pub payload: Bytes,
}

impl Bundle {
    /// Decode the payload as a wire message.
    pub fn decode(&self) -> std::result::Result<WireMessage, CoreError> {
        WireMessage::decode(&self.payload)
    }
}

/// Async interface to a partitioned append log.
///
/// # Offsets
///
/// Offsets within one partition start at 1, are strictly increasing in
/// write order, and are never reused, even after deletion. Partitions are
/// independent; nothing is ordered across them.
///
/// # Not found
///
/// Unknown partitions and offsets are empty results, never errors.
#[async_trait]
pub trait PartitionedLog: Send + Sync {
    /// Append a record and return it with its assigned offset.
    async fn write(&self, partition: &PartitionKey, key: &str, payload: Bytes) -> Result<Bundle>;

    /// Snapshot of every record in the partition, in write order.
    async fn read(&self, partition: &PartitionKey) -> Result<Vec<Bundle>>;

    /// The record at exactly `offset`.
    async fn bundle_at(&self, partition: &PartitionKey, offset: u64) -> Result<Option<Bundle>>;

    /// Remove every record whose dedup key is in `keys`. Returns how many
    /// records were removed.
    async fn delete_many(&self, partition: &PartitionKey, keys: &HashSet<String>) -> Result<usize>;

    /// The data revision stored at `offset`, if that record is one.
    async fn get_version(&self, partition: &PartitionKey, offset: u64) -> Result<Option<DataMessage>> {
        Ok(self
            .bundle_at(partition, offset)
            .await?
            .and_then(|bundle| match bundle.decode() {
                Ok(WireMessage::Data(data)) => Some(data),
                _ => None,
            }))
    }

    /// Encode and append a wire message.
    async fn write_message(&self, partition: &PartitionKey, key: &str, message: &WireMessage) -> Result<Bundle> {
        let payload = Bytes::from(message.encode()?);
        self.write(partition, key, payload).await
    }
}
