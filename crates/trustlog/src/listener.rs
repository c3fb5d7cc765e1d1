//! Collaborators the chain calls out to.

use std::collections::HashMap;

use trustlog_core::{DataMessage, MessageMeta, MessageType, ObjectId, PartitionKey};
use trustlog_forge::PublicKey;

/// A rejected record, as reported to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropEvent {
    pub partition: PartitionKey,
    /// Log offset, when the record came through the log.
    pub offset: Option<u64>,
    pub reason: String,
    pub id: Option<ObjectId>,
    pub payload_type: Option<String>,
    pub message_type: Option<MessageType>,
}

/// Observer of committed writes.
///
/// Called synchronously after each commit, outside any chain lock.
/// Implementations must not block; hand work off if it is slow.
pub trait ChainListener: Send + Sync {
    fn feed(&self, partition: &PartitionKey, data: &DataMessage, meta: &MessageMeta);

    fn dropped(&self, _event: &DropEvent) {}
}

/// Source of writes that are saved but not yet committed, such as the
/// other members of a transaction being validated together.
pub trait StagingManager: Send + Sync {
    fn find_public_key(&self, partition: &PartitionKey, hash: &str) -> Option<PublicKey>;

    fn saved_data(&self, partition: &PartitionKey) -> HashMap<ObjectId, DataMessage>;

    /// Hash of the staged signing key that owns `alias`. Consulted only for
    /// aliases the chain has not bound.
    fn find_alias(&self, _partition: &PartitionKey, _alias: &str) -> Option<String> {
        None
    }
}
