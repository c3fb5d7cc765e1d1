//! Identifier and partition types.
//!
//! All identifiers are newtypes so an object id cannot be passed where a
//! version id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// A fresh random id.
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &hex::encode(self.0.as_bytes())[..8])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Stable identity of a stored object across all of its revisions.
    ObjectId
);

uuid_id!(
    /// Identity of one revision of an object.
    VersionId
);

uuid_id!(
    /// Identity of a security castle.
    CastleId
);

/// What a partition holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PartitionKind {
    /// Object revisions under a chain of trust.
    #[default]
    Data,
    /// Plain ordered records.
    Log,
}

/// Identifies a shard: topic, index and kind.
///
/// Renders as `topic:index` for data partitions and `topic:index:log` for
/// log partitions. The index is always numeric, so the rendering parses back
/// unambiguously even when the topic itself contains `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKey {
    pub topic: String,
    pub index: u32,
    pub kind: PartitionKind,
}

impl PartitionKey {
    /// A data partition.
    pub fn new(topic: impl Into<String>, index: u32) -> Self {
        Self {
            topic: topic.into(),
            index,
            kind: PartitionKind::Data,
        }
    }

    pub fn with_kind(mut self, kind: PartitionKind) -> Self {
        self.kind = kind;
        self
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PartitionKind::Data => write!(f, "{}:{}", self.topic, self.index),
            PartitionKind::Log => write!(f, "{}:{}:log", self.topic, self.index),
        }
    }
}

impl FromStr for PartitionKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || CoreError::DecodingError(format!("invalid partition key: {s}"));
        let (rest, kind) = match s.strip_suffix(":log") {
            Some(rest) => (rest, PartitionKind::Log),
            None => (s, PartitionKind::Data),
        };
        let (topic, index) = rest.rsplit_once(':').ok_or_else(bad)?;
        let index = index.parse::<u32>().map_err(|_| bad())?;
        if topic.is_empty() {
            return Err(bad());
        }
        Ok(Self::new(topic, index).with_kind(kind))
    }
}

/// Delivery metadata attached to a record by the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMeta {
    /// Partition index the record arrived on.
    pub partition: u32,
    /// Offset within the partition. Zero for records that never went
    /// through the log.
    pub offset: u64,
    /// Delivery time, Unix milliseconds.
    pub timestamp: i64,
}

impl MessageMeta {
    pub fn new(partition: u32, offset: u64, timestamp: i64) -> Self {
        Self {
            partition,
            offset,
            timestamp,
        }
    }

    /// Metadata for a locally produced record, stamped with the current time.
    pub fn local(partition: u32) -> Self {
        Self::new(partition, 0, now_millis())
    }
}

/// Current Unix time in milliseconds.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
