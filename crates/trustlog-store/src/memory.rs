//! In-memory partitioned log.
//!
//! Reference semantics for the log, and the backend used by tests. Nothing
//! is persisted.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use trustlog_core::PartitionKey;

use crate::error::Result;
use crate::traits::{Bundle, PartitionedLog};

/// One partition: its offset counter and its records in offset order.
#[derive(Default)]
struct PartitionLog {
    last_offset: AtomicU64,
    bundles: RwLock<Vec<Bundle>>,
}

/// RAM-backed [`PartitionedLog`].
///
/// Writers to different partitions never contend. Writers to one partition
/// take that partition's write lock for the offset allocation and the
/// append together, so the offset sequence is gap-free and readers see
/// records in offset order.
#[derive(Default)]
pub struct MemoryLog {
    partitions: DashMap<PartitionKey, Arc<PartitionLog>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn partition(&self, key: &PartitionKey) -> Option<Arc<PartitionLog>> {
        self.partitions.get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn partition_or_create(&self, key: &PartitionKey) -> Arc<PartitionLog> {
        if let Some(existing) = self.partition(key) {
            return existing;
        }
        Arc::clone(self.partitions.entry(key.clone()).or_default().value())
    }

    /// Every partition that has been written to.
    pub fn partitions(&self) -> Vec<PartitionKey> {
        self.partitions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of records currently held for `partition`.
    pub fn len(&self, partition: &PartitionKey) -> usize {
        self.partition(partition).map_or(0, |log| log.bundles.read().len())
    }

    pub fn is_empty(&self, partition: &PartitionKey) -> bool {
        self.len(partition) == 0
    }

    /// The last offset handed out for `partition`, or 0.
    pub fn last_offset(&self, partition: &PartitionKey) -> u64 {
        self.partition(partition)
            .map_or(0, |log| log.last_offset.load(Ordering::Acquire))
    }
}

#[async_trait]
impl PartitionedLog for MemoryLog {
    async fn write(&self, partition: &PartitionKey, key: &str, payload: Bytes) -> Result<Bundle> {
        let log = self.partition_or_create(partition);
        let mut bundles = log.bundles.write();
        let offset = log.last_offset.fetch_add(1, Ordering::AcqRel) + 1;
        let bundle = Bundle {
            partition: partition.clone(),
            key: key.to_string(),
            offset,
            payload,
        };
        bundles.push(bundle.clone());
        Ok(bundle)
    }

    async fn read(&self, partition: &PartitionKey) -> Result<Vec<Bundle>> {
        Ok(self
            .partition(partition)
            .map(|log| log.bundles.read().clone())
            .unwrap_or_default())
    }

    async fn bundle_at(&self, partition: &PartitionKey, offset: u64) -> Result<Option<Bundle>> {
        let Some(log) = self.partition(partition) else {
            return Ok(None);
        };
        let bundles = log.bundles.read();
        Ok(bundles
            .binary_search_by_key(&offset, |b| b.offset)
            .ok()
            .map(|index| bundles[index].clone()))
    }

    async fn delete_many(&self, partition: &PartitionKey, keys: &HashSet<String>) -> Result<usize> {
        let Some(log) = self.partition(partition) else {
            return Ok(0);
        };
        let mut bundles = log.bundles.write();
        let before = bundles.len();
        bundles.retain(|b| !keys.contains(&b.key));
        let removed = before - bundles.len();
        tracing::debug!(partition = %partition, removed, "deleted records by key");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustlog_core::{ObjectId, PublicKeyMessage, RevisionBuilder, WireMessage};
    use trustlog_forge::{generate_key, seeded_rng, Profile};

    fn accounts() -> PartitionKey {
        PartitionKey::new("accounts", 0)
    }

    #[tokio::test]
    async fn test_offsets_start_at_one() {
        let log = MemoryLog::new();
        let a = log.write(&accounts(), "a", Bytes::from_static(b"1")).await.unwrap();
        let b = log.write(&accounts(), "b", Bytes::from_static(b"2")).await.unwrap();
        assert_eq!(a.offset, 1);
        assert_eq!(b.offset, 2);
        assert_eq!(log.last_offset(&accounts()), 2);
    }

    #[tokio::test]
    async fn test_partitions_are_independent() {
        let log = MemoryLog::new();
        let other = PartitionKey::new("accounts", 1);
        log.write(&accounts(), "a", Bytes::new()).await.unwrap();
        log.write(&accounts(), "b", Bytes::new()).await.unwrap();
        let first = log.write(&other, "a", Bytes::new()).await.unwrap();
        assert_eq!(first.offset, 1);
        assert_eq!(log.len(&accounts()), 2);
        assert_eq!(log.len(&other), 1);
        assert_eq!(log.partitions().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_partition_is_empty() {
        let log = MemoryLog::new();
        let missing = PartitionKey::new("nothing", 9);
        assert!(log.read(&missing).await.unwrap().is_empty());
        assert!(log.bundle_at(&missing, 1).await.unwrap().is_none());
        assert!(log.get_version(&missing, 1).await.unwrap().is_none());
        assert_eq!(log.delete_many(&missing, &HashSet::new()).await.unwrap(), 0);
        assert!(log.is_empty(&missing));
    }

    #[tokio::test]
    async fn test_read_is_a_snapshot() {
        let log = MemoryLog::new();
        log.write(&accounts(), "a", Bytes::new()).await.unwrap();
        let snapshot = log.read(&accounts()).await.unwrap();
        log.write(&accounts(), "b", Bytes::new()).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.read(&accounts()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_many_by_key() {
        let log = MemoryLog::new();
        for key in ["a", "b", "a", "c", "b"] {
            log.write(&accounts(), key, Bytes::from(key.to_string())).await.unwrap();
        }

        let keys: HashSet<String> = ["a".to_string()].into_iter().collect();
        assert_eq!(log.delete_many(&accounts(), &keys).await.unwrap(), 2);

        let remaining = log.read(&accounts()).await.unwrap();
        assert_eq!(
            remaining.iter().map(|b| b.key.as_str()).collect::<Vec<_>>(),
            vec!["b", "c", "b"]
        );
        assert_eq!(
            remaining.iter().map(|b| b.offset).collect::<Vec<_>>(),
            vec![2, 4, 5]
        );

        // Offsets are not reused after deletion.
        let next = log.write(&accounts(), "a", Bytes::new()).await.unwrap();
        assert_eq!(next.offset, 6);
    }

    #[tokio::test]
    async fn test_get_version_only_returns_data() {
        let log = MemoryLog::new();
        let key = generate_key(Profile::sign(64).unwrap(), &mut seeded_rng("store-test")).unwrap();
        let data = RevisionBuilder::new(ObjectId::random(), "Account")
            .body(b"x".to_vec())
            .sign(&key)
            .unwrap();

        let data_bundle = log
            .write_message(&accounts(), "data", &WireMessage::Data(data.clone()))
            .await
            .unwrap();
        let key_bundle = log
            .write_message(
                &accounts(),
                "key",
                &WireMessage::PublicKey(PublicKeyMessage::from_key(key.public_key())),
            )
            .await
            .unwrap();
        log.write(&accounts(), "junk", Bytes::from_static(b"\x07junk")).await.unwrap();

        assert_eq!(log.get_version(&accounts(), data_bundle.offset).await.unwrap(), Some(data));
        assert_eq!(log.get_version(&accounts(), key_bundle.offset).await.unwrap(), None);
        assert_eq!(log.get_version(&accounts(), 3).await.unwrap(), None);
        assert_eq!(log.get_version(&accounts(), 99).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_get_gap_free_offsets() {
        let log = Arc::new(MemoryLog::new());
        let tasks: Vec<_> = (0..8)
            .map(|w| {
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let mut offsets = Vec::new();
                    for i in 0..250 {
                        let bundle = log
                            .write(&accounts(), &format!("{w}-{i}"), Bytes::new())
                            .await
                            .unwrap();
                        offsets.push(bundle.offset);
                    }
                    offsets
                })
            })
            .collect();

        let mut all = Vec::new();
        for task in tasks {
            let offsets = task.await.unwrap();
            // Each writer sees its own offsets increase.
            assert!(offsets.windows(2).all(|w| w[0] < w[1]));
            all.extend(offsets);
        }
        all.sort_unstable();
        assert_eq!(all, (1..=2000).collect::<Vec<u64>>());

        let stored: Vec<u64> = log.read(&accounts()).await.unwrap().iter().map(|b| b.offset).collect();
        assert_eq!(stored, (1..=2000).collect::<Vec<u64>>());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_offsets_are_one_to_n(keys in proptest::collection::vec("[a-d]", 1..64)) {
                let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
                runtime.block_on(async {
                    let log = MemoryLog::new();
                    let mut offsets = Vec::new();
                    for key in &keys {
                        offsets.push(log.write(&accounts(), key, Bytes::new()).await.unwrap().offset);
                    }
                    prop_assert_eq!(offsets, (1..=keys.len() as u64).collect::<Vec<_>>());
                    Ok(())
                })?;
            }

            #[test]
            fn prop_delete_many_removes_exactly_matching(
                keys in proptest::collection::vec("[a-d]", 0..64),
                doomed in proptest::collection::hash_set("[a-d]", 0..3),
            ) {
                let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
                runtime.block_on(async {
                    let log = MemoryLog::new();
                    for key in &keys {
                        log.write(&accounts(), key, Bytes::new()).await.unwrap();
                    }
                    log.delete_many(&accounts(), &doomed).await.unwrap();
                    let remaining = log.read(&accounts()).await.unwrap();

                    let expected: Vec<&String> = keys.iter().filter(|k| !doomed.contains(*k)).collect();
                    prop_assert_eq!(remaining.len(), expected.len());
                    prop_assert!(remaining.iter().all(|b| !doomed.contains(&b.key)));
                    Ok(())
                })?;
            }
        }
    }
}
