//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a forge, a memory log and a
//! chain over one partition, with a listener that records everything the
//! chain reports.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use trustlog::{ChainConfig, ChainListener, DropEvent, StagingManager, TrustChain};
use trustlog_core::{
    CastleId, DataMessage, MessageMeta, ObjectId, PartitionKey, PublicKeyMessage, RevisionBuilder, WireMessage,
};
use trustlog_forge::{public_write_key, ForgeConfig, KeyForge, KeyUse, PrivateKey, PublicKey};
use trustlog_store::{MemoryLog, PartitionedLog};

/// Payload type used by the account helpers.
pub const ACCOUNT: &str = "Account";

/// JSON body of an account revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub owner: String,
    pub balance: i64,
}

impl Account {
    pub fn new(owner: &str, balance: i64) -> Self {
        Self {
            owner: owner.to_string(),
            balance,
        }
    }

    pub fn to_body(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("account serializes")
    }

    pub fn from_body(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }
}

/// Listener that keeps every commit and drop it sees.
#[derive(Default)]
pub struct RecordingListener {
    fed: Mutex<Vec<(ObjectId, MessageMeta)>>,
    drops: Mutex<Vec<DropEvent>>,
}

impl RecordingListener {
    pub fn fed(&self) -> Vec<(ObjectId, MessageMeta)> {
        self.fed.lock().clone()
    }

    pub fn drops(&self) -> Vec<DropEvent> {
        self.drops.lock().clone()
    }

    pub fn drop_reasons(&self) -> Vec<String> {
        self.drops.lock().iter().map(|d| d.reason.clone()).collect()
    }
}

impl ChainListener for RecordingListener {
    fn feed(&self, _partition: &PartitionKey, data: &DataMessage, meta: &MessageMeta) {
        self.fed.lock().push((data.id(), *meta));
    }

    fn dropped(&self, event: &DropEvent) {
        self.drops.lock().push(event.clone());
    }
}

/// Staging manager backed by maps, for batch validation tests.
#[derive(Default)]
pub struct MemoryStaging {
    keys: DashMap<String, PublicKey>,
    data: DashMap<ObjectId, DataMessage>,
}

impl MemoryStaging {
    pub fn stage_key(&self, key: &PublicKey) {
        self.keys.insert(key.hash().to_string(), key.clone());
    }

    pub fn stage_data(&self, data: DataMessage) {
        self.data.insert(data.id(), data);
    }

    pub fn clear(&self) {
        self.keys.clear();
        self.data.clear();
    }
}

impl StagingManager for MemoryStaging {
    fn find_public_key(&self, _partition: &PartitionKey, hash: &str) -> Option<PublicKey> {
        self.keys.get(hash).map(|entry| entry.value().clone())
    }

    fn saved_data(&self, _partition: &PartitionKey) -> HashMap<ObjectId, DataMessage> {
        self.data
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    fn find_alias(&self, _partition: &PartitionKey, alias: &str) -> Option<String> {
        self.keys
            .iter()
            .find(|entry| entry.explicit_alias() == Some(alias) && entry.key_use() == Some(KeyUse::Sign))
            .map(|entry| entry.key().clone())
    }
}

/// A chain over one partition of a memory log.
pub struct TestFixture {
    pub forge: KeyForge,
    pub log: MemoryLog,
    pub chain: TrustChain,
    pub listener: Arc<RecordingListener>,
    pub staging: Arc<MemoryStaging>,
}

impl TestFixture {
    /// Partition `accounts:0` with default configuration.
    pub fn new() -> Self {
        Self::with_config(PartitionKey::new("accounts", 0), ChainConfig::default())
    }

    pub fn with_config(partition: PartitionKey, config: ChainConfig) -> Self {
        let listener = Arc::new(RecordingListener::default());
        let staging = Arc::new(MemoryStaging::default());
        let chain = TrustChain::new(partition, config)
            .expect("anchor keys generate")
            .with_listener(listener.clone())
            .with_staging(staging.clone());
        Self {
            forge: KeyForge::new(ForgeConfig::no_pregen()),
            log: MemoryLog::new(),
            chain,
            listener,
            staging,
        }
    }

    /// Same fixture without extra validation.
    pub fn lenient() -> Self {
        Self::with_config(
            PartitionKey::new("accounts", 0),
            ChainConfig {
                extra_validation: false,
            },
        )
    }

    pub fn partition(&self) -> &PartitionKey {
        self.chain.partition_key()
    }

    /// The public write anchor.
    pub fn public_writer(&self) -> &'static PrivateKey {
        public_write_key().expect("anchor keys generate")
    }

    /// A signing key derived from `alias`, labelled with it.
    pub fn signer(&self, alias: &str) -> PrivateKey {
        self.forge
            .gen_sign_key_from_seed(64, alias, Some(alias))
            .expect("seeded key generates")
    }

    /// Publish `key` through the log. Returns whether the chain took it.
    pub async fn publish(&self, key: &PrivateKey) -> bool {
        let msg = WireMessage::PublicKey(PublicKeyMessage::from_key(key.public_key()));
        self.submit_keyed(key.hash(), msg).await
    }

    /// Write a message through the log into the chain, keyed by what it is
    /// about.
    pub async fn submit(&self, msg: impl Into<WireMessage>) -> bool {
        let msg = msg.into();
        let key = match &msg {
            WireMessage::Data(data) => data.id().to_string(),
            WireMessage::PublicKey(key) => key.hash().to_string(),
            WireMessage::SecurityCastle(castle) => castle.id.map(|id| id.to_string()).unwrap_or_default(),
        };
        self.submit_keyed(&key, msg).await
    }

    async fn submit_keyed(&self, key: &str, msg: WireMessage) -> bool {
        self.chain
            .write_through(&self.log, key, &msg)
            .await
            .expect("memory log writes")
    }

    /// Write raw bytes through the log into the chain.
    pub async fn submit_raw(&self, key: &str, raw: &[u8]) -> bool {
        let bundle = self
            .log
            .write(self.partition(), key, bytes::Bytes::copy_from_slice(raw))
            .await
            .expect("memory log writes");
        self.chain
            .receive(&bundle.payload, MessageMeta::new(self.partition().index, bundle.offset, 0))
    }

    /// A signed account revision.
    pub fn account(&self, id: ObjectId, account: &Account, signer: &PrivateKey) -> DataMessage {
        RevisionBuilder::new(id, ACCOUNT)
            .body(account.to_body())
            .sign(signer)
            .expect("revision signs")
    }

    /// A new random castle id.
    pub fn castle_id(&self) -> CastleId {
        CastleId::random()
    }

    /// Offsets of the object's committed history.
    pub fn offsets(&self, id: &ObjectId) -> Vec<u64> {
        self.chain.get_history(id).iter().map(|m| m.offset).collect()
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixtures for several partitions of one topic, each with its own log.
pub fn partition_fixtures(topic: &str, count: u32) -> Vec<TestFixture> {
    (0..count)
        .map(|index| TestFixture::with_config(PartitionKey::new(topic, index), ChainConfig::default()))
        .collect()
}
