//! The chain of trust for one partition.
//!
//! A [`TrustChain`] turns the raw records of a partition into trusted state.
//! Records arrive through [`TrustChain::receive`]; each is decoded, checked,
//! and either committed or dropped. Dropping is normal: the caller gets
//! `false`, listeners get a [`DropEvent`], and nothing else changes.
//!
//! Per object the chain moves Unknown → Tracked (anchor only) → Live
//! (committed payload) → Immutable. Only a successful promotion moves it.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, warn};
use trustlog_core::{
    validate_castle, validate_data, validate_public_key, CastleId, CoreError, DataMessage, MessageMeta,
    MessageType, ObjectId, PartitionKey, PublicKeyMessage, RevisionHeader, SecurityCastle, ValidationError,
    WireMessage,
};
use trustlog_forge::{public_read_key, public_write_key, KeyUse, PublicKey};
use trustlog_store::PartitionedLog;

use crate::container::RevisionChain;
use crate::error::{Rejection, Result};
use crate::listener::{ChainListener, DropEvent, StagingManager};
use crate::validator::TrustValidator;

/// Configuration for a chain.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Run structural checks on every received record before trust
    /// validation.
    pub extra_validation: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self { extra_validation: true }
    }
}

/// Trusted state of one partition.
pub struct TrustChain {
    partition: PartitionKey,
    config: ChainConfig,
    public_write_hash: String,
    root_of_trust: DashMap<ObjectId, RevisionHeader>,
    chain_of_trust: DashMap<ObjectId, Arc<RevisionChain>>,
    castles: DashMap<CastleId, SecurityCastle>,
    public_keys: DashMap<String, PublicKey>,
    /// Alias to the hash of the first signing key that claimed it.
    aliases: DashMap<String, String>,
    listeners: RwLock<Vec<Arc<dyn ChainListener>>>,
    staging: Option<Arc<dyn StagingManager>>,
}

impl TrustChain {
    /// Create an empty chain seeded with the public read and write keys.
    pub fn new(partition: PartitionKey, config: ChainConfig) -> Result<Self> {
        let write = public_write_key()?;
        let read = public_read_key()?;

        let chain = Self {
            partition,
            config,
            public_write_hash: write.hash().to_string(),
            root_of_trust: DashMap::new(),
            chain_of_trust: DashMap::new(),
            castles: DashMap::new(),
            public_keys: DashMap::new(),
            aliases: DashMap::new(),
            listeners: RwLock::new(Vec::new()),
            staging: None,
        };
        for key in [write, read] {
            chain
                .public_keys
                .insert(key.hash().to_string(), key.public_key().clone());
        }
        if let Some(alias) = write.public_key().explicit_alias() {
            chain.aliases.insert(alias.to_string(), write.hash().to_string());
        }
        Ok(chain)
    }

    pub fn with_staging(mut self, staging: Arc<dyn StagingManager>) -> Self {
        self.staging = Some(staging);
        self
    }

    pub fn with_listener(self, listener: Arc<dyn ChainListener>) -> Self {
        self.add_listener(listener);
        self
    }

    pub fn add_listener(&self, listener: Arc<dyn ChainListener>) {
        self.listeners.write().push(listener);
    }

    pub fn partition_key(&self) -> &PartitionKey {
        &self.partition
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Trusted writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a public key under the hash of its bytes. A repeated key
    /// replaces the earlier entry.
    ///
    /// The first signing key to claim an alias owns it. A later key
    /// claiming the same alias is refused.
    pub fn add_trust_key(&self, key: &PublicKeyMessage) -> std::result::Result<(), ValidationError> {
        if self.config.extra_validation {
            validate_public_key(key)?;
        }
        let trusted = PublicKey::new(key.key.bytes().to_vec(), key.key.explicit_alias().map(str::to_string));

        if let (Some(alias), Some(KeyUse::Sign)) = (trusted.explicit_alias(), trusted.key_use()) {
            match self.aliases.entry(alias.to_string()) {
                Entry::Occupied(owner) if owner.get().as_str() != trusted.hash() => {
                    return Err(ValidationError::AliasTaken(alias.to_string()));
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(entry) => {
                    entry.insert(trusted.hash().to_string());
                }
            }
        }

        debug!(partition = %self.partition, hash = trusted.hash(), alias = trusted.alias(), "trusted key");
        self.public_keys.insert(trusted.hash().to_string(), trusted);
        Ok(())
    }

    /// Append a revision with no authorization check, then notify
    /// listeners.
    pub fn add_trust_data(&self, data: DataMessage, meta: MessageMeta) {
        self.append(data.clone(), meta);
        debug!(
            partition = %self.partition,
            id = %data.id(),
            payload_type = %data.header.payload_type,
            offset = meta.offset,
            "trusted data"
        );
        self.notify(&data, &meta);
    }

    /// Register a castle by id.
    pub fn add_trust_castle(&self, castle: SecurityCastle) -> std::result::Result<(), ValidationError> {
        let id = castle.id.ok_or(ValidationError::MissingId)?;
        debug!(partition = %self.partition, castle = %id, holders = castle.lookup.len(), "trusted castle");
        self.castles.insert(id, castle);
        Ok(())
    }

    /// Anchor an object: its write set and immutability now govern the first
    /// revision. The object becomes tracked but has no payload.
    pub fn add_root_of_trust(&self, header: RevisionHeader, meta: MessageMeta) {
        let id = header.id;
        debug!(partition = %self.partition, id = %id, "root of trust");
        self.root_of_trust.insert(id, header.clone());
        self.append(DataMessage::header_only(header), meta);
    }

    fn append(&self, data: DataMessage, meta: MessageMeta) {
        match self.chain_of_trust.entry(data.id()) {
            Entry::Occupied(mut entry) => Arc::make_mut(entry.get_mut()).push(data, meta),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(RevisionChain::new(self.partition.clone(), data, meta)));
            }
        }
    }

    fn notify(&self, data: &DataMessage, meta: &MessageMeta) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.feed(&self.partition, data, meta);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Receiving
    // ─────────────────────────────────────────────────────────────────────────

    /// Decode and process one record. Returns whether it was accepted.
    pub fn receive(&self, raw: &[u8], meta: MessageMeta) -> bool {
        debug!(partition = %self.partition, offset = meta.offset, len = raw.len(), "receive");
        match WireMessage::decode(raw) {
            Ok(msg) => self.receive_message(msg, meta),
            Err(err) => {
                let reason = match err {
                    CoreError::UnknownMessageType(_) | CoreError::EmptyRecord => {
                        "unhandled message type".to_string()
                    }
                    CoreError::MissingHeader => Rejection::MissingDigest.to_string(),
                    other => format!("malformed message: {other}"),
                };
                let message_type = raw.first().copied().and_then(MessageType::from_u8);
                self.reject(&meta, reason, None, message_type);
                false
            }
        }
    }

    /// Process an already decoded message.
    pub fn receive_message(&self, msg: WireMessage, meta: MessageMeta) -> bool {
        match msg {
            WireMessage::Data(data) => self.process_data(data, meta),
            WireMessage::PublicKey(key) => match self.add_trust_key(&key) {
                Ok(()) => true,
                Err(err) => {
                    self.reject(&meta, err.to_string(), None, Some(MessageType::PublicKey));
                    false
                }
            },
            WireMessage::SecurityCastle(castle) => self.process_castle(castle, meta),
        }
    }

    fn process_data(&self, data: DataMessage, meta: MessageMeta) -> bool {
        if self.config.extra_validation {
            if let Err(err) = validate_data(&data) {
                self.reject(&meta, err.to_string(), Some(&data), Some(MessageType::Data));
                return false;
            }
        }
        if data.digest.is_none() {
            self.reject(
                &meta,
                Rejection::MissingDigest.to_string(),
                Some(&data),
                Some(MessageType::Data),
            );
            return false;
        }
        self.promote_chain_entry(data, meta)
    }

    fn process_castle(&self, castle: SecurityCastle, meta: MessageMeta) -> bool {
        if castle.id.is_none() {
            self.reject(
                &meta,
                ValidationError::MissingId.to_string(),
                None,
                Some(MessageType::SecurityCastle),
            );
            return false;
        }
        if self.config.extra_validation {
            if let Err(err) = validate_castle(&castle) {
                self.reject(&meta, err.to_string(), None, Some(MessageType::SecurityCastle));
                return false;
            }
        }
        self.add_trust_castle(castle).is_ok()
    }

    /// Validate against committed state and commit if valid.
    ///
    /// Validation and append are atomic per object: if another revision of
    /// the same object commits in between, validation runs again against
    /// the new state.
    pub fn promote_chain_entry(&self, data: DataMessage, meta: MessageMeta) -> bool {
        let id = data.id();
        loop {
            let seen = self.chain_of_trust.get(&id).map_or(0, |chain| chain.len());

            if let Err(rejection) = self.create_trust_validator().check(&data) {
                self.reject(&meta, rejection.to_string(), Some(&data), Some(MessageType::Data));
                return false;
            }

            let committed = match self.chain_of_trust.entry(id) {
                Entry::Occupied(mut entry) if entry.get().len() == seen => {
                    Arc::make_mut(entry.get_mut()).push(data.clone(), meta);
                    true
                }
                Entry::Vacant(entry) if seen == 0 => {
                    entry.insert(Arc::new(RevisionChain::new(self.partition.clone(), data.clone(), meta)));
                    true
                }
                _ => false,
            };

            if committed {
                debug!(
                    partition = %self.partition,
                    id = %id,
                    payload_type = %data.header.payload_type,
                    offset = meta.offset,
                    "promoted"
                );
                self.notify(&data, &meta);
                return true;
            }
            debug!(partition = %self.partition, id = %id, "concurrent promotion, revalidating");
        }
    }

    fn reject(
        &self,
        meta: &MessageMeta,
        reason: String,
        data: Option<&DataMessage>,
        message_type: Option<MessageType>,
    ) {
        let event = DropEvent {
            partition: self.partition.clone(),
            offset: Some(meta.offset).filter(|&offset| offset > 0),
            reason,
            id: data.map(DataMessage::id),
            payload_type: data.map(|d| d.header.payload_type.clone()),
            message_type,
        };
        warn!(
            partition = %event.partition,
            offset = ?event.offset,
            reason = %event.reason,
            id = ?event.id,
            payload_type = ?event.payload_type,
            "dropped record"
        );
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.dropped(&event);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────────────────

    /// Check a message without side effects. Keys and castles always pass;
    /// data sees committed state plus the staging manager's saved data.
    pub fn validate(&self, msg: &WireMessage) -> bool {
        match msg {
            WireMessage::Data(data) => self.validate_with_saved_data(data),
            WireMessage::PublicKey(_) | WireMessage::SecurityCastle(_) => true,
        }
    }

    /// Validate against committed state only.
    pub fn validate_without_saved_data(&self, data: &DataMessage) -> bool {
        self.create_trust_validator().validate(data)
    }

    /// Validate against committed state plus saved, uncommitted data.
    pub fn validate_with_saved_data(&self, data: &DataMessage) -> bool {
        let mut validator = self.create_trust_validator();
        if let Some(staging) = &self.staging {
            validator = validator.with_staged(staging.saved_data(&self.partition));
        }
        validator.validate(data)
    }

    /// Validate with saved data and staged public keys.
    pub fn validate_including_staging(&self, data: &DataMessage) -> bool {
        self.create_trust_validator_including_staging().validate(data)
    }

    /// A validator over this chain's committed state.
    pub fn create_trust_validator(&self) -> TrustValidator<'_> {
        let partition = &self.partition;
        TrustValidator::new(
            move |id| self.root_of_trust.get(id).map(|entry| entry.value().clone()),
            move |id| self.chain_of_trust.get(id).map(|entry| Arc::clone(entry.value())),
            move |hash| self.public_keys.get(hash).map(|entry| entry.value().clone()),
            self.public_write_hash.as_str(),
        )
        .with_aliases(move |alias| self.resolve_alias(alias))
        .on_failure(move |rejection, data| {
            debug!(partition = %partition, id = %data.id(), reason = %rejection, "validation failed");
        })
    }

    /// A validator that also sees the staging manager's keys and saved data.
    pub fn create_trust_validator_including_staging(&self) -> TrustValidator<'_> {
        let validator = self.create_trust_validator();
        match &self.staging {
            Some(staging) => {
                let (keys, aliases) = (Arc::clone(staging), Arc::clone(staging));
                let (key_partition, alias_partition) = (self.partition.clone(), self.partition.clone());
                validator
                    .with_staged(staging.saved_data(&self.partition))
                    .with_public_key_overlay(move |hash| keys.find_public_key(&key_partition, hash))
                    .with_alias_fallback(move |alias| aliases.find_alias(&alias_partition, alias))
            }
            None => validator,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// True if the object has a committed payload.
    pub fn exists(&self, id: &ObjectId) -> bool {
        self.chain_of_trust.get(id).map_or(false, |chain| chain.has_payload())
    }

    /// True if the object has ever been tracked, even as an anchor only.
    pub fn ever_existed(&self, id: &ObjectId) -> bool {
        self.chain_of_trust.contains_key(id)
    }

    pub fn immutable(&self, id: &ObjectId) -> bool {
        self.chain_of_trust.get(id).map_or(false, |chain| chain.immutable())
            || self.root_of_trust.get(id).map_or(false, |root| root.immutable)
    }

    /// Snapshot of the object's revision chain.
    pub fn get_data(&self, id: &ObjectId) -> Option<Arc<RevisionChain>> {
        self.chain_of_trust.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Delivery metadata of every committed entry for the object.
    pub fn get_history(&self, id: &ObjectId) -> Vec<MessageMeta> {
        self.get_data(id).map(|chain| chain.history()).unwrap_or_default()
    }

    pub fn get_root_of_trust(&self, id: &ObjectId) -> Option<RevisionHeader> {
        self.root_of_trust.get(id).map(|entry| entry.value().clone())
    }

    pub fn get_public_key(&self, hash: &str) -> Option<PublicKey> {
        self.public_keys.get(hash).map(|entry| entry.value().clone())
    }

    pub fn has_public_key(&self, hash: &str) -> bool {
        self.public_keys.contains_key(hash)
    }

    /// Hash of the signing key that owns `alias`.
    pub fn resolve_alias(&self, alias: &str) -> Option<String> {
        self.aliases.get(alias).map(|entry| entry.value().clone())
    }

    pub fn get_castle(&self, id: &CastleId) -> Option<SecurityCastle> {
        self.castles.get(id).map(|entry| entry.value().clone())
    }

    /// Every tracked object, optionally only those whose latest entry
    /// declares `payload_type`.
    pub fn get_all_data(&self, payload_type: Option<&str>) -> Vec<Arc<RevisionChain>> {
        self.chain_of_trust
            .iter()
            .filter(|entry| payload_type.map_or(true, |t| entry.value().payload_type() == t))
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Log integration
    // ─────────────────────────────────────────────────────────────────────────

    /// Replay every record of this chain's partition from `log`. Returns how
    /// many records were accepted.
    pub async fn load_from<L>(&self, log: &L) -> Result<usize>
    where
        L: PartitionedLog + ?Sized,
    {
        let bundles = log.read(&self.partition).await?;
        let timestamp = trustlog_core::now_millis();
        let mut accepted = 0;
        for bundle in &bundles {
            let meta = MessageMeta::new(self.partition.index, bundle.offset, timestamp);
            if self.receive(&bundle.payload, meta) {
                accepted += 1;
            }
        }
        debug!(partition = %self.partition, records = bundles.len(), accepted, "loaded from log");
        Ok(accepted)
    }

    /// Write a message to `log` and feed it through [`receive`](Self::receive)
    /// with the offset the log assigned. Returns whether the chain accepted it.
    pub async fn write_through<L>(&self, log: &L, key: &str, msg: &WireMessage) -> Result<bool>
    where
        L: PartitionedLog + ?Sized,
    {
        let bundle = log.write_message(&self.partition, key, msg).await?;
        let meta = MessageMeta::new(self.partition.index, bundle.offset, trustlog_core::now_millis());
        Ok(self.receive(&bundle.payload, meta))
    }
}
