//! Trust validation of data revisions.
//!
//! A [`TrustValidator`] answers one question: may this revision be appended
//! to its object's chain? It reads state through injected lookups and never
//! writes, so one validator can check a whole batch against the same view.
//!
//! ## Checks, in order
//!
//! 1. The revision carries a digest and its signing key is known, under
//!    the hash of its own bytes.
//! 2. The key is a signing key and verifies the recomputed digest.
//! 3. A referenced parent exists, committed or staged.
//! 4. Neither the parent nor the object is immutable.
//! 5. The signer is in the effective write set.
//!
//! ## Write sets
//!
//! The most recent declaration wins: a staged revision of the object, then
//! the latest committed one, then the root of trust, and for a brand new
//! object the revision's own header. An empty set is public: only the
//! public-write anchor may write. A write set names writers by key hash or
//! by alias. An alias counts only through the alias lookup, which binds it
//! to one key hash; the alias a key declares about itself grants nothing.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use trustlog_core::{DataMessage, ObjectId, RevisionHeader};
use trustlog_forge::{KeyUse, PublicKey};

use crate::container::RevisionChain;
use crate::error::Rejection;

type RootLookup<'a> = Box<dyn Fn(&ObjectId) -> Option<RevisionHeader> + Send + Sync + 'a>;
type DataLookup<'a> = Box<dyn Fn(&ObjectId) -> Option<Arc<RevisionChain>> + Send + Sync + 'a>;
type KeyLookup<'a> = Box<dyn Fn(&str) -> Option<PublicKey> + Send + Sync + 'a>;
type AliasLookup<'a> = Box<dyn Fn(&str) -> Option<String> + Send + Sync + 'a>;
type FailureHook<'a> = Box<dyn Fn(Rejection, &DataMessage) + Send + Sync + 'a>;

/// Validator over a view of one partition's trust state.
pub struct TrustValidator<'a> {
    root_of_trust: RootLookup<'a>,
    data: DataLookup<'a>,
    public_key: KeyLookup<'a>,
    aliases: AliasLookup<'a>,
    staged: HashMap<ObjectId, DataMessage>,
    on_failure: Option<FailureHook<'a>>,
    public_write_hash: String,
}

impl<'a> TrustValidator<'a> {
    pub fn new<R, D, K>(root_of_trust: R, data: D, public_key: K, public_write_hash: impl Into<String>) -> Self
    where
        R: Fn(&ObjectId) -> Option<RevisionHeader> + Send + Sync + 'a,
        D: Fn(&ObjectId) -> Option<Arc<RevisionChain>> + Send + Sync + 'a,
        K: Fn(&str) -> Option<PublicKey> + Send + Sync + 'a,
    {
        Self {
            root_of_trust: Box::new(root_of_trust),
            data: Box::new(data),
            public_key: Box::new(public_key),
            aliases: Box::new(|_| None),
            staged: HashMap::new(),
            on_failure: None,
            public_write_hash: public_write_hash.into(),
        }
    }

    /// Make uncommitted revisions visible to this validator, one per object.
    pub fn with_staged(mut self, staged: HashMap<ObjectId, DataMessage>) -> Self {
        self.staged.extend(staged);
        self
    }

    /// Stage one revision, replacing any earlier staged revision of the
    /// same object.
    pub fn stage(&mut self, data: DataMessage) {
        self.staged.insert(data.id(), data);
    }

    /// Resolve keys through `overlay` before the existing lookup.
    pub fn with_public_key_overlay<F>(mut self, overlay: F) -> Self
    where
        F: Fn(&str) -> Option<PublicKey> + Send + Sync + 'a,
    {
        let base = self.public_key;
        self.public_key = Box::new(move |hash| overlay(hash).or_else(|| base(hash)));
        self
    }

    /// Resolve write-set aliases to key hashes. Without a lookup only key
    /// hashes match.
    pub fn with_aliases<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'a,
    {
        self.aliases = Box::new(lookup);
        self
    }

    /// Resolve aliases the existing lookup does not bind through `fallback`.
    pub fn with_alias_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'a,
    {
        let base = self.aliases;
        self.aliases = Box::new(move |alias| base(alias).or_else(|| fallback(alias)));
        self
    }

    /// Called with the reason and the message on every failed [`validate`](Self::validate).
    pub fn on_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(Rejection, &DataMessage) + Send + Sync + 'a,
    {
        self.on_failure = Some(Box::new(hook));
        self
    }

    /// Validate and report any failure through the hook.
    pub fn validate(&self, msg: &DataMessage) -> bool {
        match self.check(msg) {
            Ok(()) => true,
            Err(rejection) => {
                if let Some(hook) = &self.on_failure {
                    hook(rejection, msg);
                }
                false
            }
        }
    }

    /// Validate, returning the first failed check.
    pub fn check(&self, msg: &DataMessage) -> Result<(), Rejection> {
        let header = &msg.header;
        let digest = msg.digest.as_ref().ok_or(Rejection::MissingDigest)?;

        let key = header
            .signing_key_hash
            .as_deref()
            .and_then(|hash| {
                (self.public_key)(hash).filter(|key| key.hash() == hash && key.hash_matches())
            })
            .ok_or(Rejection::UnknownSigningKey)?;

        if key.key_use() != Some(KeyUse::Sign)
            || !msg.digest_matches()
            || !trustlog_forge::verify(key.bytes(), &digest.digest, &digest.signature)
        {
            return Err(Rejection::InvalidSignature);
        }

        let committed = (self.data)(&header.id);
        let root = (self.root_of_trust)(&header.id);
        // A staged copy of the candidate itself is not a predecessor.
        let staged = self
            .staged
            .get(&header.id)
            .filter(|s| s.header.version != header.version);

        if let Some(parent) = &header.previous_version {
            let parent_immutable = committed
                .as_ref()
                .and_then(|chain| chain.find_version(parent))
                .map(|rev| rev.data.header.immutable)
                .or_else(|| {
                    staged
                        .filter(|s| s.header.version == *parent)
                        .map(|s| s.header.immutable)
                })
                .ok_or(Rejection::MissingParent)?;
            if parent_immutable {
                return Err(Rejection::Immutable);
            }
        }

        if root.as_ref().map_or(false, |r| r.immutable)
            || committed.as_ref().map_or(false, |chain| chain.immutable())
            || staged.map_or(false, |s| s.header.immutable)
        {
            return Err(Rejection::Immutable);
        }

        let write_set = staged
            .map(|s| &s.header.allow_write)
            .or_else(|| committed.as_ref().and_then(|chain| chain.allow_write()))
            .or_else(|| root.as_ref().map(|r| &r.allow_write))
            .unwrap_or(&header.allow_write);

        if !self.may_write(write_set, &key) {
            return Err(Rejection::Unauthorized);
        }
        Ok(())
    }

    fn may_write(&self, write_set: &BTreeSet<String>, key: &PublicKey) -> bool {
        if write_set.is_empty() {
            return key.hash() == self.public_write_hash;
        }
        write_set
            .iter()
            .any(|writer| writer == key.hash() || (self.aliases)(writer).as_deref() == Some(key.hash()))
    }
}
