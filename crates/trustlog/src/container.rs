//! Per-object revision history.

use std::collections::BTreeSet;

use trustlog_core::{DataMessage, MessageMeta, ObjectId, PartitionKey, VersionId};

/// A committed revision and where it arrived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub data: DataMessage,
    pub meta: MessageMeta,
}

/// Every committed revision of one object, in commit order.
///
/// A chain is never empty once created. Entries are only ever appended.
#[derive(Debug, Clone)]
pub struct RevisionChain {
    partition: PartitionKey,
    revisions: Vec<Revision>,
}

impl RevisionChain {
    pub(crate) fn new(partition: PartitionKey, data: DataMessage, meta: MessageMeta) -> Self {
        Self {
            partition,
            revisions: vec![Revision { data, meta }],
        }
    }

    pub(crate) fn push(&mut self, data: DataMessage, meta: MessageMeta) {
        self.revisions.push(Revision { data, meta });
    }

    pub fn partition(&self) -> &PartitionKey {
        &self.partition
    }

    pub fn id(&self) -> ObjectId {
        self.revisions[0].data.id()
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    /// True if the object currently has a payload.
    ///
    /// Replays the history: a revision with a body makes the object live,
    /// a signed revision without one (a tombstone) clears it. Header-only
    /// anchor entries change nothing.
    pub fn has_payload(&self) -> bool {
        self.revisions.iter().fold(false, |live, rev| {
            if rev.data.has_body() {
                true
            } else if rev.data.is_tombstone() {
                false
            } else {
                live
            }
        })
    }

    /// True once any revision has been marked immutable.
    pub fn immutable(&self) -> bool {
        self.revisions.iter().any(|rev| rev.data.header.immutable)
    }

    /// Payload type declared by the latest entry.
    pub fn payload_type(&self) -> &str {
        &self.latest().data.header.payload_type
    }

    pub fn latest(&self) -> &Revision {
        &self.revisions[self.revisions.len() - 1]
    }

    /// The latest signed revision, skipping anchor entries.
    pub fn latest_data(&self) -> Option<&DataMessage> {
        self.revisions
            .iter()
            .rev()
            .map(|rev| &rev.data)
            .find(|data| data.digest.is_some())
    }

    pub fn find_version(&self, version: &VersionId) -> Option<&Revision> {
        self.revisions.iter().find(|rev| rev.data.header.version == *version)
    }

    pub fn contains_version(&self, version: &VersionId) -> bool {
        self.find_version(version).is_some()
    }

    /// Write set declared by the latest signed revision.
    pub fn allow_write(&self) -> Option<&BTreeSet<String>> {
        self.latest_data().map(|data| &data.header.allow_write)
    }

    /// Delivery metadata of every entry, oldest first.
    pub fn history(&self) -> Vec<MessageMeta> {
        self.revisions.iter().map(|rev| rev.meta).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustlog_core::RevisionBuilder;
    use trustlog_forge::{generate_key, seeded_rng, PrivateKey, Profile};

    fn key() -> PrivateKey {
        generate_key(Profile::sign(64).unwrap(), &mut seeded_rng("container")).unwrap()
    }

    fn meta(offset: u64) -> MessageMeta {
        MessageMeta::new(0, offset, 0)
    }

    fn chain_of(id: ObjectId, first: DataMessage) -> RevisionChain {
        assert_eq!(first.id(), id);
        RevisionChain::new(PartitionKey::new("accounts", 0), first, meta(1))
    }

    #[test]
    fn test_payload_lifecycle() {
        let id = ObjectId::random();
        let anchor = RevisionBuilder::new(id, "Account").build_header_only();
        let mut chain = chain_of(id, anchor);
        assert!(!chain.has_payload());
        assert!(chain.latest_data().is_none());

        let live = RevisionBuilder::new(id, "Account").body(b"1".to_vec()).sign(&key()).unwrap();
        chain.push(live.clone(), meta(2));
        assert!(chain.has_payload());
        assert_eq!(chain.latest_data(), Some(&live));

        let tombstone = RevisionBuilder::new(id, "Account")
            .parent(live.header.version)
            .sign(&key())
            .unwrap();
        chain.push(tombstone, meta(3));
        assert!(!chain.has_payload());

        chain.push(RevisionBuilder::new(id, "Account").build_header_only(), meta(4));
        assert!(!chain.has_payload());
        assert_eq!(chain.history().iter().map(|m| m.offset).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_immutable_is_sticky() {
        let id = ObjectId::random();
        let first = RevisionBuilder::new(id, "Account")
            .immutable(true)
            .body(b"x".to_vec())
            .sign(&key())
            .unwrap();
        let mut chain = chain_of(id, first);
        assert!(chain.immutable());

        chain.push(RevisionBuilder::new(id, "Account").body(b"y".to_vec()).sign(&key()).unwrap(), meta(2));
        assert!(chain.immutable());
    }

    #[test]
    fn test_find_version_and_write_set() {
        let id = ObjectId::random();
        let first = RevisionBuilder::new(id, "Account")
            .allow_write(["alice"])
            .body(b"x".to_vec())
            .sign(&key())
            .unwrap();
        let version = first.header.version;
        let mut chain = chain_of(id, first);
        assert!(chain.contains_version(&version));
        assert!(!chain.contains_version(&VersionId::random()));

        let second = RevisionBuilder::new(id, "Ledger")
            .parent(version)
            .allow_write(["bob"])
            .body(b"y".to_vec())
            .sign(&key())
            .unwrap();
        chain.push(second, meta(2));

        assert_eq!(chain.payload_type(), "Ledger");
        assert_eq!(chain.len(), 2);
        assert!(chain.allow_write().unwrap().contains("bob"));
        assert!(!chain.allow_write().unwrap().contains("alice"));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use trustlog_core::RevisionBuilder;
    use trustlog_forge::{generate_key, seeded_rng, Profile};

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Anchor,
        Body,
        Tombstone,
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![Just(Step::Anchor), Just(Step::Body), Just(Step::Tombstone)]
    }

    proptest! {
        #[test]
        fn prop_payload_follows_last_signed_revision(steps in prop::collection::vec(step(), 1..12)) {
            let key = generate_key(Profile::sign(64).unwrap(), &mut seeded_rng("container")).unwrap();
            let id = ObjectId::random();
            let revision = |step: Step| match step {
                Step::Anchor => RevisionBuilder::new(id, "Account").build_header_only(),
                Step::Body => RevisionBuilder::new(id, "Account").body(b"x".to_vec()).sign(&key).unwrap(),
                Step::Tombstone => RevisionBuilder::new(id, "Account").sign(&key).unwrap(),
            };

            let partition = PartitionKey::new("accounts", 0);
            let mut chain = RevisionChain::new(partition, revision(steps[0]), MessageMeta::new(0, 1, 0));
            for (n, &next) in steps.iter().enumerate().skip(1) {
                chain.push(revision(next), MessageMeta::new(0, n as u64 + 1, 0));
            }

            let expected = steps
                .iter()
                .rev()
                .find(|s| !matches!(s, Step::Anchor))
                .map_or(false, |s| matches!(s, Step::Body));
            prop_assert_eq!(chain.has_payload(), expected);
            prop_assert_eq!(chain.len(), steps.len());
        }
    }
}
