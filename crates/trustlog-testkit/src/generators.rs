//! Proptest generators for property-based testing.

use std::collections::BTreeSet;

use proptest::prelude::*;
use trustlog_core::{DataMessage, ObjectId, RevisionBuilder, VersionId};
use trustlog_forge::{generate_key, seeded_rng, PrivateKey, Profile};
use uuid::Uuid;

/// Generate an object id.
pub fn object_id() -> impl Strategy<Value = ObjectId> {
    any::<[u8; 16]>().prop_map(|bytes| ObjectId::from_uuid(Uuid::from_bytes(bytes)))
}

/// Generate a version id.
pub fn version_id() -> impl Strategy<Value = VersionId> {
    any::<[u8; 16]>().prop_map(|bytes| VersionId::from_uuid(Uuid::from_bytes(bytes)))
}

/// Generate a payload type name.
pub fn payload_type() -> impl Strategy<Value = String> {
    "[A-Z][a-zA-Z]{0,15}".prop_map(String::from)
}

/// Generate body bytes of up to `max_len` bytes.
pub fn body(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a small write set of aliases.
pub fn write_set() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[a-z]{1,8}", 0..4)
}

/// A signing key derived from a generated seed string.
pub fn signing_key() -> impl Strategy<Value = PrivateKey> {
    ("[a-z0-9]{1,16}", prop_oneof![Just(64u32), Just(128u32), Just(256u32)]).prop_map(|(seed, level)| {
        let profile = Profile::sign(level).expect("supported level");
        generate_key(profile, &mut seeded_rng(&seed)).expect("seeded key generates")
    })
}

/// Parameters for generating a revision.
#[derive(Debug, Clone)]
pub struct RevisionParams {
    pub id: ObjectId,
    pub version: VersionId,
    pub parent: Option<VersionId>,
    pub payload_type: String,
    pub allow_write: BTreeSet<String>,
    pub immutable: bool,
    pub body: Option<Vec<u8>>,
}

impl Arbitrary for RevisionParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            object_id(),
            version_id(),
            proptest::option::of(version_id()),
            payload_type(),
            write_set(),
            any::<bool>(),
            proptest::option::of(body(256)),
        )
            .prop_filter("a revision cannot be its own parent", |(_, version, parent, ..)| {
                parent.as_ref() != Some(version)
            })
            .prop_map(|(id, version, parent, payload_type, allow_write, immutable, body)| RevisionParams {
                id,
                version,
                parent,
                payload_type,
                allow_write,
                immutable,
                body,
            })
            .boxed()
    }
}

/// Build and sign a revision from parameters.
pub fn revision_from_params(params: &RevisionParams, key: &PrivateKey) -> DataMessage {
    let mut builder = RevisionBuilder::new(params.id, params.payload_type.clone())
        .version(params.version)
        .immutable(params.immutable)
        .allow_write(params.allow_write.iter().cloned());
    if let Some(parent) = params.parent {
        builder = builder.parent(parent);
    }
    if let Some(body) = &params.body {
        builder = builder.body(body.clone());
    }
    builder.sign(key).expect("revision signs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustlog_core::{canonical_header_bytes, validate_data, WireMessage};
    use trustlog_forge::public_write_key;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_signed_revisions_are_well_formed(params: RevisionParams) {
            let msg = revision_from_params(&params, public_write_key().unwrap());
            prop_assert!(msg.digest_matches());
            prop_assert!(validate_data(&msg).is_ok());
            prop_assert_eq!(msg.is_tombstone(), params.body.is_none());
        }

        #[test]
        fn test_canonical_bytes_deterministic(params: RevisionParams) {
            let key = public_write_key().unwrap();
            let a = revision_from_params(&params, key);
            let b = revision_from_params(&params, key);
            prop_assert_eq!(canonical_header_bytes(&a.header), canonical_header_bytes(&b.header));
            prop_assert_eq!(a.digest, b.digest);
        }

        #[test]
        fn test_any_body_change_breaks_digest(params: RevisionParams, extra in any::<u8>()) {
            let mut msg = revision_from_params(&params, public_write_key().unwrap());
            let mut body = msg.body.as_deref().unwrap_or_default().to_vec();
            body.push(extra);
            msg.body = Some(body.into());
            prop_assert!(!msg.digest_matches());
        }

        #[test]
        fn test_wire_decode_preserves_digest(params: RevisionParams) {
            let msg = revision_from_params(&params, public_write_key().unwrap());
            let raw = WireMessage::from(msg.clone()).encode().unwrap();
            match WireMessage::decode(&raw).unwrap() {
                WireMessage::Data(decoded) => prop_assert!(decoded.digest_matches()),
                other => prop_assert!(false, "decoded {:?}", other),
            }
        }

        #[test]
        fn test_sign_verify_across_levels(key in signing_key(), message in body(128)) {
            let signature = trustlog_forge::sign(key.private_bytes(), &message).unwrap();
            prop_assert!(trustlog_forge::verify(key.public_key().bytes(), &message, &signature));

            let mut tampered = message.clone();
            tampered.push(0x5a);
            prop_assert!(!trustlog_forge::verify(key.public_key().bytes(), &tampered, &signature));
        }
    }
}
