//! Golden test vectors for deterministic verification.
//!
//! A revision digest is only portable if every node encodes a header to the
//! same bytes. These vectors pin the canonical header encoding and the
//! digest over `header || body`.

use std::collections::BTreeSet;

use trustlog_core::{canonical_header_bytes, compute_digest, ObjectId, RevisionHeader, VersionId};
use uuid::Uuid;

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Every byte of the object id.
    pub id_byte: u8,
    /// Every byte of the version id.
    pub version_byte: u8,
    /// Every byte of the parent version id, if any.
    pub parent_byte: Option<u8>,
    pub payload_type: &'static str,
    pub signing_key_hash: Option<&'static str>,
    pub encrypt_key_hash: Option<&'static str>,
    pub allow_read: &'static [&'static str],
    pub allow_write: &'static [&'static str],
    pub immutable: bool,
    pub body: Option<&'static [u8]>,
    /// Expected canonical header bytes (hex).
    pub expected_header: &'static str,
    /// Expected SHA-256 digest (hex).
    pub expected_digest: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "anchor header",
            id_byte: 0x01,
            version_byte: 0x02,
            parent_byte: None,
            payload_type: "Account",
            signing_key_hash: None,
            encrypt_key_hash: None,
            allow_read: &[],
            allow_write: &[],
            immutable: false,
            body: None,
            expected_header: "a90050010101010101010101010101010101010150020202020202020202020202020202\
                              0202f603674163636f756e7404f605f60680078008f4",
            expected_digest: "36d78d7ca1f13917eaa2d0cdd54b225895f8588656558efd94b2afa5605fdb58",
        },
        GoldenVector {
            name: "signed revision with body",
            id_byte: 0x01,
            version_byte: 0x03,
            parent_byte: Some(0x02),
            payload_type: "Account",
            signing_key_hash: Some("signer-hash"),
            encrypt_key_hash: None,
            allow_read: &[],
            // Out of order on purpose; sets encode sorted.
            allow_write: &["w2", "w1"],
            immutable: false,
            body: Some(b"balance=10"),
            expected_header: "a90050010101010101010101010101010101010150030303030303030303030303030303\
                              0302500202020202020202020202020202020203674163636f756e74046b7369676e6572\
                              2d6861736805f60680078262773162773208f4",
            expected_digest: "e65de8a331454c93a627bc6e9e726b578624934e280a7c7dfaec04bfcffd1478",
        },
        GoldenVector {
            name: "immutable tombstone",
            id_byte: 0x11,
            version_byte: 0x12,
            parent_byte: Some(0x13),
            payload_type: "Ledger",
            signing_key_hash: Some("k"),
            encrypt_key_hash: None,
            allow_read: &["r"],
            allow_write: &[],
            immutable: true,
            body: None,
            expected_header: "a90050111111111111111111111111111111110150121212121212121212121212121212\
                              1202501313131313131313131313131313131303664c656467657204616b05f606816172\
                              078008f5",
            expected_digest: "829ae2d959983218d4dfe204b4ecc732159a01cbe29200d10fd9be66e6ad5329",
        },
        GoldenVector {
            name: "encrypted body",
            id_byte: 0xaa,
            version_byte: 0xbb,
            parent_byte: None,
            payload_type: "Secret",
            signing_key_hash: Some("s"),
            encrypt_key_hash: Some("e"),
            allow_read: &["e"],
            allow_write: &["public"],
            immutable: false,
            body: Some(&[0x00, 0x01, 0x02]),
            expected_header: "a90050aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa0150bbbbbbbbbbbbbbbbbbbbbbbbbbbbbb\
                              bb02f60366536563726574046173056165068161650781667075626c696308f4",
            expected_digest: "774bec2919f5be6ee7c6794c74e50c1e766207836f3cb6b7c7c3a2401096b263",
        },
    ]
}

fn strings(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Build the header described by a vector.
pub fn header_from_vector(vector: &GoldenVector) -> RevisionHeader {
    let uuid = |byte: u8| Uuid::from_bytes([byte; 16]);
    RevisionHeader {
        id: ObjectId::from_uuid(uuid(vector.id_byte)),
        version: VersionId::from_uuid(uuid(vector.version_byte)),
        previous_version: vector.parent_byte.map(|b| VersionId::from_uuid(uuid(b))),
        payload_type: vector.payload_type.to_string(),
        signing_key_hash: vector.signing_key_hash.map(str::to_string),
        encrypt_key_hash: vector.encrypt_key_hash.map(str::to_string),
        allow_read: strings(vector.allow_read),
        allow_write: strings(vector.allow_write),
        immutable: vector.immutable,
    }
}

/// Check every vector. Returns (name, header matches, digest matches).
pub fn verify_all_vectors() -> Vec<(String, bool, bool)> {
    all_vectors()
        .iter()
        .map(|v| {
            let header = header_from_vector(v);
            let bytes = hex::encode(canonical_header_bytes(&header));
            let digest = hex::encode(compute_digest(&header, v.body));
            (v.name.to_string(), bytes == v.expected_header, digest == v.expected_digest)
        })
        .collect()
}
