//! Canonical CBOR encoding of revision headers.
//!
//! The digest a writer signs covers the header bytes, so every node must
//! produce identical bytes for an identical header. Encoding follows
//! RFC 8949 core deterministic encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - Permission sets are emitted in sorted order

use ciborium::value::Value;

use crate::revision::RevisionHeader;

/// Header field keys (integer keys for compact encoding).
mod keys {
    pub const ID: u64 = 0;
    pub const VERSION: u64 = 1;
    pub const PREVIOUS_VERSION: u64 = 2;
    pub const PAYLOAD_TYPE: u64 = 3;
    pub const SIGNING_KEY_HASH: u64 = 4;
    pub const ENCRYPT_KEY_HASH: u64 = 5;
    pub const ALLOW_READ: u64 = 6;
    pub const ALLOW_WRITE: u64 = 7;
    pub const IMMUTABLE: u64 = 8;
}

/// Encode a revision header to canonical CBOR bytes.
pub fn canonical_header_bytes(header: &RevisionHeader) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &header_to_cbor_value(header));
    buf
}

/// The bytes covered by a revision digest: canonical header || body.
pub fn digest_input(header: &RevisionHeader, body: Option<&[u8]>) -> Vec<u8> {
    let mut buf = canonical_header_bytes(header);
    if let Some(body) = body {
        buf.extend_from_slice(body);
    }
    buf
}

fn optional_text(value: Option<&str>) -> Value {
    match value {
        Some(s) => Value::Text(s.to_string()),
        None => Value::Null,
    }
}

fn header_to_cbor_value(header: &RevisionHeader) -> Value {
    let key = |k: u64| Value::Integer(k.into());
    let text_set = |set: &std::collections::BTreeSet<String>| {
        Value::Array(set.iter().cloned().map(Value::Text).collect())
    };

    Value::Map(vec![
        (key(keys::ID), Value::Bytes(header.id.as_bytes().to_vec())),
        (key(keys::VERSION), Value::Bytes(header.version.as_bytes().to_vec())),
        (
            key(keys::PREVIOUS_VERSION),
            match &header.previous_version {
                Some(v) => Value::Bytes(v.as_bytes().to_vec()),
                None => Value::Null,
            },
        ),
        (key(keys::PAYLOAD_TYPE), Value::Text(header.payload_type.clone())),
        (key(keys::SIGNING_KEY_HASH), optional_text(header.signing_key_hash.as_deref())),
        (key(keys::ENCRYPT_KEY_HASH), optional_text(header.encrypt_key_hash.as_deref())),
        (key(keys::ALLOW_READ), text_set(&header.allow_read)),
        (key(keys::ALLOW_WRITE), text_set(&header.allow_write)),
        (key(keys::IMMUTABLE), Value::Bool(header.immutable)),
    ])
}

fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Text(s) => {
            encode_uint(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item);
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        // Null. Headers produce no other value kinds.
        _ => buf.push(0xf6),
    }
}

fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Keys are sorted by their encoded bytes.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObjectId, VersionId};
    use uuid::Uuid;

    fn header() -> RevisionHeader {
        RevisionHeader {
            id: ObjectId::from_uuid(Uuid::from_bytes([1; 16])),
            version: VersionId::from_uuid(Uuid::from_bytes([2; 16])),
            previous_version: None,
            payload_type: "Account".into(),
            signing_key_hash: Some("abc".into()),
            encrypt_key_hash: None,
            allow_read: Default::default(),
            allow_write: ["w2".to_string(), "w1".to_string()].into_iter().collect(),
            immutable: false,
        }
    }

    #[test]
    fn test_header_encoding_deterministic() {
        assert_eq!(canonical_header_bytes(&header()), canonical_header_bytes(&header()));
    }

    #[test]
    fn test_every_field_changes_bytes() {
        let base = canonical_header_bytes(&header());

        let mut h = header();
        h.immutable = true;
        assert_ne!(canonical_header_bytes(&h), base);

        let mut h = header();
        h.previous_version = Some(VersionId::from_uuid(Uuid::from_bytes([3; 16])));
        assert_ne!(canonical_header_bytes(&h), base);

        let mut h = header();
        h.allow_write.insert("w3".into());
        assert_ne!(canonical_header_bytes(&h), base);

        let mut h = header();
        h.payload_type = "Other".into();
        assert_ne!(canonical_header_bytes(&h), base);
    }

    #[test]
    fn test_header_is_a_sorted_map() {
        let bytes = canonical_header_bytes(&header());
        // Map of 9 entries, first key 0 followed by a 16-byte byte string.
        assert_eq!(bytes[0], 0xa9);
        assert_eq!(bytes[1], 0x00);
        assert_eq!(bytes[2], 0x50);
    }

    #[test]
    fn test_digest_input_appends_body() {
        let h = header();
        let bare = digest_input(&h, None);
        let with_body = digest_input(&h, Some(b"body"));
        assert_eq!(&with_body[..bare.len()], &bare[..]);
        assert_eq!(&with_body[bare.len()..], b"body");
    }

    #[test]
    fn test_integer_encoding() {
        let mut buf = Vec::new();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);
    }

    #[test]
    fn test_header_value_kinds() {
        let mut buf = Vec::new();
        for value in [Value::Bool(true), Value::Bool(false), Value::Null] {
            encode_value_to(&mut buf, &value);
        }
        assert_eq!(buf, vec![0xf5, 0xf4, 0xf6]);

        // The immutable flag is the last entry of the map.
        let mut h = header();
        assert!(canonical_header_bytes(&h).ends_with(&[0x08, 0xf4]));
        h.immutable = true;
        assert!(canonical_header_bytes(&h).ends_with(&[0x08, 0xf5]));
    }

    #[test]
    fn test_map_key_ordering() {
        let mut buf = Vec::new();
        let entries = vec![
            (Value::Integer(8.into()), Value::Integer(80.into())),
            (Value::Integer(0.into()), Value::Integer(0.into())),
            (Value::Integer(5.into()), Value::Integer(50.into())),
        ];
        encode_map_canonical(&mut buf, &entries);
        assert_eq!(buf, vec![0xa3, 0x00, 0x00, 0x05, 0x18, 50, 0x08, 0x18, 80]);
    }
}
