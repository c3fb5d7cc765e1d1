//! Wire messages and their framing.
//!
//! ```text
//! record = type_tag (1 byte) || CBOR(message)
//! ```
//!
//! | tag | message          |
//! |-----|------------------|
//! | 1   | Data (revision)  |
//! | 2   | PublicKey        |
//! | 3   | SecurityCastle   |

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use trustlog_forge::{KeyForge, KeyUse, PrivateKey, PublicKey};

use crate::error::{CoreError, Result};
use crate::revision::{DataDigest, DataMessage, RevisionHeader};
use crate::types::CastleId;

/// The leading type tag of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Data = 1,
    PublicKey = 2,
    SecurityCastle = 3,
}

impl MessageType {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Data),
            2 => Some(Self::PublicKey),
            3 => Some(Self::SecurityCastle),
            _ => None,
        }
    }
}

/// A public key published to a partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyMessage {
    pub key: PublicKey,
}

impl PublicKeyMessage {
    pub fn from_key(key: &PublicKey) -> Self {
        Self { key: key.clone() }
    }

    /// The hash the key is cached under.
    pub fn hash(&self) -> &str {
        self.key.hash()
    }

    pub fn alias(&self) -> &str {
        self.key.alias()
    }
}

/// A symmetric secret wrapped for a set of key holders.
///
/// `lookup` maps each holder's encryption key hash to the secret sealed to
/// that key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityCastle {
    #[serde(default)]
    pub id: Option<CastleId>,
    #[serde(default)]
    pub lookup: BTreeMap<String, Bytes>,
}

impl SecurityCastle {
    /// Seal `secret` for every holder in `holders`.
    pub fn seal(forge: &KeyForge, id: CastleId, secret: &[u8], holders: &[&PublicKey]) -> Result<Self> {
        let mut lookup = BTreeMap::new();
        for holder in holders {
            if holder.key_use() != Some(KeyUse::Encrypt) {
                return Err(CoreError::EncodingError(format!(
                    "castle holder {} is not an encryption key",
                    holder.alias()
                )));
            }
            let sealed = forge.encrypt(holder.bytes(), secret)?;
            lookup.insert(holder.hash().to_string(), Bytes::from(sealed));
        }
        Ok(Self { id: Some(id), lookup })
    }

    pub fn holds(&self, key_hash: &str) -> bool {
        self.lookup.contains_key(key_hash)
    }

    /// Recover the secret with a holder's private key. `None` if the key is
    /// not a holder.
    pub fn unseal(&self, forge: &KeyForge, key: &PrivateKey) -> Result<Option<Vec<u8>>> {
        match self.lookup.get(key.hash()) {
            Some(sealed) => Ok(Some(forge.decrypt(key, sealed)?)),
            None => Ok(None),
        }
    }
}

/// A decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    Data(DataMessage),
    PublicKey(PublicKeyMessage),
    SecurityCastle(SecurityCastle),
}

/// Decoding shape for data records; the header is checked after parsing so
/// its absence gets its own error.
#[derive(Deserialize)]
struct DataWire {
    #[serde(default)]
    header: Option<RevisionHeader>,
    #[serde(default)]
    digest: Option<DataDigest>,
    #[serde(default)]
    body: Option<Bytes>,
}

fn to_cbor<T: Serialize>(tag: MessageType, value: &T) -> Result<Vec<u8>> {
    let mut buf = vec![tag.to_u8()];
    ciborium::into_writer(value, &mut buf).map_err(|e| CoreError::EncodingError(e.to_string()))?;
    Ok(buf)
}

fn from_cbor<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
}

impl WireMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Data(_) => MessageType::Data,
            Self::PublicKey(_) => MessageType::PublicKey,
            Self::SecurityCastle(_) => MessageType::SecurityCastle,
        }
    }

    /// Encode with the leading type tag.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Self::Data(m) => to_cbor(MessageType::Data, m),
            Self::PublicKey(m) => to_cbor(MessageType::PublicKey, m),
            Self::SecurityCastle(m) => to_cbor(MessageType::SecurityCastle, m),
        }
    }

    /// Decode a record. Fails on an unknown tag, malformed CBOR, or a data
    /// record without a header.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let (&tag, body) = raw.split_first().ok_or(CoreError::EmptyRecord)?;
        match MessageType::from_u8(tag).ok_or(CoreError::UnknownMessageType(tag))? {
            MessageType::Data => {
                let wire: DataWire = from_cbor(body)?;
                Ok(Self::Data(DataMessage {
                    header: wire.header.ok_or(CoreError::MissingHeader)?,
                    digest: wire.digest,
                    body: wire.body,
                }))
            }
            MessageType::PublicKey => Ok(Self::PublicKey(from_cbor(body)?)),
            MessageType::SecurityCastle => Ok(Self::SecurityCastle(from_cbor(body)?)),
        }
    }
}

impl From<DataMessage> for WireMessage {
    fn from(m: DataMessage) -> Self {
        Self::Data(m)
    }
}

impl From<PublicKeyMessage> for WireMessage {
    fn from(m: PublicKeyMessage) -> Self {
        Self::PublicKey(m)
    }
}

impl From<SecurityCastle> for WireMessage {
    fn from(m: SecurityCastle) -> Self {
        Self::SecurityCastle(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revision::RevisionBuilder;
    use crate::types::ObjectId;
    use trustlog_forge::ForgeConfig;

    fn forge() -> KeyForge {
        KeyForge::new(ForgeConfig::no_pregen())
    }

    #[test]
    fn test_data_message_roundtrip() {
        let forge = forge();
        let key = forge.gen_sign_key(64, None).unwrap();
        let msg = RevisionBuilder::new(ObjectId::random(), "Account")
            .allow_write(["alice"])
            .body(b"hello".to_vec())
            .sign(&key)
            .unwrap();

        let raw = WireMessage::from(msg.clone()).encode().unwrap();
        assert_eq!(raw[0], MessageType::Data.to_u8());
        match WireMessage::decode(&raw).unwrap() {
            WireMessage::Data(decoded) => {
                assert_eq!(decoded, msg);
                assert!(decoded.digest_matches());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_public_key_roundtrip_keeps_alias() {
        let key = forge().gen_sign_key(128, Some("bob")).unwrap();
        let raw = WireMessage::from(PublicKeyMessage::from_key(key.public_key()))
            .encode()
            .unwrap();
        match WireMessage::decode(&raw).unwrap() {
            WireMessage::PublicKey(pk) => {
                assert_eq!(pk.hash(), key.hash());
                assert_eq!(pk.alias(), "bob");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_tag_and_empty_record() {
        assert!(matches!(
            WireMessage::decode(&[9, 0xa0]),
            Err(CoreError::UnknownMessageType(9))
        ));
        assert!(matches!(WireMessage::decode(&[]), Err(CoreError::EmptyRecord)));
    }

    #[test]
    fn test_missing_header_is_reported() {
        // An empty CBOR map under the data tag.
        assert!(matches!(
            WireMessage::decode(&[MessageType::Data.to_u8(), 0xa0]),
            Err(CoreError::MissingHeader)
        ));
    }

    #[test]
    fn test_garbage_is_a_decoding_error() {
        assert!(matches!(
            WireMessage::decode(&[MessageType::PublicKey.to_u8(), 0xff, 0x00]),
            Err(CoreError::DecodingError(_))
        ));
    }

    #[test]
    fn test_castle_seal_and_unseal() {
        let forge = forge();
        let alice = forge.gen_encrypt_key(128, Some("alice")).unwrap();
        let bob = forge.gen_encrypt_key(256, Some("bob")).unwrap();
        let eve = forge.gen_encrypt_key(128, Some("eve")).unwrap();
        let secret = forge.generate_secret(256).unwrap();

        let castle = SecurityCastle::seal(
            &forge,
            CastleId::random(),
            secret.as_bytes(),
            &[alice.public_key(), bob.public_key()],
        )
        .unwrap();

        assert!(castle.holds(alice.hash()));
        assert_eq!(castle.unseal(&forge, &alice).unwrap().unwrap(), secret.as_bytes());
        assert_eq!(castle.unseal(&forge, &bob).unwrap().unwrap(), secret.as_bytes());
        assert_eq!(castle.unseal(&forge, &eve).unwrap(), None);

        let raw = WireMessage::from(castle.clone()).encode().unwrap();
        assert_eq!(WireMessage::decode(&raw).unwrap(), WireMessage::SecurityCastle(castle));
    }

    #[test]
    fn test_castle_rejects_signing_holder() {
        let forge = forge();
        let signer = forge.gen_sign_key(64, None).unwrap();
        assert!(SecurityCastle::seal(&forge, CastleId::random(), b"s", &[signer.public_key()]).is_err());
    }
}
