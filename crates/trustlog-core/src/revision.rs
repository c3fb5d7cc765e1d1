//! Revisions: signed versions of stored objects.
//!
//! A revision is a header, a digest over `canonical(header) || body`, a
//! signature over that digest, and an optional body. Revisions are never
//! edited; a change to an object is a new revision that names its parent.

use std::collections::BTreeSet;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use trustlog_forge::symmetric::hash_sha;
use trustlog_forge::{KeyUse, PrivateKey, PublicKey};

use crate::canonical::digest_input;
use crate::error::{CoreError, Result};
use crate::types::{ObjectId, VersionId};

/// Length of a revision digest in bytes (SHA-256).
pub const DIGEST_LEN: usize = 32;

/// Everything the chain needs to know about a revision, minus the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionHeader {
    /// The object this revision belongs to.
    pub id: ObjectId,

    /// This revision.
    pub version: VersionId,

    /// The revision this one was derived from.
    #[serde(default)]
    pub previous_version: Option<VersionId>,

    /// Logical type name of the payload.
    #[serde(default)]
    pub payload_type: String,

    /// Hash of the key that signed this revision.
    #[serde(default)]
    pub signing_key_hash: Option<String>,

    /// Hash of the key the body is encrypted to, if it is encrypted.
    #[serde(default)]
    pub encrypt_key_hash: Option<String>,

    /// Key hashes or aliases allowed to read.
    #[serde(default)]
    pub allow_read: BTreeSet<String>,

    /// Key hashes or aliases allowed to write the next revision.
    #[serde(default)]
    pub allow_write: BTreeSet<String>,

    /// No revision may follow this one.
    #[serde(default)]
    pub immutable: bool,
}

impl RevisionHeader {
    /// A header-only trust anchor for `id`.
    pub fn anchor(id: ObjectId, payload_type: impl Into<String>) -> Self {
        Self {
            id,
            version: VersionId::random(),
            previous_version: None,
            payload_type: payload_type.into(),
            signing_key_hash: None,
            encrypt_key_hash: None,
            allow_read: BTreeSet::new(),
            allow_write: BTreeSet::new(),
            immutable: false,
        }
    }
}

/// Digest and signature of a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDigest {
    /// SHA-256 of `canonical(header) || body`.
    pub digest: Bytes,
    /// Signature by the header's signing key over `digest`.
    pub signature: Bytes,
}

/// One revision as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMessage {
    pub header: RevisionHeader,
    pub digest: Option<DataDigest>,
    pub body: Option<Bytes>,
}

/// Compute the digest of a header and body.
pub fn compute_digest(header: &RevisionHeader, body: Option<&[u8]>) -> [u8; DIGEST_LEN] {
    hash_sha(None, &digest_input(header, body))
}

impl DataMessage {
    /// A header-only message, used for trust anchors.
    pub fn header_only(header: RevisionHeader) -> Self {
        Self {
            header,
            digest: None,
            body: None,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.header.id
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// A signed revision with no body: deletes the object's payload.
    pub fn is_tombstone(&self) -> bool {
        self.digest.is_some() && self.body.is_none()
    }

    /// Recompute the digest and compare it with the carried one.
    pub fn digest_matches(&self) -> bool {
        match &self.digest {
            Some(d) => d.digest[..] == compute_digest(&self.header, self.body.as_deref())[..],
            None => false,
        }
    }

    /// Decrypt a body that was sealed with [`RevisionBuilder::encrypted_body`].
    pub fn decrypt_body(&self, key: &PrivateKey) -> Result<Option<Vec<u8>>> {
        match (&self.body, &self.header.encrypt_key_hash) {
            (None, _) => Ok(None),
            (Some(body), None) => Ok(Some(body.to_vec())),
            (Some(body), Some(_)) => Ok(Some(trustlog_forge::decrypt(key.private_bytes(), body)?)),
        }
    }
}

/// Builder for signed revisions.
pub struct RevisionBuilder {
    header: RevisionHeader,
    body: Option<Bytes>,
}

impl RevisionBuilder {
    /// Start a revision of `id` with a fresh version id.
    pub fn new(id: ObjectId, payload_type: impl Into<String>) -> Self {
        Self {
            header: RevisionHeader::anchor(id, payload_type),
            body: None,
        }
    }

    /// Set the version id (otherwise random).
    pub fn version(mut self, version: VersionId) -> Self {
        self.header.version = version;
        self
    }

    /// Set the parent revision.
    pub fn parent(mut self, previous: VersionId) -> Self {
        self.header.previous_version = Some(previous);
        self
    }

    pub fn immutable(mut self, immutable: bool) -> Self {
        self.header.immutable = immutable;
        self
    }

    pub fn allow_write<I, S>(mut self, writers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header.allow_write.extend(writers.into_iter().map(Into::into));
        self
    }

    pub fn allow_read<I, S>(mut self, readers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header.allow_read.extend(readers.into_iter().map(Into::into));
        self
    }

    /// Set a plaintext body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self.header.encrypt_key_hash = None;
        self
    }

    /// Seal `plaintext` to an encryption key and use it as the body.
    pub fn encrypted_body(mut self, key: &PublicKey, plaintext: &[u8]) -> Result<Self> {
        if key.key_use() != Some(KeyUse::Encrypt) {
            return Err(CoreError::EncodingError(format!(
                "key {} is not an encryption key",
                key.alias()
            )));
        }
        self.body = Some(Bytes::from(trustlog_forge::encrypt(key.bytes(), plaintext)?));
        self.header.encrypt_key_hash = Some(key.hash().to_string());
        self.header.allow_read.insert(key.hash().to_string());
        Ok(self)
    }

    /// The header as it stands.
    pub fn header(&self) -> &RevisionHeader {
        &self.header
    }

    /// Finish as a header-only message (no digest, no body).
    pub fn build_header_only(self) -> DataMessage {
        DataMessage::header_only(self.header)
    }

    /// Sign the revision with `key`.
    pub fn sign(mut self, key: &PrivateKey) -> Result<DataMessage> {
        self.header.signing_key_hash = Some(key.hash().to_string());
        let digest = compute_digest(&self.header, self.body.as_deref());
        let signature = trustlog_forge::sign(key.private_bytes(), &digest)?;
        Ok(DataMessage {
            header: self.header,
            digest: Some(DataDigest {
                digest: Bytes::copy_from_slice(&digest),
                signature: Bytes::from(signature),
            }),
            body: self.body,
        })
    }
}
