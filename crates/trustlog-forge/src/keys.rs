//! Key material handed out by the forge.
//!
//! A [`PublicKey`] is the shareable half: encoded bytes, the hash that
//! names the key everywhere else in the system, and an optional alias. A
//! [`PrivateKey`] pairs it with the secret bytes. Neither type carries any
//! reference back to the forge; once popped from a pool the caller owns it.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::Result;
use crate::profile::{KeyUse, Profile};

/// Compute the hash that identifies a public key.
///
/// base64url (no padding) of SHA-256 over the encoded key bytes.
pub fn key_hash(public_bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(public_bytes))
}

/// The public half of a key pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    bytes: Vec<u8>,
    hash: String,
    alias: Option<String>,
}

impl PublicKey {
    /// Wrap encoded key bytes, computing their hash.
    pub fn new(bytes: Vec<u8>, alias: Option<String>) -> Self {
        let hash = key_hash(&bytes);
        Self { bytes, hash, alias }
    }

    /// Assemble a key from untrusted parts; see [`PublicKey::hash_matches`].
    pub fn from_parts(bytes: Vec<u8>, hash: String, alias: Option<String>) -> Self {
        Self { bytes, hash, alias }
    }

    /// The encoded key bytes (profile tag first).
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The key hash.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// The alias, falling back to the hash when none was given.
    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.hash)
    }

    /// The alias exactly as supplied.
    pub fn explicit_alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Relabel the key.
    pub fn set_alias(&mut self, alias: impl Into<String>) {
        self.alias = Some(alias.into());
    }

    /// The profile the key was generated under.
    pub fn profile(&self) -> Result<Profile> {
        Profile::detect(&self.bytes)
    }

    /// What the key is for, if its encoding is recognised.
    pub fn key_use(&self) -> Option<KeyUse> {
        self.profile().ok().map(|p| p.key_use)
    }

    /// Whether the carried hash really is the hash of the carried bytes.
    pub fn hash_matches(&self) -> bool {
        key_hash(&self.bytes) == self.hash
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}, alias={})", self.hash, self.alias())
    }
}

/// A full key pair. The secret bytes are wiped when dropped.
#[derive(Clone)]
pub struct PrivateKey {
    public: PublicKey,
    private_bytes: Zeroizing<Vec<u8>>,
}

impl PrivateKey {
    pub fn new(public: PublicKey, private_bytes: Vec<u8>) -> Self {
        Self {
            public,
            private_bytes: Zeroizing::new(private_bytes),
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// The encoded secret bytes (profile tag first).
    pub fn private_bytes(&self) -> &[u8] {
        &self.private_bytes
    }

    pub fn hash(&self) -> &str {
        self.public.hash()
    }

    pub fn alias(&self) -> &str {
        self.public.alias()
    }

    pub fn set_alias(&mut self, alias: impl Into<String>) {
        self.public.set_alias(alias);
    }

    /// Relabel and return the key.
    pub fn with_alias(mut self, alias: Option<&str>) -> Self {
        if let Some(alias) = alias {
            self.public.set_alias(alias);
        }
        self
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({:?})", self.public)
    }
}
