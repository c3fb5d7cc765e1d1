//! Parameter profiles for each (operation, security level) pair.
//!
//! Signing is offered at 64, 128 and 256 bits and encryption at 128 and
//! 256 bits. Every encoded key starts with the tag of the profile that
//! produced it, so the profile of a key handed back to the forge is
//! recovered from its first byte.
//!
//! | profile     | tag  | digest  |
//! |-------------|------|---------|
//! | sign-64     | 0x40 | SHA-256 |
//! | sign-128    | 0x41 | SHA-256 |
//! | sign-256    | 0x42 | SHA-512 |
//! | encrypt-128 | 0x50 | SHA-256 |
//! | encrypt-256 | 0x51 | SHA-512 |

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use crate::error::{ForgeError, Result};

/// Length of the raw curve key material behind every profile.
pub const RAW_KEY_LEN: usize = 32;

/// Length of an encoded key: tag byte plus raw key material.
pub const ENCODED_KEY_LEN: usize = RAW_KEY_LEN + 1;

/// What a key pair is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyUse {
    /// Ed25519 signing.
    Sign,
    /// X25519 sealing.
    Encrypt,
}

/// The digest a profile mixes into its primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestKind {
    Sha256,
    Sha512,
}

impl DigestKind {
    /// Hash the concatenation of `parts`.
    pub fn digest(self, parts: &[&[u8]]) -> Vec<u8> {
        match self {
            DigestKind::Sha256 => {
                let mut hasher = Sha256::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().to_vec()
            }
            DigestKind::Sha512 => {
                let mut hasher = Sha512::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().to_vec()
            }
        }
    }
}

/// A fixed parameter set for one (operation, level) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Profile {
    pub key_use: KeyUse,
    pub level: u32,
    pub tag: u8,
    pub digest: DigestKind,
    /// Domain separation string for signatures and key derivation.
    pub domain: &'static str,
}

pub const SIGN_64: Profile = Profile {
    key_use: KeyUse::Sign,
    level: 64,
    tag: 0x40,
    digest: DigestKind::Sha256,
    domain: "trustlog-sign-64-v0",
};

pub const SIGN_128: Profile = Profile {
    key_use: KeyUse::Sign,
    level: 128,
    tag: 0x41,
    digest: DigestKind::Sha256,
    domain: "trustlog-sign-128-v0",
};

pub const SIGN_256: Profile = Profile {
    key_use: KeyUse::Sign,
    level: 256,
    tag: 0x42,
    digest: DigestKind::Sha512,
    domain: "trustlog-sign-256-v0",
};

pub const ENCRYPT_128: Profile = Profile {
    key_use: KeyUse::Encrypt,
    level: 128,
    tag: 0x50,
    digest: DigestKind::Sha256,
    domain: "trustlog-encrypt-128-v0",
};

pub const ENCRYPT_256: Profile = Profile {
    key_use: KeyUse::Encrypt,
    level: 256,
    tag: 0x51,
    digest: DigestKind::Sha512,
    domain: "trustlog-encrypt-256-v0",
};

/// All profiles, signing first.
pub const PROFILES: [Profile; 5] = [SIGN_64, SIGN_128, SIGN_256, ENCRYPT_128, ENCRYPT_256];

impl Profile {
    /// The signing profile for `level`.
    pub fn sign(level: u32) -> Result<Self> {
        match level {
            64 => Ok(SIGN_64),
            128 => Ok(SIGN_128),
            256 => Ok(SIGN_256),
            other => Err(ForgeError::UnsupportedLevel(other)),
        }
    }

    /// The encryption profile for `level`.
    pub fn encrypt(level: u32) -> Result<Self> {
        match level {
            128 => Ok(ENCRYPT_128),
            256 => Ok(ENCRYPT_256),
            other => Err(ForgeError::UnsupportedLevel(other)),
        }
    }

    /// Look up a profile by its tag byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        PROFILES.iter().copied().find(|p| p.tag == tag)
    }

    /// Select the profile of an encoded key.
    pub fn detect(key: &[u8]) -> Result<Self> {
        if key.len() != ENCODED_KEY_LEN {
            return Err(ForgeError::InvalidKey(format!(
                "expected {} bytes, got {}",
                ENCODED_KEY_LEN,
                key.len()
            )));
        }
        Self::from_tag(key[0])
            .ok_or_else(|| ForgeError::InvalidKey(format!("unknown profile tag {:#04x}", key[0])))
    }

    /// Select the profile of an encoded key, requiring a particular use.
    pub fn detect_for(key: &[u8], key_use: KeyUse) -> Result<Self> {
        let profile = Self::detect(key)?;
        if profile.key_use != key_use {
            return Err(ForgeError::InvalidKey(format!(
                "{:?} key used for {:?}",
                profile.key_use, key_use
            )));
        }
        Ok(profile)
    }

    /// Prefix raw key material with this profile's tag.
    pub fn encode(&self, raw: &[u8; RAW_KEY_LEN]) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENCODED_KEY_LEN);
        out.push(self.tag);
        out.extend_from_slice(raw);
        out
    }
}

/// Strip the tag from an encoded key.
pub(crate) fn raw_key(key: &[u8]) -> Result<[u8; RAW_KEY_LEN]> {
    key.get(1..)
        .and_then(|raw| raw.try_into().ok())
        .ok_or_else(|| ForgeError::InvalidKey("truncated key".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_resolve() {
        assert_eq!(Profile::sign(64).unwrap(), SIGN_64);
        assert_eq!(Profile::sign(256).unwrap().digest, DigestKind::Sha512);
        assert_eq!(Profile::encrypt(128).unwrap(), ENCRYPT_128);
        assert!(matches!(Profile::sign(512), Err(ForgeError::UnsupportedLevel(512))));
        assert!(matches!(Profile::encrypt(64), Err(ForgeError::UnsupportedLevel(64))));
    }

    #[test]
    fn test_detect_by_tag() {
        let encoded = SIGN_128.encode(&[7u8; RAW_KEY_LEN]);
        assert_eq!(Profile::detect(&encoded).unwrap(), SIGN_128);
        assert!(Profile::detect_for(&encoded, KeyUse::Encrypt).is_err());

        let mut bogus = encoded.clone();
        bogus[0] = 0x99;
        assert!(Profile::detect(&bogus).is_err());
        assert!(Profile::detect(&encoded[..10]).is_err());
    }

    #[test]
    fn test_digest_lengths() {
        assert_eq!(DigestKind::Sha256.digest(&[b"a", b"b"]).len(), 32);
        assert_eq!(DigestKind::Sha512.digest(&[b"ab"]).len(), 64);
        assert_eq!(
            DigestKind::Sha256.digest(&[b"a", b"b"]),
            DigestKind::Sha256.digest(&[b"ab"])
        );
    }
}
