//! The two well-known anchor keys present in every chain.
//!
//! Both are derived from the fixed seed `"public"`, so every process
//! computes the same pair. They are computed once and cached.

use once_cell::sync::OnceCell;

use crate::asymmetric::{generate_key, seeded_rng};
use crate::error::Result;
use crate::keys::PrivateKey;
use crate::profile::{ENCRYPT_128, SIGN_64};

/// Seed and alias of both anchors.
pub const PUBLIC_ANCHOR_SEED: &str = "public";

static PUBLIC_WRITE: OnceCell<PrivateKey> = OnceCell::new();
static PUBLIC_READ: OnceCell<PrivateKey> = OnceCell::new();

/// The permission-free write role. Anyone can sign with it; objects with
/// no write restriction accept it.
pub fn public_write_key() -> Result<&'static PrivateKey> {
    PUBLIC_WRITE.get_or_try_init(|| {
        generate_key(SIGN_64, &mut seeded_rng(PUBLIC_ANCHOR_SEED))
            .map(|key| key.with_alias(Some(PUBLIC_ANCHOR_SEED)))
    })
}

/// The permission-free read role.
pub fn public_read_key() -> Result<&'static PrivateKey> {
    PUBLIC_READ.get_or_try_init(|| {
        generate_key(ENCRYPT_128, &mut seeded_rng(PUBLIC_ANCHOR_SEED))
            .map(|key| key.with_alias(Some(PUBLIC_ANCHOR_SEED)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::KeyUse;

    #[test]
    fn test_anchors_are_stable() {
        let write = public_write_key().unwrap();
        let again = public_write_key().unwrap();
        assert!(std::ptr::eq(write, again));

        let rederived = generate_key(SIGN_64, &mut seeded_rng(PUBLIC_ANCHOR_SEED)).unwrap();
        assert_eq!(rederived.hash(), write.hash());
        assert_eq!(write.alias(), "public");
    }

    #[test]
    fn test_anchor_uses() {
        assert_eq!(public_write_key().unwrap().public_key().key_use(), Some(KeyUse::Sign));
        assert_eq!(public_read_key().unwrap().public_key().key_use(), Some(KeyUse::Encrypt));
        assert_ne!(public_read_key().unwrap().hash(), public_write_key().unwrap().hash());
    }

    #[test]
    fn test_concurrent_first_use_agrees() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| public_read_key().unwrap().hash().to_string()))
            .collect();
        let hashes: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(hashes.windows(2).all(|w| w[0] == w[1]));
    }
}
