//! Asymmetric key generation, signing, and sealing.
//!
//! Signing keys are Ed25519; the signature covers the profile digest of
//! `domain || message`. Encryption keys are X25519; a message is sealed to a
//! recipient with an ephemeral key agreement, a BLAKE3-derived wrap key, and
//! ChaCha20-Poly1305:
//!
//! ```text
//! sealed = ephemeral_public (32) || nonce (12) || ciphertext+tag
//! wrap   = blake3::derive_key(domain, digest(shared || ephemeral || recipient))
//! ```
//!
//! Generation runs a self-test on every candidate and retries up to
//! [`MAX_KEYGEN_ATTEMPTS`] times before giving up.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey, StaticSecret};

use crate::error::{ForgeError, Result};
use crate::keys::{PrivateKey, PublicKey};
use crate::profile::{raw_key, KeyUse, Profile, RAW_KEY_LEN};

/// Candidate key pairs tried before generation is declared failed.
pub const MAX_KEYGEN_ATTEMPTS: u32 = 8;

const SELF_TEST_MESSAGE: &[u8] = b"trustlog self-test";
const SELF_TEST_BLOCK_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const SEALED_OVERHEAD: usize = RAW_KEY_LEN + NONCE_LEN;

/// Build the deterministic RNG used for seeded derivation.
pub fn seeded_rng(seed: &str) -> ChaCha20Rng {
    let seed: [u8; 32] = Sha256::digest(seed.as_bytes()).into();
    ChaCha20Rng::from_seed(seed)
}

/// Generate a key pair for `profile`, drawing randomness from `rng`.
pub fn generate_key<R: RngCore + CryptoRng>(profile: Profile, rng: &mut R) -> Result<PrivateKey> {
    for attempt in 1..=MAX_KEYGEN_ATTEMPTS {
        let key = match profile.key_use {
            KeyUse::Sign => candidate_sign_key(profile, rng),
            KeyUse::Encrypt => candidate_encrypt_key(profile, rng),
        };
        if self_test(&key) {
            return Ok(key);
        }
        tracing::debug!(profile = profile.domain, attempt, "discarding key pair that failed self-test");
    }
    Err(ForgeError::KeyGenExhausted {
        attempts: MAX_KEYGEN_ATTEMPTS,
    })
}

fn candidate_sign_key<R: RngCore + CryptoRng>(profile: Profile, rng: &mut R) -> PrivateKey {
    let signing_key = SigningKey::generate(rng);
    let public = PublicKey::new(profile.encode(&signing_key.verifying_key().to_bytes()), None);
    PrivateKey::new(public, profile.encode(&signing_key.to_bytes()))
}

fn candidate_encrypt_key<R: RngCore + CryptoRng>(profile: Profile, rng: &mut R) -> PrivateKey {
    let mut secret_bytes = [0u8; RAW_KEY_LEN];
    rng.fill_bytes(&mut secret_bytes);
    let secret = StaticSecret::from(secret_bytes);
    let public = PublicKey::new(profile.encode(X25519PublicKey::from(&secret).as_bytes()), None);
    PrivateKey::new(public, profile.encode(&secret.to_bytes()))
}

fn self_test(key: &PrivateKey) -> bool {
    let Ok(profile) = key.public_key().profile() else {
        return false;
    };
    match profile.key_use {
        KeyUse::Sign => match sign(key.private_bytes(), SELF_TEST_MESSAGE) {
            Ok(sig) => verify(key.public_key().bytes(), SELF_TEST_MESSAGE, &sig),
            Err(_) => false,
        },
        KeyUse::Encrypt => {
            let mut block = [0u8; SELF_TEST_BLOCK_LEN];
            rand::thread_rng().fill_bytes(&mut block);
            encrypt(key.public_key().bytes(), &block)
                .and_then(|sealed| decrypt(key.private_bytes(), &sealed))
                .map(|opened| opened == block)
                .unwrap_or(false)
        }
    }
}

fn signing_input(profile: Profile, message: &[u8]) -> Vec<u8> {
    profile.digest.digest(&[profile.domain.as_bytes(), message])
}

/// Sign `message` with an encoded signing key.
pub fn sign(private_key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let profile = Profile::detect_for(private_key, KeyUse::Sign)?;
    let signing_key = SigningKey::from_bytes(&raw_key(private_key)?);
    let signature = signing_key.sign(&signing_input(profile, message));
    Ok(signature.to_bytes().to_vec())
}

/// Verify a signature. Malformed keys or signatures verify as `false`.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(profile) = Profile::detect_for(public_key, KeyUse::Sign) else {
        return false;
    };
    let Ok(raw) = raw_key(public_key) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&raw) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    verifying_key
        .verify(&signing_input(profile, message), &signature)
        .is_ok()
}

fn wrap_key(profile: Profile, shared: &[u8], ephemeral: &[u8], recipient: &[u8]) -> [u8; 32] {
    let material = profile.digest.digest(&[shared, ephemeral, recipient]);
    blake3::derive_key(profile.domain, &material)
}

/// Seal `plaintext` to the holder of an encoded encryption key.
pub fn encrypt(public_key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let profile = Profile::detect_for(public_key, KeyUse::Encrypt)?;
    let recipient = X25519PublicKey::from(raw_key(public_key)?);

    let ephemeral = EphemeralSecret::random_from_rng(rand::thread_rng());
    let ephemeral_public = X25519PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&recipient);

    let key = wrap_key(
        profile,
        shared.as_bytes(),
        ephemeral_public.as_bytes(),
        recipient.as_bytes(),
    );
    let cipher = ChaCha20Poly1305::new_from_slice(&key)
        .map_err(|e| ForgeError::PrimitiveUnavailable(e.to_string()))?;

    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| ForgeError::EncryptionError(e.to_string()))?;

    let mut sealed = Vec::with_capacity(SEALED_OVERHEAD + ciphertext.len());
    sealed.extend_from_slice(ephemeral_public.as_bytes());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open data sealed by [`encrypt`] with the matching encoded private key.
pub fn decrypt(private_key: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    let profile = Profile::detect_for(private_key, KeyUse::Encrypt)?;
    if sealed.len() < SEALED_OVERHEAD {
        return Err(ForgeError::DecryptionError("sealed data too short".into()));
    }

    let secret = StaticSecret::from(raw_key(private_key)?);
    let recipient = X25519PublicKey::from(&secret);

    let (ephemeral, rest) = sealed.split_at(RAW_KEY_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
    let ephemeral: [u8; RAW_KEY_LEN] = ephemeral
        .try_into()
        .map_err(|_| ForgeError::DecryptionError("bad ephemeral key".into()))?;
    let ephemeral = X25519PublicKey::from(ephemeral);

    let shared = secret.diffie_hellman(&ephemeral);
    let key = wrap_key(profile, shared.as_bytes(), ephemeral.as_bytes(), recipient.as_bytes());
    let cipher = ChaCha20Poly1305::new_from_slice(&key)
        .map_err(|e| ForgeError::PrimitiveUnavailable(e.to_string()))?;

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| ForgeError::DecryptionError(e.to_string()))
}
