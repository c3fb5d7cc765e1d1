//! Hashing and symmetric ciphers.
//!
//! Initialisation strings of any length are hashed down to the nonce or IV
//! size a mode needs, so callers can use record ids or salts directly.

use aes::{Aes128, Aes192, Aes256};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use md5::Md5;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{ForgeError, Result};

/// Nonce length for AES-GCM, in bytes.
pub const GCM_NONCE_LENGTH: usize = 12;

/// Key and IV length used by the string-keyed CBC helpers, in bytes.
pub const CBC_KEY_LENGTH: usize = 16;

/// Random bits in a generated salt.
pub const SALT_BITS: usize = 320;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// SHA-256 of `seed || data`.
pub fn hash_sha(seed: Option<&[u8]>, data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    if let Some(seed) = seed {
        hasher.update(seed);
    }
    hasher.update(data);
    hasher.finalize().into()
}

/// MD5 of `seed || data`.
pub fn hash_md5(seed: Option<&[u8]>, data: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    if let Some(seed) = seed {
        hasher.update(seed);
    }
    hasher.update(data);
    hasher.finalize().into()
}

/// [`hash_sha`], base64url encoded.
pub fn hash_sha_and_encode(seed: Option<&[u8]>, data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(hash_sha(seed, data))
}

/// [`hash_md5`], base64url encoded.
pub fn hash_md5_and_encode(seed: Option<&[u8]>, data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(hash_md5(seed, data))
}

fn hash_to_16(input: &str) -> [u8; 16] {
    let digest = hash_sha(None, input.as_bytes());
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..16]);
    out
}

fn gcm_nonce(init_vector: &str) -> [u8; GCM_NONCE_LENGTH] {
    let digest = hash_sha(None, init_vector.as_bytes());
    let mut nonce = [0u8; GCM_NONCE_LENGTH];
    nonce.copy_from_slice(&digest[..GCM_NONCE_LENGTH]);
    nonce
}

fn bad_key_len(mode: &str, len: usize) -> ForgeError {
    ForgeError::InvalidKey(format!("{} key of {} bytes", mode, len))
}

/// AES-GCM encrypt. A 16-byte key selects AES-128, a 32-byte key AES-256.
pub fn encrypt_gcm(key: &[u8], init_vector: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
    let nonce = gcm_nonce(init_vector);
    let sealed = match key.len() {
        16 => Aes128Gcm::new_from_slice(key)
            .map_err(|e| ForgeError::PrimitiveUnavailable(e.to_string()))?
            .encrypt(Nonce::from_slice(&nonce), plaintext),
        32 => Aes256Gcm::new_from_slice(key)
            .map_err(|e| ForgeError::PrimitiveUnavailable(e.to_string()))?
            .encrypt(Nonce::from_slice(&nonce), plaintext),
        n => return Err(bad_key_len("AES-GCM", n)),
    };
    sealed.map_err(|e| ForgeError::EncryptionError(e.to_string()))
}

/// AES-GCM decrypt; fails on a bad tag.
pub fn decrypt_gcm(key: &[u8], init_vector: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let nonce = gcm_nonce(init_vector);
    let opened = match key.len() {
        16 => Aes128Gcm::new_from_slice(key)
            .map_err(|e| ForgeError::PrimitiveUnavailable(e.to_string()))?
            .decrypt(Nonce::from_slice(&nonce), ciphertext),
        32 => Aes256Gcm::new_from_slice(key)
            .map_err(|e| ForgeError::PrimitiveUnavailable(e.to_string()))?
            .decrypt(Nonce::from_slice(&nonce), ciphertext),
        n => return Err(bad_key_len("AES-GCM", n)),
    };
    opened.map_err(|e| ForgeError::DecryptionError(e.to_string()))
}

/// GCM-encrypt a string under a secret produced by [`generate_secret`].
pub fn encrypt_string(secret: &str, init_vector: &str, plaintext: &str) -> Result<String> {
    let key = decode_secret(secret)?;
    let sealed = encrypt_gcm(&key, init_vector, plaintext.as_bytes())?;
    Ok(URL_SAFE_NO_PAD.encode(sealed))
}

/// Reverse of [`encrypt_string`].
pub fn decrypt_string(secret: &str, init_vector: &str, ciphertext: &str) -> Result<String> {
    let key = decode_secret(secret)?;
    let sealed = URL_SAFE_NO_PAD
        .decode(ciphertext)
        .map_err(|e| ForgeError::EncodingError(e.to_string()))?;
    let opened = decrypt_gcm(&key, init_vector, &sealed)?;
    String::from_utf8(opened).map_err(|e| ForgeError::EncodingError(e.to_string()))
}

/// AES-128-CBC with PKCS#7 padding; key and IV are hashed from strings.
/// Returns base64url.
pub fn encrypt_cbc(key: &str, init_vector: Option<&str>, plaintext: &[u8]) -> String {
    let key = hash_to_16(key);
    let iv = hash_to_16(init_vector.unwrap_or(""));
    let ciphertext =
        Aes128CbcEnc::new(&key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    URL_SAFE_NO_PAD.encode(ciphertext)
}

/// Reverse of [`encrypt_cbc`].
pub fn decrypt_cbc(key: &str, init_vector: Option<&str>, ciphertext: &str) -> Result<Vec<u8>> {
    let key = hash_to_16(key);
    let iv = hash_to_16(init_vector.unwrap_or(""));
    let ciphertext = URL_SAFE_NO_PAD
        .decode(ciphertext)
        .map_err(|e| ForgeError::EncodingError(e.to_string()))?;
    Aes128CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| ForgeError::DecryptionError("bad CBC padding".into()))
}

/// Raw AES (ECB, PKCS#7) under a 16, 24 or 32 byte key.
pub fn encrypt_aes(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let init = |e: aes::cipher::InvalidLength| ForgeError::PrimitiveUnavailable(e.to_string());
    Ok(match key.len() {
        16 => ecb::Encryptor::<Aes128>::new_from_slice(key)
            .map_err(init)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        24 => ecb::Encryptor::<Aes192>::new_from_slice(key)
            .map_err(init)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        32 => ecb::Encryptor::<Aes256>::new_from_slice(key)
            .map_err(init)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        n => return Err(bad_key_len("AES", n)),
    })
}

/// Reverse of [`encrypt_aes`].
pub fn decrypt_aes(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let init = |e: aes::cipher::InvalidLength| ForgeError::PrimitiveUnavailable(e.to_string());
    let opened = match key.len() {
        16 => ecb::Decryptor::<Aes128>::new_from_slice(key)
            .map_err(init)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        24 => ecb::Decryptor::<Aes192>::new_from_slice(key)
            .map_err(init)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        32 => ecb::Decryptor::<Aes256>::new_from_slice(key)
            .map_err(init)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        n => return Err(bad_key_len("AES", n)),
    };
    opened.map_err(|_| ForgeError::DecryptionError("bad AES padding".into()))
}

/// Generate a fresh AES secret of 128 or 256 bits, base64url encoded.
pub fn generate_secret(bits: u32) -> Result<String> {
    let len = match bits {
        128 => 16,
        256 => 32,
        other => return Err(ForgeError::UnsupportedLevel(other)),
    };
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Decode a secret produced by [`generate_secret`] into key bytes.
pub fn decode_secret(secret: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(secret)
        .map_err(|e| ForgeError::EncodingError(e.to_string()))
}

/// Generate a fresh salt: 320 random bits as uppercase hex.
pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BITS / 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode_upper(bytes)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_aes_and_gcm_roundtrip(
            key in proptest::collection::vec(any::<u8>(), 32),
            plaintext in proptest::collection::vec(any::<u8>(), 0..256),
            iv in "[a-z0-9]{0,24}",
        ) {
            let sealed = encrypt_aes(&key, &plaintext).unwrap();
            prop_assert_eq!(decrypt_aes(&key, &sealed).unwrap(), plaintext.clone());

            let sealed = encrypt_gcm(&key[..16], &iv, &plaintext).unwrap();
            prop_assert_eq!(decrypt_gcm(&key[..16], &iv, &sealed).unwrap(), plaintext);
        }
    }
}
