//! Structural checks run before trust validation.
//!
//! These need no chain state. They reject records that are decodable but
//! could never be valid, so the trust validator only sees well-formed input.

use trustlog_forge::Profile;

use crate::error::ValidationError;
use crate::message::{PublicKeyMessage, SecurityCastle, WireMessage};
use crate::revision::{DataMessage, DIGEST_LEN};

/// Validate the structure of a data revision.
///
/// Header-only messages pass: they are trust anchors, not writes.
pub fn validate_data(msg: &DataMessage) -> Result<(), ValidationError> {
    let header = &msg.header;
    if header.payload_type.is_empty() {
        return Err(ValidationError::MissingPayloadType);
    }
    if header.previous_version == Some(header.version) {
        return Err(ValidationError::SelfParent);
    }

    let Some(digest) = &msg.digest else {
        return Ok(());
    };
    if header.signing_key_hash.as_deref().map_or(true, str::is_empty) {
        return Err(ValidationError::MissingSigningKey);
    }
    if digest.digest.len() != DIGEST_LEN {
        return Err(ValidationError::BadDigestLength);
    }
    if digest.signature.is_empty() {
        return Err(ValidationError::MissingSignature);
    }
    if header.encrypt_key_hash.as_deref() == Some("") {
        return Err(ValidationError::MissingEncryptKey);
    }
    Ok(())
}

/// Validate a published public key: known profile and a hash that matches
/// its bytes.
pub fn validate_public_key(msg: &PublicKeyMessage) -> Result<(), ValidationError> {
    Profile::detect(msg.key.bytes()).map_err(|_| ValidationError::InvalidPublicKey)?;
    if !msg.key.hash_matches() {
        return Err(ValidationError::KeyHashMismatch);
    }
    Ok(())
}

/// Validate a castle: it must have an id and at least one holder.
pub fn validate_castle(castle: &SecurityCastle) -> Result<(), ValidationError> {
    if castle.id.is_none() {
        return Err(ValidationError::MissingId);
    }
    if castle.lookup.is_empty() || castle.lookup.values().any(|sealed| sealed.is_empty()) {
        return Err(ValidationError::EmptyCastle);
    }
    Ok(())
}

/// Validate any wire message.
pub fn validate_message(msg: &WireMessage) -> Result<(), ValidationError> {
    match msg {
        WireMessage::Data(m) => validate_data(m),
        WireMessage::PublicKey(m) => validate_public_key(m),
        WireMessage::SecurityCastle(m) => validate_castle(m),
    }
}
