//! # trustlog forge
//!
//! Key material for trustlog: asymmetric sign and encrypt key pairs at fixed
//! security levels, symmetric secrets and salts, and the primitives that use
//! them.
//!
//! ## Profiles
//!
//! | profile     | primitive                          | digest  |
//! |-------------|------------------------------------|---------|
//! | sign-64     | Ed25519                            | SHA-256 |
//! | sign-128    | Ed25519                            | SHA-256 |
//! | sign-256    | Ed25519                            | SHA-512 |
//! | encrypt-128 | X25519 + BLAKE3 + ChaCha20-Poly1305 | SHA-256 |
//! | encrypt-256 | X25519 + BLAKE3 + ChaCha20-Poly1305 | SHA-512 |
//!
//! Every encoded key starts with its profile tag, so a primitive picks the
//! right profile from the key alone.
//!
//! ## Pools
//!
//! [`KeyForge`] keeps bounded pools of pre-generated material and refills
//! them from background tasks (see [`KeyForge::spawn_refill`]).

pub mod anchors;
pub mod asymmetric;
pub mod error;
pub mod forge;
pub mod keys;
pub mod pool;
pub mod profile;
pub mod symmetric;

pub use anchors::{public_read_key, public_write_key, PUBLIC_ANCHOR_SEED};
pub use asymmetric::{decrypt, encrypt, generate_key, seeded_rng, sign, verify};
pub use error::{ForgeError, Result};
pub use forge::{ForgeConfig, KeyForge};
pub use keys::{key_hash, PrivateKey, PublicKey};
pub use pool::{generation_cap, PoolSizes};
pub use profile::{KeyUse, Profile};
