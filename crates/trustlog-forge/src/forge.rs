//! The key forge: pooled key generation plus the primitive surface.
//!
//! Asymmetric generation is slow enough that it should not sit on a request
//! path. The forge keeps a bounded pool per key kind and a set of background
//! tasks that top the pools up, ramping up slowly after start so a fresh
//! process is not flooded with generation work. A consumer pops from the
//! pool and falls back to generating on its own thread when the pool is
//! empty; it never waits on the background tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::anchors;
use crate::asymmetric::{self, generate_key, seeded_rng};
use crate::error::{ForgeError, Result};
use crate::keys::PrivateKey;
use crate::pool::{generation_cap, Pool, PoolSizes};
use crate::profile::{KeyUse, Profile};
use crate::symmetric;

/// Configuration for the forge and its refill tasks.
#[derive(Debug, Clone)]
pub struct ForgeConfig {
    /// Number of background refill tasks started by [`KeyForge::spawn_refill`].
    pub pregen_tasks: usize,
    /// Wait before the refill loop starts counting time.
    pub startup_delay: Duration,
    /// Time after start before any background generation happens.
    pub warmup: Duration,
    /// Sleep between refill cycles unless woken by a pop.
    pub idle_interval: Duration,
    /// First sleep after a failed cycle.
    pub error_backoff_start: Duration,
    /// Backoff ceiling.
    pub error_backoff_max: Duration,
    /// Target fill level per pool.
    pub targets: PoolSizes,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            pregen_tasks: 6,
            startup_delay: Duration::from_secs(2),
            warmup: Duration::from_secs(60),
            idle_interval: Duration::from_secs(4),
            error_backoff_start: Duration::from_millis(500),
            error_backoff_max: Duration::from_secs(4),
            targets: PoolSizes {
                sign64: 80,
                sign128: 80,
                sign256: 20,
                encrypt128: 80,
                encrypt256: 20,
                aes128: 800,
                aes256: 200,
                salt: 800,
            },
        }
    }
}

impl ForgeConfig {
    /// Defaults with every pool disabled; every request generates on demand.
    pub fn no_pregen() -> Self {
        Self {
            targets: PoolSizes::default(),
            ..Self::default()
        }
    }
}

struct Pools {
    sign64: Pool<PrivateKey>,
    sign128: Pool<PrivateKey>,
    sign256: Pool<PrivateKey>,
    encrypt128: Pool<PrivateKey>,
    encrypt256: Pool<PrivateKey>,
    aes128: Pool<String>,
    aes256: Pool<String>,
    salt: Pool<String>,
}

impl Pools {
    fn new(targets: &PoolSizes) -> Self {
        Self {
            sign64: Pool::new(targets.sign64),
            sign128: Pool::new(targets.sign128),
            sign256: Pool::new(targets.sign256),
            encrypt128: Pool::new(targets.encrypt128),
            encrypt256: Pool::new(targets.encrypt256),
            aes128: Pool::new(targets.aes128),
            aes256: Pool::new(targets.aes256),
            salt: Pool::new(targets.salt),
        }
    }

    fn keys(&self, profile: Profile) -> Result<&Pool<PrivateKey>> {
        match (profile.key_use, profile.level) {
            (KeyUse::Sign, 64) => Ok(&self.sign64),
            (KeyUse::Sign, 128) => Ok(&self.sign128),
            (KeyUse::Sign, 256) => Ok(&self.sign256),
            (KeyUse::Encrypt, 128) => Ok(&self.encrypt128),
            (KeyUse::Encrypt, 256) => Ok(&self.encrypt256),
            (_, level) => Err(ForgeError::UnsupportedLevel(level)),
        }
    }

    fn secrets(&self, bits: u32) -> Result<&Pool<String>> {
        match bits {
            128 => Ok(&self.aes128),
            256 => Ok(&self.aes256),
            other => Err(ForgeError::UnsupportedLevel(other)),
        }
    }

    fn sizes(&self) -> PoolSizes {
        PoolSizes {
            sign64: self.sign64.len(),
            sign128: self.sign128.len(),
            sign256: self.sign256.len(),
            encrypt128: self.encrypt128.len(),
            encrypt256: self.encrypt256.len(),
            aes128: self.aes128.len(),
            aes256: self.aes256.len(),
            salt: self.salt.len(),
        }
    }
}

struct Inner {
    config: ForgeConfig,
    pools: Pools,
    wake: Notify,
}

/// Shared handle to a key forge. Cloning is cheap; clones share pools.
#[derive(Clone)]
pub struct KeyForge {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for KeyForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyForge")
            .field("pools", &self.pool_sizes())
            .finish()
    }
}

impl Default for KeyForge {
    fn default() -> Self {
        Self::new(ForgeConfig::default())
    }
}

impl KeyForge {
    /// Create a forge. No background work starts until [`spawn_refill`](Self::spawn_refill).
    pub fn new(config: ForgeConfig) -> Self {
        let pools = Pools::new(&config.targets);
        Self {
            inner: Arc::new(Inner {
                config,
                pools,
                wake: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.inner.config
    }

    /// Snapshot of the current pool sizes.
    pub fn pool_sizes(&self) -> PoolSizes {
        self.inner.pools.sizes()
    }

    fn take_key(&self, profile: Profile, alias: Option<&str>) -> Result<PrivateKey> {
        let key = match self.inner.pools.keys(profile)?.pop() {
            Some(key) => {
                self.inner.wake.notify_one();
                key
            }
            None => generate_key(profile, &mut rand::thread_rng())?,
        };
        Ok(key.with_alias(alias))
    }

    /// A fresh signing key at `level` bits (64, 128 or 256).
    pub fn gen_sign_key(&self, level: u32, alias: Option<&str>) -> Result<PrivateKey> {
        self.take_key(Profile::sign(level)?, alias)
    }

    /// A fresh encryption key at `level` bits (128 or 256).
    pub fn gen_encrypt_key(&self, level: u32, alias: Option<&str>) -> Result<PrivateKey> {
        self.take_key(Profile::encrypt(level)?, alias)
    }

    /// Derive a signing key deterministically from `seed`.
    pub fn gen_sign_key_from_seed(&self, level: u32, seed: &str, alias: Option<&str>) -> Result<PrivateKey> {
        let key = generate_key(Profile::sign(level)?, &mut seeded_rng(seed))?;
        Ok(key.with_alias(alias))
    }

    /// Derive an encryption key deterministically from `seed`.
    pub fn gen_encrypt_key_from_seed(&self, level: u32, seed: &str, alias: Option<&str>) -> Result<PrivateKey> {
        let key = generate_key(Profile::encrypt(level)?, &mut seeded_rng(seed))?;
        Ok(key.with_alias(alias))
    }

    /// A fresh AES secret of 128 or 256 bits, base64url encoded.
    pub fn generate_secret(&self, bits: u32) -> Result<String> {
        match self.inner.pools.secrets(bits)?.pop() {
            Some(secret) => {
                self.inner.wake.notify_one();
                Ok(secret)
            }
            None => symmetric::generate_secret(bits),
        }
    }

    /// A fresh 320-bit salt as uppercase hex.
    pub fn generate_salt(&self) -> String {
        match self.inner.pools.salt.pop() {
            Some(salt) => {
                self.inner.wake.notify_one();
                salt
            }
            None => symmetric::generate_salt(),
        }
    }

    fn add_seed_key(&self, profile: Profile, key: PrivateKey) -> Result<bool> {
        let actual = key.public_key().profile()?;
        if actual != profile {
            return Err(ForgeError::InvalidKey(format!(
                "expected a {} key, got {}",
                profile.domain, actual.domain
            )));
        }
        Ok(self.inner.pools.keys(profile)?.push(key))
    }

    /// Hand an externally produced signing key to the pool. Returns `false`
    /// if the pool is already full.
    pub fn add_seed_sign_key(&self, level: u32, key: PrivateKey) -> Result<bool> {
        self.add_seed_key(Profile::sign(level)?, key)
    }

    /// Hand an externally produced encryption key to the pool.
    pub fn add_seed_encrypt_key(&self, level: u32, key: PrivateKey) -> Result<bool> {
        self.add_seed_key(Profile::encrypt(level)?, key)
    }

    /// The shared public-write anchor.
    pub fn trust_of_public_write(&self) -> Result<&'static PrivateKey> {
        anchors::public_write_key()
    }

    /// The shared public-read anchor.
    pub fn trust_of_public_read(&self) -> Result<&'static PrivateKey> {
        anchors::public_read_key()
    }

    pub fn sign(&self, private_key: &PrivateKey, message: &[u8]) -> Result<Vec<u8>> {
        asymmetric::sign(private_key.private_bytes(), message)
    }

    pub fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
        asymmetric::verify(public_key, message, signature)
    }

    pub fn encrypt(&self, public_key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        asymmetric::encrypt(public_key, plaintext)
    }

    pub fn decrypt(&self, private_key: &PrivateKey, sealed: &[u8]) -> Result<Vec<u8>> {
        asymmetric::decrypt(private_key.private_bytes(), sealed)
    }

    /// Run one refill cycle under `cap`, round-robin across pools, and
    /// return how many items were added to a pool.
    ///
    /// Blocking and CPU bound.
    pub fn refill_once(&self, cap: usize) -> Result<usize> {
        let pools = &self.inner.pools;
        let key_pools = [
            (&pools.sign64, Profile::sign(64)?),
            (&pools.sign128, Profile::sign(128)?),
            (&pools.sign256, Profile::sign(256)?),
            (&pools.encrypt128, Profile::encrypt(128)?),
            (&pools.encrypt256, Profile::encrypt(256)?),
        ];
        let secret_pools = [(&pools.aes128, 128u32), (&pools.aes256, 256u32)];

        let mut key_counts: Vec<usize> = key_pools.iter().map(|(pool, _)| pool.len()).collect();
        let mut secret_counts: Vec<usize> = secret_pools.iter().map(|(pool, _)| pool.len()).collect();
        let mut salt_count = pools.salt.len();

        let mut generated = 0;
        loop {
            let mut progressed = false;
            let mut rng = rand::thread_rng();

            for ((pool, profile), count) in key_pools.iter().zip(key_counts.iter_mut()) {
                if *count < pool.limit(cap) {
                    let key = generate_key(*profile, &mut rng)?;
                    progressed |= Self::fill(pool, key, count, &mut generated);
                }
            }
            if salt_count < pools.salt.limit(cap) {
                let salt = symmetric::generate_salt();
                progressed |= Self::fill(&pools.salt, salt, &mut salt_count, &mut generated);
            }
            for ((pool, bits), count) in secret_pools.iter().zip(secret_counts.iter_mut()) {
                if *count < pool.limit(cap) {
                    let secret = symmetric::generate_secret(*bits)?;
                    progressed |= Self::fill(pool, secret, count, &mut generated);
                }
            }

            if !progressed {
                return Ok(generated);
            }
        }
    }

    /// Push one item, counting it only if it landed. A full pool means
    /// another refill task filled it; stop filling it this cycle.
    fn fill<T>(pool: &Pool<T>, item: T, count: &mut usize, generated: &mut usize) -> bool {
        if pool.push(item) {
            *count += 1;
            *generated += 1;
            true
        } else {
            *count = usize::MAX;
            false
        }
    }

    /// Wait up to `timeout`, returning early if a consumer popped from a pool.
    async fn idle(&self, timeout: Duration) {
        tokio::select! {
            _ = self.inner.wake.notified() => {}
            _ = tokio::time::sleep(timeout) => {}
        }
    }

    async fn refill_loop(self) {
        let config = self.inner.config.clone();
        self.idle(config.startup_delay).await;

        let started = Instant::now();
        let mut backoff = config.error_backoff_start;
        loop {
            let cap = generation_cap(started.elapsed(), config.warmup);
            let outcome = if cap > 0 {
                let forge = self.clone();
                match tokio::task::spawn_blocking(move || forge.refill_once(cap)).await {
                    Ok(result) => result,
                    Err(join_error) => Err(ForgeError::PrimitiveUnavailable(join_error.to_string())),
                }
            } else {
                Ok(0)
            };

            match outcome {
                Ok(generated) => {
                    if generated > 0 {
                        debug!(generated, cap, "refilled key pools");
                    }
                    backoff = config.error_backoff_start;
                    self.idle(config.idle_interval).await;
                }
                Err(error) => {
                    warn!(%error, backoff_ms = backoff.as_millis() as u64, "key pool refill failed");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(config.error_backoff_max);
                }
            }
        }
    }

    /// Start the background refill tasks on the current tokio runtime.
    ///
    /// The tasks run until aborted through the returned handles.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn_refill(&self) -> Vec<JoinHandle<()>> {
        (0..self.inner.config.pregen_tasks.max(1))
            .map(|_| tokio::spawn(self.clone().refill_loop()))
            .collect()
    }
}
