//! Injectable randomness.
//!
//! Every salt, nonce, master key and recovery code in this crate is drawn
//! through [`CryptoProvider`] rather than an ambient RNG, so tests can pin
//! all randomness with [`FixedSeed`].

use std::sync::Mutex;

use rand::rngs::OsRng;
use rand::{RngCore, SeedableRng};

/// Source of cryptographic randomness. Object-safe so it can be shared as
/// `Arc<dyn CryptoProvider>` across the session and credential layers.
pub trait CryptoProvider: Send + Sync {
    fn fill_bytes(&self, dest: &mut [u8]);
}

/// Production provider backed by the operating-system RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl CryptoProvider for OsRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

/// Deterministic provider for tests. Same seed, same byte stream.
///
/// Never use outside tests: nonce reuse under a fixed seed breaks the AEAD.
pub struct FixedSeed {
    rng: Mutex<rand::rngs::StdRng>,
}

impl FixedSeed {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(rand::rngs::StdRng::seed_from_u64(seed)),
        }
    }
}

impl CryptoProvider for FixedSeed {
    fn fill_bytes(&self, dest: &mut [u8]) {
        self.rng
            .lock()
            .expect("FixedSeed mutex poisoned")
            .fill_bytes(dest);
    }
}
