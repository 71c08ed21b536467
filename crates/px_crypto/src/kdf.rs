//! Key derivation.
//!
//! `derive_wrapping_key` — Argon2id, turns a human secret (password or
//! recovery code) plus a per-user salt into the 32-byte key that seals the
//! master key. Deterministic for a given (secret, salt) pair; the work
//! factor is what resists offline brute force.

use argon2::{Argon2, Params, Version};
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;
use crate::provider::CryptoProvider;

pub const SALT_LEN: usize = 16;

/// 32-byte key derived from a human secret. Only ever used to seal/open the
/// master key, never to encrypt data directly. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct WrappingKey(pub(crate) [u8; 32]);

impl WrappingKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for WrappingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WrappingKey(***)")
    }
}

/// Argon2id parameters — tuned for interactive (desktop) use.
fn argon2_params() -> Params {
    Params::new(
        64 * 1024, // m_cost: 64 MiB
        3,         // t_cost: 3 iterations
        1,         // p_cost: 1 thread
        Some(32),  // output len
    )
    .expect("Static Argon2 params are always valid")
}

/// Derive a wrapping key from a secret + 16-byte salt.
/// The salt is stored alongside the credential record (not secret) and is
/// shared by the password and recovery derivations for the same account.
pub fn derive_wrapping_key(secret: &[u8], salt: &[u8; SALT_LEN]) -> Result<WrappingKey, CryptoError> {
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, argon2_params());
    let mut output = [0u8; 32];
    argon2
        .hash_password_into(secret, salt, &mut output)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(WrappingKey(output))
}

/// Generate a fresh random salt (once per account; never rotated).
pub fn generate_salt(provider: &dyn CryptoProvider) -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    provider.fill_bytes(&mut salt);
    salt
}
