//! px_crypto — Praxis Core cryptographic primitives
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Randomness is injected through [`provider::CryptoProvider`] so that
//!   every salt, nonce and key can be made deterministic under test.
//!
//! # Module layout
//! - `provider` — injectable randomness (OS RNG in production, seeded in tests)
//! - `kdf`      — Argon2id password/recovery-code → wrapping-key derivation
//! - `aead`     — XChaCha20-Poly1305 seal/open helpers
//! - `keywrap`  — master-key generation, per-user credential record, both wraps
//! - `recovery` — one-time recovery code (generate / display / parse)
//! - `error`    — unified error type

pub mod aead;
pub mod error;
pub mod kdf;
pub mod keywrap;
pub mod provider;
pub mod recovery;

pub use error::CryptoError;
pub use keywrap::{MasterKey, UserCredentialRecord, WrappedKey};
pub use provider::CryptoProvider;
pub use recovery::RecoveryCode;
