//! Authenticated Encryption with Associated Data
//!
//! Uses XChaCha20-Poly1305 (192-bit nonce).
//! Key size: 32 bytes.  Nonce: 24 bytes (random, from the provider).
//! Tag: 16 bytes.
//!
//! Two shapes:
//! - detached (`seal_detached` / `open_detached`) — nonce and ciphertext kept
//!   as separate fields, used for the wrapped master key in the credential
//!   record;
//! - combined (`seal` / `open`) — `[ nonce (24) | ciphertext + tag ]`, used
//!   for the exported chart-store blob.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::provider::CryptoProvider;

pub const NONCE_LEN: usize = 24;

/// Encrypt `plaintext`, returning the nonce and ciphertext separately.
/// The nonce is freshly random per call; never reused for the same key.
pub fn seal_detached(
    key: &[u8; 32],
    plaintext: &[u8],
    aad: &[u8],
    provider: &dyn CryptoProvider,
) -> Result<([u8; NONCE_LEN], Vec<u8>), CryptoError> {
    let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::AeadSeal)?;

    let mut nonce = [0u8; NONCE_LEN];
    provider.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::AeadSeal)?;

    Ok((nonce, ciphertext))
}

/// Decrypt a detached (nonce, ciphertext) pair.
/// Tag mismatch is the only failure signal; it does not distinguish a wrong
/// key from a corrupted ciphertext.
pub fn open_detached(
    key: &[u8; 32],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::AeadOpen)?;

    let plaintext = cipher
        .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::AeadOpen)?;

    Ok(Zeroizing::new(plaintext))
}

/// Encrypt into wire format: nonce prepended to ciphertext+tag.
pub fn seal(
    key: &[u8; 32],
    plaintext: &[u8],
    aad: &[u8],
    provider: &dyn CryptoProvider,
) -> Result<Vec<u8>, CryptoError> {
    let (nonce, ciphertext) = seal_detached(key, plaintext, aad, provider)?;
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt wire-format bytes (nonce || ciphertext+tag).
pub fn open(key: &[u8; 32], data: &[u8], aad: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if data.len() < NONCE_LEN {
        return Err(CryptoError::AeadOpen);
    }
    let (nonce_bytes, ct) = data.split_at(NONCE_LEN);
    let nonce: [u8; NONCE_LEN] = nonce_bytes
        .try_into()
        .expect("split_at guarantees the nonce length");
    open_detached(key, &nonce, ct, aad)
}
