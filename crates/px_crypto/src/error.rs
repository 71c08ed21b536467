use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("AEAD encryption failed")]
    AeadSeal,

    #[error("AEAD decryption failed (authentication tag mismatch)")]
    AeadOpen,

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Recovery code is not in the expected XXXX-XXXX-… format")]
    RecoveryCodeFormat,

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}
