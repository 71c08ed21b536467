use thiserror::Error;

use crate::traits::SinkError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Username is already taken")]
    UsernameTaken,

    #[error("No account exists for that username")]
    UserNotFound,

    #[error("Invalid credentials")]
    InvalidCredential,

    #[error("Invalid recovery code")]
    InvalidRecoveryCode,

    #[error("No active session — log in first")]
    NotLoggedIn,

    #[error("Session is locked — unlock with password first")]
    SessionLocked,

    #[error("Store could not be decrypted with the session key")]
    WrongKey,

    #[error("Local store is corrupt: {0}")]
    CorruptStore(String),

    #[error("Permission denied writing to a storage sink")]
    PermissionDenied,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] px_crypto::CryptoError),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("System error: {0}")]
    System(String),
}

impl From<SinkError> for StoreError {
    fn from(e: SinkError) -> Self {
        match e {
            SinkError::PermissionDenied => StoreError::PermissionDenied,
            SinkError::Io(msg) => StoreError::System(msg),
        }
    }
}
