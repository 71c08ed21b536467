//! Host-supplied capabilities.
//!
//! The core never touches the filesystem or a database directly. The
//! embedding application provides account-record storage, blob storage for
//! the exported chart bytes (primary sink plus an optional user-chosen
//! mirror file), and a monotonic clock for inactivity timeouts.
//! `memory` ships in-process implementations for tests and early embedding.

use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;

use px_crypto::UserCredentialRecord;

/// Failure of a durable sink. Everything a sink can report collapses to
/// "you may not write here" or an I/O detail string.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Permission denied")]
    PermissionDenied,

    #[error("I/O error: {0}")]
    Io(String),
}

/// Storage for [`UserCredentialRecord`]s, one per username.
/// `put` must be atomic per record.
#[async_trait]
pub trait AccountStorage: Send + Sync {
    async fn get(&self, username: &str) -> Result<Option<UserCredentialRecord>, SinkError>;
    async fn put(&self, record: &UserCredentialRecord) -> Result<(), SinkError>;
    async fn exists(&self, username: &str) -> Result<bool, SinkError>;
}

/// Durable storage for the encrypted chart blob.
///
/// The primary sink is authoritative: its success alone makes a write
/// durable. The mirror is a best-effort copy to a user-chosen external file.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// `None` when no blob has ever been written (fresh account/device).
    async fn load_primary(&self) -> Result<Option<Vec<u8>>, SinkError>;
    async fn save_primary(&self, bytes: &[u8]) -> Result<(), SinkError>;

    /// Whether a mirror file is configured.
    fn has_mirror(&self) -> bool;
    async fn save_mirror(&self, bytes: &[u8]) -> Result<(), SinkError>;
}

/// Monotonic time source, injectable so tests can drive inactivity expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Production clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
