//! In-memory capability implementations.
//!
//! Used by the test suite and by hosts that have not wired real storage yet.
//! `MemoryAccounts` round-trips records through their JSON form so the
//! at-rest serialization is exercised, not bypassed. `MemoryBlobs` can
//! inject load/save delays and sink failures to reproduce the startup race
//! and mirror-permission scenarios.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use px_crypto::UserCredentialRecord;

use crate::traits::{AccountStorage, BlobStorage, Clock, SinkError};

// ── Accounts ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryAccounts {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStorage for MemoryAccounts {
    async fn get(&self, username: &str) -> Result<Option<UserCredentialRecord>, SinkError> {
        let records = self.records.lock().await;
        records
            .get(username)
            .map(|json| serde_json::from_str(json).map_err(|e| SinkError::Io(e.to_string())))
            .transpose()
    }

    async fn put(&self, record: &UserCredentialRecord) -> Result<(), SinkError> {
        let json = serde_json::to_string(record).map_err(|e| SinkError::Io(e.to_string()))?;
        self.records
            .lock()
            .await
            .insert(record.username.clone(), json);
        Ok(())
    }

    async fn exists(&self, username: &str) -> Result<bool, SinkError> {
        Ok(self.records.lock().await.contains_key(username))
    }
}

// ── Blobs ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryBlobs {
    primary: Mutex<Option<Vec<u8>>>,
    mirror: Mutex<Option<Vec<u8>>>,
    mirror_configured: bool,
    fail_primary: AtomicBool,
    fail_mirror: AtomicBool,
    load_delay: Option<Duration>,
    save_delay: Option<Duration>,
}

impl MemoryBlobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mirror(mut self) -> Self {
        self.mirror_configured = true;
        self
    }

    /// Delay `load_primary` — reproduces a slow disk during login.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    /// Delay `save_primary` — widens the window for flush coalescing.
    pub fn with_save_delay(mut self, delay: Duration) -> Self {
        self.save_delay = Some(delay);
        self
    }

    pub fn fail_primary(&self, fail: bool) {
        self.fail_primary.store(fail, Ordering::SeqCst);
    }

    /// Simulate revoked write access on the mirror file.
    pub fn fail_mirror(&self, fail: bool) {
        self.fail_mirror.store(fail, Ordering::SeqCst);
    }

    pub async fn primary_bytes(&self) -> Option<Vec<u8>> {
        self.primary.lock().await.clone()
    }

    pub async fn mirror_bytes(&self) -> Option<Vec<u8>> {
        self.mirror.lock().await.clone()
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobs {
    async fn load_primary(&self) -> Result<Option<Vec<u8>>, SinkError> {
        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.primary.lock().await.clone())
    }

    async fn save_primary(&self, bytes: &[u8]) -> Result<(), SinkError> {
        if let Some(delay) = self.save_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_primary.load(Ordering::SeqCst) {
            return Err(SinkError::Io("primary sink unavailable".into()));
        }
        *self.primary.lock().await = Some(bytes.to_vec());
        Ok(())
    }

    fn has_mirror(&self) -> bool {
        self.mirror_configured
    }

    async fn save_mirror(&self, bytes: &[u8]) -> Result<(), SinkError> {
        if self.fail_mirror.load(Ordering::SeqCst) {
            return Err(SinkError::PermissionDenied);
        }
        *self.mirror.lock().await = Some(bytes.to_vec());
        Ok(())
    }
}

// ── Clock ─────────────────────────────────────────────────────────────────────

/// Manually advanced clock for driving inactivity expiry in tests.
pub struct ManualClock {
    base: Instant,
    offset: StdMutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: StdMutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().expect("ManualClock mutex poisoned");
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().expect("ManualClock mutex poisoned");
        self.base + offset
    }
}
