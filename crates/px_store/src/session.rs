//! Session store: in-memory master key unlocked by a successful credential
//! flow.
//!
//! At most one session exists per process. The master key lives only inside
//! [`SessionStore`] and is zeroized when the session ends (logout, inactivity
//! expiry, or process exit). No component reads the key except through
//! `with_key`, whose only caller is the chart store's sealer/loader.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use px_crypto::MasterKey;

use crate::error::StoreError;
use crate::traits::Clock;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

struct ActiveSession {
    username: String,
    key: MasterKey,
    login_at: Instant,
    last_activity: Instant,
}

/// Thread-safe session handle. Cheap to clone (Arc internally).
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<ActiveSession>>>,
    clock: Arc<dyn Clock>,
    timeout: Arc<RwLock<Duration>>,
}

impl SessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
            clock,
            timeout: Arc::new(RwLock::new(DEFAULT_TIMEOUT)),
        }
    }

    /// Establish the session after a successful unwrap. Replaces (and
    /// zeroizes) any previous session.
    pub async fn activate(&self, username: &str, key: MasterKey) {
        let now = self.clock.now();
        let mut guard = self.inner.write().await;
        *guard = Some(ActiveSession {
            username: username.to_string(),
            key,
            login_at: now,
            last_activity: now,
        });
    }

    /// Record activity, pushing the inactivity deadline out.
    pub async fn touch(&self) {
        let now = self.clock.now();
        let mut guard = self.inner.write().await;
        if let Some(ref mut session) = *guard {
            session.last_activity = now;
        }
    }

    /// End the session and zeroize the key. Idempotent.
    pub async fn logout(&self) {
        let mut guard = self.inner.write().await;
        *guard = None;
    }

    /// Inactivity expiry — same effect as logout. Idempotent.
    pub async fn expire(&self) {
        self.logout().await;
    }

    /// Set the inactivity timeout. `Duration::ZERO` disables auto-expiry.
    pub async fn set_timeout(&self, timeout: Duration) {
        *self.timeout.write().await = timeout;
    }

    /// True when no session exists or the inactivity deadline has passed.
    /// A deadline that has passed clears the session as a side effect.
    pub async fn is_locked(&self) -> bool {
        let timeout = *self.timeout.read().await;
        let guard = self.inner.read().await;
        match guard.as_ref() {
            Some(session) => {
                if !timeout.is_zero() {
                    let idle = self.clock.now().saturating_duration_since(session.last_activity);
                    if idle > timeout {
                        drop(guard);
                        self.logout().await;
                        return true;
                    }
                }
                false
            }
            None => true,
        }
    }

    /// Fail unless a live, unexpired session exists.
    pub async fn ensure_active(&self) -> Result<(), StoreError> {
        if self.is_locked().await {
            Err(StoreError::SessionLocked)
        } else {
            Ok(())
        }
    }

    pub async fn current_user(&self) -> Option<String> {
        let guard = self.inner.read().await;
        guard.as_ref().map(|s| s.username.clone())
    }

    pub async fn login_instant(&self) -> Option<Instant> {
        let guard = self.inner.read().await;
        guard.as_ref().map(|s| s.login_at)
    }

    /// Access the master key for one seal/open operation. The sole key
    /// egress point; refuses when locked; touches the activity timer.
    pub async fn with_key<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&MasterKey) -> Result<R, StoreError>,
    {
        if self.is_locked().await {
            return Err(StoreError::SessionLocked);
        }

        let now = self.clock.now();
        let mut guard = self.inner.write().await;
        match guard.as_mut() {
            Some(session) => {
                session.last_activity = now;
                f(&session.key)
            }
            None => Err(StoreError::SessionLocked),
        }
    }
}
