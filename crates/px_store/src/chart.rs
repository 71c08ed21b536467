//! Chart store: the decrypted local database for the active session.
//!
//! Holds the [`StoreSnapshot`] in memory. `load` decrypts the primary blob
//! with the session's master key (or initialises an empty snapshot on first
//! run); every mutation goes through a single choke point that applies the
//! change, re-exports the sealed bytes and hands them to the persistence
//! coordinator before returning control to the caller.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::info;
use zeroize::Zeroizing;

use px_crypto::{aead, CryptoError, CryptoProvider};

use crate::coordinator::{FlushReport, PersistenceCoordinator};
use crate::error::StoreError;
use crate::models::{Mutation, Query, QueryReply, StoreSnapshot};
use crate::session::SessionStore;
use crate::traits::BlobStorage;

/// AAD binding exported chart bytes to their purpose.
const CHART_AAD: &[u8] = b"px-chart-v1";

/// Smallest possible sealed blob: nonce + tag around an empty plaintext.
const MIN_SEALED_LEN: usize = aead::NONCE_LEN + 16;

#[derive(Clone)]
pub struct ChartStore {
    snapshot: Arc<RwLock<StoreSnapshot>>,
    /// Serializes apply→export→flush so exported bytes can never go
    /// backwards in revision order.
    write_gate: Arc<Mutex<()>>,
    session: SessionStore,
    coordinator: PersistenceCoordinator,
    blobs: Arc<dyn BlobStorage>,
    provider: Arc<dyn CryptoProvider>,
}

impl ChartStore {
    pub fn new(
        session: SessionStore,
        coordinator: PersistenceCoordinator,
        blobs: Arc<dyn BlobStorage>,
        provider: Arc<dyn CryptoProvider>,
    ) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(StoreSnapshot::default())),
            write_gate: Arc::new(Mutex::new(())),
            session,
            coordinator,
            blobs,
            provider,
        }
    }

    /// Load and decrypt the primary blob into memory. No bytes yet means a
    /// fresh account: start from the empty schema.
    ///
    /// A tag mismatch surfaces as [`StoreError::WrongKey`]; a blob too short
    /// to even carry a nonce and tag, or one that decrypts to malformed
    /// JSON, is [`StoreError::CorruptStore`] — the user must not be told to
    /// retry a password that was actually correct.
    pub async fn load(&self) -> Result<(), StoreError> {
        let raw = self.blobs.load_primary().await?;

        let loaded = match raw {
            None => StoreSnapshot::default(),
            Some(raw) => {
                if raw.len() < MIN_SEALED_LEN {
                    return Err(StoreError::CorruptStore(
                        "sealed blob shorter than nonce + tag".into(),
                    ));
                }
                let plaintext = self
                    .session
                    .with_key(|key| {
                        aead::open(key.as_bytes(), &raw, CHART_AAD).map_err(|e| match e {
                            CryptoError::AeadOpen => StoreError::WrongKey,
                            other => StoreError::Crypto(other),
                        })
                    })
                    .await?;
                serde_json::from_slice(&plaintext)
                    .map_err(|e| StoreError::CorruptStore(e.to_string()))?
            }
        };

        let revision = loaded.revision;
        *self.snapshot.write().await = loaded;
        info!(revision, "chart store loaded");
        Ok(())
    }

    /// Serialize the current in-memory state and seal it with the session
    /// key. Nonce freshness makes the bytes non-identical across exports;
    /// they always decrypt to an equivalent snapshot.
    pub async fn export_bytes(&self) -> Result<Vec<u8>, StoreError> {
        let plaintext = {
            let snapshot = self.snapshot.read().await;
            Zeroizing::new(serde_json::to_vec(&*snapshot)?)
        };
        self.session
            .with_key(|key| {
                aead::seal(key.as_bytes(), &plaintext, CHART_AAD, self.provider.as_ref())
                    .map_err(StoreError::Crypto)
            })
            .await
    }

    /// Read against the in-memory snapshot. Requires a live session; callers
    /// coming out of login must gate on `await_ready` first.
    pub async fn query(&self, query: Query) -> Result<QueryReply, StoreError> {
        self.session.ensure_active().await?;
        let snapshot = self.snapshot.read().await;
        Ok(match query {
            Query::Profile => QueryReply::Profile(snapshot.profile.clone()),
            Query::Record { id } => QueryReply::Record(snapshot.records.get(&id).cloned()),
            Query::RecordIds => QueryReply::RecordIds(snapshot.records.keys().cloned().collect()),
        })
    }

    /// Apply a mutation and synchronously flush the re-exported bytes
    /// through the coordinator before returning. No fire-and-forget.
    pub async fn mutate(&self, mutation: Mutation) -> Result<FlushReport, StoreError> {
        self.session.ensure_active().await?;
        let _gate = self.write_gate.lock().await;

        {
            let mut snapshot = self.snapshot.write().await;
            snapshot.apply(mutation);
        }

        let bytes = self.export_bytes().await?;
        self.coordinator.flush(bytes).await
    }

    /// Current in-memory state (cloned). Read side for tests and hosts that
    /// need whole-snapshot access; still session-gated.
    pub async fn snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        self.session.ensure_active().await?;
        Ok(self.snapshot.read().await.clone())
    }

    /// Drop in-memory state (logout, or fresh-account initialisation).
    pub async fn clear(&self) {
        *self.snapshot.write().await = StoreSnapshot::default();
    }
}
