//! Persistence coordinator: serialized flushes plus the per-session
//! readiness latch.
//!
//! # Flush serialization
//! Callers drop their exported bytes into a pending slot and then take the
//! flush lock. The single lock holder drains the slot in a loop, so
//! concurrent flushes coalesce to "write the latest state" — at most one
//! write per sink is in flight and partial writes never interleave.
//!
//! # Readiness
//! `await_ready` resolves only after the first successful chart load of the
//! current session. Login flips the latch after that load and before it
//! reports success, which is what makes reading-before-loaded impossible
//! rather than merely unlikely.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::traits::BlobStorage;

/// Outcome of a flush. `Ok` means the primary sink holds the latest bytes
/// handed in (possibly written by a concurrent caller we coalesced with).
/// A mirror failure is carried here, not as `Err`: it is retried on the next
/// flush and never blocks the primary flow.
#[derive(Debug, Default)]
pub struct FlushReport {
    pub mirror_error: Option<String>,
}

#[derive(Clone)]
pub struct PersistenceCoordinator {
    blobs: Arc<dyn BlobStorage>,
    pending: Arc<Mutex<Option<Vec<u8>>>>,
    flush_lock: Arc<Mutex<()>>,
    ready_tx: Arc<watch::Sender<bool>>,
}

impl PersistenceCoordinator {
    pub fn new(blobs: Arc<dyn BlobStorage>) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            blobs,
            pending: Arc::new(Mutex::new(None)),
            flush_lock: Arc::new(Mutex::new(())),
            ready_tx: Arc::new(ready_tx),
        }
    }

    /// Write `bytes` to the primary sink (and mirror, when configured).
    ///
    /// A flush issued while another is in flight supersedes it: the
    /// in-flight holder picks up the newest bytes on its next drain
    /// iteration, or this caller drains them itself once it gets the lock.
    /// Primary failure leaves the bytes pending (retried on the next
    /// mutation) and is returned as the error.
    pub async fn flush(&self, bytes: Vec<u8>) -> Result<FlushReport, StoreError> {
        *self.pending.lock().await = Some(bytes);

        let _guard = self.flush_lock.lock().await;
        let mut report = FlushReport::default();

        loop {
            let batch = self.pending.lock().await.take();
            let Some(batch) = batch else { break };

            if let Err(e) = self.blobs.save_primary(&batch).await {
                // Keep the unwritten state pending so the next mutation
                // retries it, unless a newer flush already replaced it.
                let mut pending = self.pending.lock().await;
                if pending.is_none() {
                    *pending = Some(batch);
                }
                return Err(e.into());
            }
            debug!(bytes = batch.len(), "chart blob flushed to primary sink");

            if self.blobs.has_mirror() {
                match self.blobs.save_mirror(&batch).await {
                    Ok(()) => report.mirror_error = None,
                    Err(e) => {
                        warn!(error = %e, "mirror flush failed; will retry on next mutation");
                        report.mirror_error = Some(e.to_string());
                    }
                }
            }
        }

        Ok(report)
    }

    /// Mark the first load of this session complete.
    pub fn mark_ready(&self) {
        self.ready_tx.send_replace(true);
    }

    /// Drop readiness at logout/expiry; the next session must load first.
    pub fn reset(&self) {
        self.ready_tx.send_replace(false);
    }

    /// Resolve once the current session's first successful load has
    /// completed. Every store-dependent reader calls this before its first
    /// read after login.
    pub async fn await_ready(&self) -> Result<(), StoreError> {
        let mut rx = self.ready_tx.subscribe();
        while !*rx.borrow_and_update() {
            rx.changed()
                .await
                .map_err(|_| StoreError::System("readiness channel closed".into()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::memory::MemoryBlobs;

    #[tokio::test]
    async fn flush_writes_primary_and_mirror() {
        let blobs = Arc::new(MemoryBlobs::new().with_mirror());
        let coordinator = PersistenceCoordinator::new(blobs.clone());

        let report = coordinator.flush(b"v1".to_vec()).await.unwrap();
        assert!(report.mirror_error.is_none());
        assert_eq!(blobs.primary_bytes().await.as_deref(), Some(&b"v1"[..]));
        assert_eq!(blobs.mirror_bytes().await.as_deref(), Some(&b"v1"[..]));
    }

    #[tokio::test]
    async fn mirror_failure_is_reported_not_fatal_and_retried() {
        let blobs = Arc::new(MemoryBlobs::new().with_mirror());
        let coordinator = PersistenceCoordinator::new(blobs.clone());

        blobs.fail_mirror(true);
        let report = coordinator.flush(b"v1".to_vec()).await.unwrap();
        assert!(report.mirror_error.is_some());
        assert_eq!(blobs.primary_bytes().await.as_deref(), Some(&b"v1"[..]));
        assert!(blobs.mirror_bytes().await.is_none());

        blobs.fail_mirror(false);
        let report = coordinator.flush(b"v2".to_vec()).await.unwrap();
        assert!(report.mirror_error.is_none());
        assert_eq!(blobs.mirror_bytes().await.as_deref(), Some(&b"v2"[..]));
    }

    #[tokio::test]
    async fn primary_failure_keeps_bytes_pending_for_retry() {
        let blobs = Arc::new(MemoryBlobs::new());
        let coordinator = PersistenceCoordinator::new(blobs.clone());

        blobs.fail_primary(true);
        assert!(coordinator.flush(b"v1".to_vec()).await.is_err());
        assert!(blobs.primary_bytes().await.is_none());

        blobs.fail_primary(false);
        coordinator.flush(b"v2".to_vec()).await.unwrap();
        assert_eq!(blobs.primary_bytes().await.as_deref(), Some(&b"v2"[..]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_flushes_coalesce_to_the_latest_state() {
        let blobs = Arc::new(MemoryBlobs::new().with_save_delay(Duration::from_millis(5)));
        let coordinator = PersistenceCoordinator::new(blobs.clone());

        let mut handles = Vec::new();
        for i in 0u8..8 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(async move {
                coordinator.flush(vec![i]).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Whatever won, the stored bytes are one caller's complete payload
        // and the final write is the last one drained.
        let stored = blobs.primary_bytes().await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn await_ready_blocks_until_marked() {
        let coordinator = PersistenceCoordinator::new(Arc::new(MemoryBlobs::new()));

        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.await_ready().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        coordinator.mark_ready();
        waiter.await.unwrap().unwrap();

        // Reset drops readiness again.
        coordinator.reset();
        let coordinator2 = coordinator.clone();
        let waiter = tokio::spawn(async move { coordinator2.await_ready().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        coordinator.mark_ready();
        waiter.await.unwrap().unwrap();
    }
}
