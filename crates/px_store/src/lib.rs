//! px_store — session, encrypted chart store and persistence ordering for
//! Praxis Core.
//!
//! # Ordering guarantee
//! The observed failure mode in local-first desktop apps is a login that
//! reports success before the decrypted store has finished loading, so an
//! early reader sees an empty store (and e.g. re-prompts a completed
//! profile). Here that race is structurally impossible:
//! [`credentials::CredentialManager::login`] activates the session, performs
//! the first [`chart::ChartStore::load`] and only then flips the readiness
//! latch and returns. Store-dependent readers gate on
//! [`coordinator::PersistenceCoordinator::await_ready`].
//!
//! # Encryption strategy
//! The chart store is a plain in-memory structure; its exported bytes are
//! sealed with the session's master key (XChaCha20-Poly1305) before they
//! reach durable storage, so the at-rest blob is always encrypted.
//!
//! # Module layout
//! - `traits`      — host capabilities: AccountStorage, BlobStorage, Clock
//! - `session`     — single in-memory session holding the master key
//! - `models`      — chart snapshot, query and mutation types
//! - `chart`       — load/query/mutate/export of the encrypted store
//! - `coordinator` — serialized flushes + per-session readiness latch
//! - `credentials` — account creation, login, recovery, password change
//! - `memory`      — in-memory capability implementations (tests, embedding)
//! - `error`       — unified error type

pub mod chart;
pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod memory;
pub mod models;
pub mod session;
pub mod traits;

pub use chart::ChartStore;
pub use coordinator::{FlushReport, PersistenceCoordinator};
pub use credentials::CredentialManager;
pub use error::StoreError;
pub use session::SessionStore;
