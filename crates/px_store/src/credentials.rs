//! Credential orchestration: account creation, login, recovery, password
//! change, logout.
//!
//! Every flow that produces a master key hands it to the session store and
//! completes the first chart load *before* reporting success, so a caller
//! that observes a successful login can never race the store load. Readers
//! still gate on `await_ready` — the latch is flipped here, after the load.

use std::sync::Arc;

use tracing::{info, warn};

use px_crypto::kdf::{self, SALT_LEN};
use px_crypto::{CryptoError, CryptoProvider, RecoveryCode, UserCredentialRecord};

use crate::chart::ChartStore;
use crate::coordinator::{FlushReport, PersistenceCoordinator};
use crate::error::StoreError;
use crate::models::{Mutation, Query, QueryReply};
use crate::session::SessionStore;
use crate::traits::{AccountStorage, BlobStorage, Clock};

/// Salt for the derivation burned on the user-not-found path, so "no such
/// user" and "wrong password" cost the same wall-clock time.
const DUMMY_SALT: [u8; SALT_LEN] = [0x5a; SALT_LEN];

/// The application-facing surface of the core. Cheap to clone.
#[derive(Clone)]
pub struct CredentialManager {
    accounts: Arc<dyn AccountStorage>,
    provider: Arc<dyn CryptoProvider>,
    session: SessionStore,
    chart: ChartStore,
    coordinator: PersistenceCoordinator,
}

impl CredentialManager {
    pub fn new(
        accounts: Arc<dyn AccountStorage>,
        blobs: Arc<dyn BlobStorage>,
        provider: Arc<dyn CryptoProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let session = SessionStore::new(clock);
        let coordinator = PersistenceCoordinator::new(blobs.clone());
        let chart = ChartStore::new(
            session.clone(),
            coordinator.clone(),
            blobs,
            provider.clone(),
        );
        Self {
            accounts,
            provider,
            session,
            chart,
            coordinator,
        }
    }

    /// Create an account, open its session and persist the initial (empty)
    /// chart blob. Returns the one-time recovery code; this is the only
    /// moment it exists in cleartext outside key derivation, and the caller
    /// owns showing it exactly once.
    pub async fn create_account(
        &self,
        username: &str,
        password: &str,
    ) -> Result<RecoveryCode, StoreError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(StoreError::InvalidInput("username must not be empty".into()));
        }
        if password.is_empty() {
            return Err(StoreError::InvalidInput("password must not be empty".into()));
        }
        if self.accounts.exists(username).await? {
            return Err(StoreError::UsernameTaken);
        }

        let account = UserCredentialRecord::create(
            username,
            password.as_bytes(),
            self.provider.as_ref(),
        )?;
        self.accounts.put(&account.record).await?;

        self.coordinator.reset();
        self.session.activate(username, account.master_key).await;
        self.chart.clear().await;

        // The store blob exists from the moment the account does. If the
        // first flush fails the session must not stay half-open with the
        // readiness latch never set.
        if let Err(e) = self.seal_initial_blob().await {
            warn!(user = %username, error = %e, "initial chart flush failed; closing session");
            self.session.logout().await;
            self.chart.clear().await;
            return Err(e);
        }
        self.coordinator.mark_ready();

        info!(user = %username, "account created");
        Ok(account.recovery_code)
    }

    /// Authenticate and open the session. Success is reported only after
    /// the session holds the key and the first chart load has completed.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), StoreError> {
        let Some(record) = self.accounts.get(username).await? else {
            // Same KDF cost as a real attempt; only the message differs.
            let _ = kdf::derive_wrapping_key(password.as_bytes(), &DUMMY_SALT)?;
            return Err(StoreError::UserNotFound);
        };

        let master_key = record
            .open_with_password(password.as_bytes())
            .map_err(credential_error)?;

        self.open_session(username, master_key).await?;
        info!(user = %username, "login successful");
        Ok(())
    }

    /// Reset the password with the one-time recovery code, then open the
    /// session. The recovery wrap itself is not rotated: the same code
    /// remains valid afterwards (use `rotate_recovery_code` to retire it).
    pub async fn recover(
        &self,
        username: &str,
        recovery_code: &str,
        new_password: &str,
    ) -> Result<(), StoreError> {
        let code = RecoveryCode::parse(recovery_code)
            .map_err(|_| StoreError::InvalidRecoveryCode)?;
        if new_password.is_empty() {
            return Err(StoreError::InvalidInput("password must not be empty".into()));
        }

        let Some(mut record) = self.accounts.get(username).await? else {
            let _ = kdf::derive_wrapping_key(code.as_secret_bytes(), &DUMMY_SALT)?;
            return Err(StoreError::UserNotFound);
        };

        let master_key = record.open_with_recovery(&code).map_err(|e| match e {
            CryptoError::AeadOpen => StoreError::InvalidRecoveryCode,
            other => StoreError::Crypto(other),
        })?;

        record.reseal_password_wrap(&master_key, new_password.as_bytes(), self.provider.as_ref())?;
        self.accounts.put(&record).await?;

        self.open_session(username, master_key).await?;
        info!(user = %username, "password reset via recovery code");
        Ok(())
    }

    /// Change the password of the logged-in account. The recovery code is
    /// untouched and stays valid.
    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), StoreError> {
        // A session past its inactivity deadline is no session at all.
        self.session.ensure_active().await?;
        let username = self.session.current_user().await.ok_or(StoreError::NotLoggedIn)?;
        if new_password.is_empty() {
            return Err(StoreError::InvalidInput("password must not be empty".into()));
        }

        let mut record = self
            .accounts
            .get(&username)
            .await?
            .ok_or(StoreError::UserNotFound)?;

        let master_key = record
            .open_with_password(old_password.as_bytes())
            .map_err(credential_error)?;

        record.reseal_password_wrap(&master_key, new_password.as_bytes(), self.provider.as_ref())?;
        self.accounts.put(&record).await?;

        info!(user = %username, "password changed");
        Ok(())
    }

    /// Issue a fresh recovery code for the logged-in account, retiring the
    /// old one. Optional: no credential flow calls this on its own.
    pub async fn rotate_recovery_code(&self) -> Result<RecoveryCode, StoreError> {
        self.session.ensure_active().await?;
        let username = self.session.current_user().await.ok_or(StoreError::NotLoggedIn)?;
        let mut record = self
            .accounts
            .get(&username)
            .await?
            .ok_or(StoreError::UserNotFound)?;

        let provider = self.provider.clone();
        let code = self
            .session
            .with_key(|key| {
                record
                    .rotate_recovery(key, provider.as_ref())
                    .map_err(StoreError::Crypto)
            })
            .await?;
        self.accounts.put(&record).await?;

        info!(user = %username, "recovery code rotated");
        Ok(code)
    }

    /// End the session. Idempotent; an in-flight flush still completes
    /// (durability outranks responsiveness to logout), but no further reads
    /// are served.
    pub async fn logout(&self) {
        self.session.logout().await;
        self.chart.clear().await;
        self.coordinator.reset();
    }

    /// Refresh the inactivity deadline.
    pub async fn touch_activity(&self) {
        self.session.touch().await;
    }

    /// Gate for store-dependent readers; resolves after the current
    /// session's first successful load.
    pub async fn await_ready(&self) -> Result<(), StoreError> {
        self.coordinator.await_ready().await
    }

    pub async fn query(&self, query: Query) -> Result<QueryReply, StoreError> {
        self.chart.query(query).await
    }

    pub async fn mutate(&self, mutation: Mutation) -> Result<FlushReport, StoreError> {
        self.chart.mutate(mutation).await
    }

    pub fn chart(&self) -> &ChartStore {
        &self.chart
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn coordinator(&self) -> &PersistenceCoordinator {
        &self.coordinator
    }

    async fn seal_initial_blob(&self) -> Result<(), StoreError> {
        let bytes = self.chart.export_bytes().await?;
        self.coordinator.flush(bytes).await?;
        Ok(())
    }

    /// Shared tail of every key-producing flow: session first, then the
    /// first load, then the readiness latch, then success.
    async fn open_session(
        &self,
        username: &str,
        master_key: px_crypto::MasterKey,
    ) -> Result<(), StoreError> {
        self.coordinator.reset();
        self.session.activate(username, master_key).await;

        if let Err(e) = self.chart.load().await {
            // A session whose store cannot be trusted is not a session.
            warn!(user = %username, error = %e, "first chart load failed; closing session");
            self.session.logout().await;
            self.chart.clear().await;
            return Err(e);
        }

        self.coordinator.mark_ready();
        Ok(())
    }
}

fn credential_error(e: CryptoError) -> StoreError {
    match e {
        CryptoError::AeadOpen => StoreError::InvalidCredential,
        other => StoreError::Crypto(other),
    }
}
