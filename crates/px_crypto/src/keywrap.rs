//! Master-key wrapping.
//!
//! Each account owns a single 256-bit master key, generated once and never
//! persisted in cleartext. Two independent AEAD wraps of it are stored in
//! the [`UserCredentialRecord`]: one sealed under the password-derived key,
//! one under the recovery-code-derived key. Both derivations share the
//! account salt, so a password change reseals only the password wrap and
//! leaves the recovery wrap (and the user's recovery code) untouched.
//!
//! Binary fields are serialized as hex (salt, nonce) and base64 (ciphertext)
//! so the record stays readable at the account-storage boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

use crate::aead::{self, NONCE_LEN};
use crate::error::CryptoError;
use crate::kdf::{self, WrappingKey, SALT_LEN};
use crate::provider::CryptoProvider;
use crate::recovery::RecoveryCode;

/// AAD binding wrapped-key ciphertexts to their purpose.
const KEY_WRAP_AAD: &[u8] = b"px-master-key-v1";

/// The per-account symmetric secret. Lives only in memory for the duration
/// of a session; zeroized on drop; masked `Debug`.
#[derive(ZeroizeOnDrop)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    pub fn generate(provider: &dyn CryptoProvider) -> Self {
        let mut bytes = [0u8; 32];
        provider.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(***)")
    }
}

/// One AEAD wrap of the master key: nonce stored beside the ciphertext+tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrappedKey {
    #[serde(with = "hex_array")]
    pub nonce: [u8; NONCE_LEN],
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
}

/// At-rest credential state for one username. Persisted (as a whole record)
/// by the host's account storage; exactly one record per username.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCredentialRecord {
    pub username: String,
    #[serde(with = "hex_array")]
    pub salt: [u8; SALT_LEN],
    pub wrapped_by_password: WrappedKey,
    pub wrapped_by_recovery: WrappedKey,
    pub created_at: DateTime<Utc>,
}

/// Everything produced by account creation. The recovery code exists in
/// cleartext only here, exactly once; the caller owns display-once semantics.
pub struct NewAccount {
    pub record: UserCredentialRecord,
    pub master_key: MasterKey,
    pub recovery_code: RecoveryCode,
}

impl UserCredentialRecord {
    /// Generate a master key, salt and recovery code for a new account and
    /// seal both wraps.
    pub fn create(
        username: &str,
        password: &[u8],
        provider: &dyn CryptoProvider,
    ) -> Result<NewAccount, CryptoError> {
        let master_key = MasterKey::generate(provider);
        let salt = kdf::generate_salt(provider);
        let recovery_code = RecoveryCode::generate(provider);

        let password_key = kdf::derive_wrapping_key(password, &salt)?;
        let recovery_key = kdf::derive_wrapping_key(recovery_code.as_secret_bytes(), &salt)?;

        let record = Self {
            username: username.to_string(),
            salt,
            wrapped_by_password: seal_master_key(&master_key, &password_key, provider)?,
            wrapped_by_recovery: seal_master_key(&master_key, &recovery_key, provider)?,
            created_at: Utc::now(),
        };

        Ok(NewAccount {
            record,
            master_key,
            recovery_code,
        })
    }

    /// Unwrap the master key with the account password.
    /// Tag mismatch (`CryptoError::AeadOpen`) is the only "wrong password"
    /// signal.
    pub fn open_with_password(&self, password: &[u8]) -> Result<MasterKey, CryptoError> {
        let wrapping = kdf::derive_wrapping_key(password, &self.salt)?;
        open_master_key(&self.wrapped_by_password, &wrapping)
    }

    /// Unwrap the master key with the recovery code.
    pub fn open_with_recovery(&self, code: &RecoveryCode) -> Result<MasterKey, CryptoError> {
        let wrapping = kdf::derive_wrapping_key(code.as_secret_bytes(), &self.salt)?;
        open_master_key(&self.wrapped_by_recovery, &wrapping)
    }

    /// Reseal the password wrap under a new password. Same salt, fresh
    /// nonce; the recovery wrap is not touched, so the original recovery
    /// code stays valid.
    pub fn reseal_password_wrap(
        &mut self,
        master_key: &MasterKey,
        new_password: &[u8],
        provider: &dyn CryptoProvider,
    ) -> Result<(), CryptoError> {
        let wrapping = kdf::derive_wrapping_key(new_password, &self.salt)?;
        self.wrapped_by_password = seal_master_key(master_key, &wrapping, provider)?;
        Ok(())
    }

    /// Issue a fresh recovery code and reseal only the recovery wrap.
    ///
    /// The credential flows never call this: a used recovery code remains
    /// valid, matching the observed behavior. Hosts that want a leaked code
    /// to stop working can expose this.
    pub fn rotate_recovery(
        &mut self,
        master_key: &MasterKey,
        provider: &dyn CryptoProvider,
    ) -> Result<RecoveryCode, CryptoError> {
        let code = RecoveryCode::generate(provider);
        let wrapping = kdf::derive_wrapping_key(code.as_secret_bytes(), &self.salt)?;
        self.wrapped_by_recovery = seal_master_key(master_key, &wrapping, provider)?;
        Ok(code)
    }
}

fn seal_master_key(
    master_key: &MasterKey,
    wrapping: &WrappingKey,
    provider: &dyn CryptoProvider,
) -> Result<WrappedKey, CryptoError> {
    let (nonce, ciphertext) = aead::seal_detached(
        wrapping.as_bytes(),
        master_key.as_bytes(),
        KEY_WRAP_AAD,
        provider,
    )?;
    Ok(WrappedKey { nonce, ciphertext })
}

fn open_master_key(wrapped: &WrappedKey, wrapping: &WrappingKey) -> Result<MasterKey, CryptoError> {
    let plaintext = aead::open_detached(
        wrapping.as_bytes(),
        &wrapped.nonce,
        &wrapped.ciphertext,
        KEY_WRAP_AAD,
    )?;
    let bytes: [u8; 32] = plaintext
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidKey("Unwrapped master key wrong length".into()))?;
    Ok(MasterKey(bytes))
}

mod hex_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(v: &[u8; N], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        d: D,
    ) -> Result<[u8; N], D::Error> {
        let raw = String::deserialize(d)?;
        let bytes = hex::decode(&raw).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("unexpected byte-array length"))
    }
}

mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(d)?;
        STANDARD.decode(raw).map_err(serde::de::Error::custom)
    }
}
