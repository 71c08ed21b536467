//! One-time recovery code.
//!
//! A 128-bit random value issued once at account creation and shown to the
//! user exactly once, formatted as eight dash-separated groups of four
//! uppercase hex characters (`XXXX-XXXX-…`). Only the wrap derived from it
//! is ever persisted; the code itself is never stored or logged.

use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;
use crate::provider::CryptoProvider;

pub const RECOVERY_CODE_LEN: usize = 16;
const GROUP_LEN: usize = 4;

/// In-memory recovery code. Zeroized on drop; masked `Debug`.
#[derive(ZeroizeOnDrop)]
pub struct RecoveryCode([u8; RECOVERY_CODE_LEN]);

impl RecoveryCode {
    /// Generate a fresh 128-bit code from the provider.
    pub fn generate(provider: &dyn CryptoProvider) -> Self {
        let mut bytes = [0u8; RECOVERY_CODE_LEN];
        provider.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// The raw bytes, used as KDF input for the recovery wrap.
    pub fn as_secret_bytes(&self) -> &[u8; RECOVERY_CODE_LEN] {
        &self.0
    }

    /// Display form: `XXXX-XXXX-XXXX-XXXX-XXXX-XXXX-XXXX-XXXX`.
    /// The caller shows this once and must not retain it.
    pub fn display_grouped(&self) -> String {
        let raw = hex::encode_upper(self.0);
        raw.as_bytes()
            .chunks(GROUP_LEN)
            .map(|g| std::str::from_utf8(g).expect("hex output is ASCII"))
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Parse user input back into a code. Dashes, whitespace and lowercase
    /// are tolerated; anything else is a format error.
    pub fn parse(input: &str) -> Result<Self, CryptoError> {
        let compact: String = input
            .chars()
            .filter(|c| !matches!(c, '-' | ' ' | '\t'))
            .collect();
        if compact.len() != RECOVERY_CODE_LEN * 2 {
            return Err(CryptoError::RecoveryCodeFormat);
        }
        let bytes = hex::decode(&compact).map_err(|_| CryptoError::RecoveryCodeFormat)?;
        let arr: [u8; RECOVERY_CODE_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::RecoveryCodeFormat)?;
        Ok(Self(arr))
    }
}

impl std::fmt::Debug for RecoveryCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RecoveryCode(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{FixedSeed, OsRandom};

    #[test]
    fn display_parse_roundtrip() {
        let code = RecoveryCode::generate(&OsRandom);
        let shown = code.display_grouped();
        assert_eq!(shown.len(), 32 + 7); // 32 hex chars + 7 dashes
        let parsed = RecoveryCode::parse(&shown).unwrap();
        assert_eq!(parsed.as_secret_bytes(), code.as_secret_bytes());
    }

    #[test]
    fn parse_tolerates_lowercase_and_spacing() {
        let code = RecoveryCode::generate(&FixedSeed::new(1));
        let sloppy = code.display_grouped().to_lowercase().replace('-', " ");
        let parsed = RecoveryCode::parse(&sloppy).unwrap();
        assert_eq!(parsed.as_secret_bytes(), code.as_secret_bytes());
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(RecoveryCode::parse("").is_err());
        assert!(RecoveryCode::parse("XXXX-XXXX").is_err());
        assert!(RecoveryCode::parse(&"G".repeat(32)).is_err()); // not hex
    }

    #[test]
    fn generated_codes_differ() {
        let a = RecoveryCode::generate(&OsRandom);
        let b = RecoveryCode::generate(&OsRandom);
        assert_ne!(a.as_secret_bytes(), b.as_secret_bytes());
    }
}
