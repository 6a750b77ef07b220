//! Factories for key records.
//!
//! Use the closure parameter to override fields.

use crate::domain::entities::license_key::{KeyTier, LicenseKey};

/// Unbound free key expiring at `expire`.
pub fn create_test_key(
    key: &str,
    expire: i64,
    overrides: impl FnOnce(&mut LicenseKey),
) -> LicenseKey {
    let mut record = LicenseKey {
        key: key.to_string(),
        expire,
        user_id: None,
        tier: KeyTier::Free,
    };
    overrides(&mut record);
    record
}

/// Base64 of a fixed 32-byte response key.
pub fn test_aes_key_b64() -> String {
    use base64::{Engine, engine::general_purpose::STANDARD};
    STANDARD.encode([7u8; 32])
}
