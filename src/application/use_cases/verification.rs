use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::license::LicenseUseCases,
    domain::entities::license_key::{KeyCheck, KeyState, KeyTier, key_hint},
    infra::crypto::{EncryptedEnvelope, ResponseCipher},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessStatus {
    Ok,
    Expired,
    Invalid,
}

/// Plaintext of a `/verify_access` response before encryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPayload {
    pub status: AccessStatus,
    #[serde(rename = "type")]
    pub tier: Option<KeyTier>,
    pub remaining: i64,
    pub expires_at: Option<String>,
    pub ts: i64,
}

impl From<&KeyCheck> for AccessPayload {
    fn from(check: &KeyCheck) -> Self {
        let status = match check.state {
            KeyState::Valid { .. } => AccessStatus::Ok,
            KeyState::Expired { .. } => AccessStatus::Expired,
            KeyState::Invalid => AccessStatus::Invalid,
        };
        Self {
            status,
            tier: check.tier(),
            remaining: check.remaining_secs(),
            expires_at: check.expires_at_iso(),
            ts: check.checked_at,
        }
    }
}

/// Plain `/check_key` body. `type` is only present for valid keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyCheck {
    pub valid: bool,
    pub remaining: i64,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub tier: Option<KeyTier>,
}

impl From<&KeyCheck> for LegacyCheck {
    fn from(check: &KeyCheck) -> Self {
        match check.state {
            KeyState::Valid { tier, .. } => Self {
                valid: true,
                remaining: check.remaining_secs(),
                tier: Some(tier),
            },
            _ => Self {
                valid: false,
                remaining: 0,
                tier: None,
            },
        }
    }
}

#[derive(Clone)]
pub struct VerificationUseCases {
    license: Arc<LicenseUseCases>,
    cipher: Arc<ResponseCipher>,
}

impl VerificationUseCases {
    pub fn new(license: Arc<LicenseUseCases>, cipher: Arc<ResponseCipher>) -> Self {
        Self { license, cipher }
    }

    /// Looks the key up and returns the outcome encrypted for the client.
    #[instrument(skip(self, key), fields(key = %key_hint(key.trim())))]
    pub async fn verify(&self, key: &str) -> AppResult<EncryptedEnvelope> {
        let check = self.license.check(key).await?;
        let payload = AccessPayload::from(&check);
        info!(status = ?payload.status, "Verification answered");

        let plaintext = serde_json::to_vec(&payload)
            .map_err(|e| AppError::Internal(format!("payload encode failed: {e}")))?;
        self.cipher.seal(&plaintext)
    }

    #[instrument(skip(self, key), fields(key = %key_hint(key.trim())))]
    pub async fn check_legacy(&self, key: &str) -> AppResult<LegacyCheck> {
        let check = self.license.check(key).await?;
        Ok(LegacyCheck::from(&check))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        infra::clock::ManualClock,
        test_utils::{InMemoryLicenseStore, create_test_key, test_aes_key_b64},
    };

    const T0: i64 = 1_700_000_000;

    fn setup() -> (VerificationUseCases, Arc<ResponseCipher>, Arc<InMemoryLicenseStore>) {
        let store = Arc::new(InMemoryLicenseStore::new());
        let clock = Arc::new(ManualClock::at_unix(T0));
        let license = Arc::new(LicenseUseCases::new(store.clone(), clock));
        let cipher = Arc::new(ResponseCipher::new_from_base64(&test_aes_key_b64()).unwrap());
        (
            VerificationUseCases::new(license, cipher.clone()),
            cipher,
            store,
        )
    }

    fn decrypt(cipher: &ResponseCipher, envelope: &EncryptedEnvelope) -> serde_json::Value {
        serde_json::from_slice(&cipher.open(envelope).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn valid_key_decrypts_to_ok_payload() {
        let (uc, cipher, store) = setup();
        store
            .seed_key(create_test_key("AB1?CD", T0 + 3_600, |_| {}))
            .await;

        let envelope = uc.verify("AB1?CD").await.unwrap();
        assert_eq!(
            decrypt(&cipher, &envelope),
            serde_json::json!({
                "status": "ok",
                "type": "free",
                "remaining": 3_600,
                "expires_at": "2023-11-14T23:13:20Z",
                "ts": T0,
            })
        );
    }

    #[tokio::test]
    async fn unknown_key_decrypts_to_invalid_payload() {
        let (uc, cipher, _store) = setup();

        let envelope = uc.verify("ZZZZ1!").await.unwrap();
        assert_eq!(
            decrypt(&cipher, &envelope),
            serde_json::json!({
                "status": "invalid",
                "type": null,
                "remaining": 0,
                "expires_at": null,
                "ts": T0,
            })
        );
    }

    #[tokio::test]
    async fn expired_key_keeps_its_tier_then_disappears() {
        let (uc, cipher, store) = setup();
        store
            .seed_key(create_test_key("AB12$$C", T0, |k| k.tier = KeyTier::Paid))
            .await;

        let first = decrypt(&cipher, &uc.verify("AB12$$C").await.unwrap());
        assert_eq!(first["status"], "expired");
        assert_eq!(first["type"], "paid");
        assert_eq!(first["remaining"], 0);

        let second = decrypt(&cipher, &uc.verify("AB12$$C").await.unwrap());
        assert_eq!(second["status"], "invalid");
        assert!(second["type"].is_null());
    }

    #[tokio::test]
    async fn blank_key_is_invalid() {
        let (uc, cipher, _store) = setup();
        let payload = decrypt(&cipher, &uc.verify("   ").await.unwrap());
        assert_eq!(payload["status"], "invalid");
    }

    #[tokio::test]
    async fn legacy_check_omits_type_unless_valid() {
        let (uc, _cipher, store) = setup();
        store
            .seed_key(create_test_key("AB1?CD", T0 + 10, |_| {}))
            .await;

        let valid = uc.check_legacy("AB1?CD").await.unwrap();
        assert_eq!(
            serde_json::to_value(&valid).unwrap(),
            serde_json::json!({"valid": true, "remaining": 10, "type": "free"})
        );

        let invalid = uc.check_legacy("nope").await.unwrap();
        assert_eq!(
            serde_json::to_value(&invalid).unwrap(),
            serde_json::json!({"valid": false, "remaining": 0})
        );
    }

    #[tokio::test]
    async fn storage_failure_is_an_error_not_an_invalid_answer() {
        let (uc, _cipher, store) = setup();
        store.set_unavailable(true);
        assert!(matches!(
            uc.verify("AB1?CD").await,
            Err(AppError::Database(_))
        ));
    }
}
