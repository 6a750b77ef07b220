use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};

use crate::app_error::{AppError, AppResult};

const NONCE_LEN: usize = 12;

/// Encrypted verification response as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// base64 of the 12-byte nonce.
    pub iv: String,
    /// base64 of ciphertext with the 16-byte tag appended.
    pub ciphertext: String,
}

/// AES-256-GCM under the key shared with clients. No associated data.
#[derive(Clone)]
pub struct ResponseCipher {
    key: aes_gcm::Key<Aes256Gcm>,
}

impl ResponseCipher {
    pub fn new_from_base64(key_b64: &str) -> AppResult<Self> {
        let raw = general_purpose::STANDARD
            .decode(key_b64.trim().as_bytes())
            .map_err(|e| AppError::Internal(format!("Invalid AES_KEY_B64: {e}")))?;
        if raw.len() != 32 {
            return Err(AppError::Internal(
                "AES_KEY_B64 must decode to 32 bytes".into(),
            ));
        }
        let key = aes_gcm::Key::<Aes256Gcm>::from_slice(&raw);
        Ok(Self { key: *key })
    }

    /// Encrypts under a fresh random nonce.
    pub fn seal(&self, plaintext: &[u8]) -> AppResult<EncryptedEnvelope> {
        let cipher = Aes256Gcm::new(&self.key);
        let nonce_bytes = rand::random::<[u8; NONCE_LEN]>();
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| AppError::Internal(format!("encrypt failed: {e}")))?;
        Ok(EncryptedEnvelope {
            iv: general_purpose::STANDARD.encode(nonce_bytes),
            ciphertext: general_purpose::STANDARD.encode(ciphertext),
        })
    }

    pub fn open(&self, envelope: &EncryptedEnvelope) -> AppResult<Vec<u8>> {
        let nonce_bytes = general_purpose::STANDARD
            .decode(envelope.iv.as_bytes())
            .map_err(|e| AppError::Internal(format!("iv decode failed: {e}")))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(AppError::Internal("iv must be 12 bytes".into()));
        }
        let data = general_purpose::STANDARD
            .decode(envelope.ciphertext.as_bytes())
            .map_err(|e| AppError::Internal(format!("ciphertext decode failed: {e}")))?;
        let cipher = Aes256Gcm::new(&self.key);
        cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), data.as_slice())
            .map_err(|e| AppError::Internal(format!("decrypt failed: {e}")))
    }
}
