use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Classification of a license key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum KeyTier {
    /// Self-service, rate limited by the free-issuance cooldown.
    Free,
    /// Issued by the owner.
    Paid,
}

/// A stored license key record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseKey {
    pub key: String,
    /// Unix seconds after which the key is dead.
    pub expire: i64,
    /// Advisory only, never used for access control.
    pub user_id: Option<i64>,
    pub tier: KeyTier,
}

impl LicenseKey {
    /// `expire > now` is the only validity test.
    pub fn is_live(&self, now: i64) -> bool {
        self.expire > now
    }

    pub fn remaining_secs(&self, now: i64) -> i64 {
        (self.expire - now).max(0)
    }
}

/// Outcome of looking a key up at a given instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyState {
    Valid { tier: KeyTier, expire: i64 },
    /// The key existed but had expired; it was deleted by the lookup.
    Expired { tier: KeyTier },
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCheck {
    /// Unix seconds of the lookup.
    pub checked_at: i64,
    pub state: KeyState,
}

impl KeyCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self.state, KeyState::Valid { .. })
    }

    pub fn tier(&self) -> Option<KeyTier> {
        match self.state {
            KeyState::Valid { tier, .. } | KeyState::Expired { tier } => Some(tier),
            KeyState::Invalid => None,
        }
    }

    pub fn remaining_secs(&self) -> i64 {
        match self.state {
            KeyState::Valid { expire, .. } => (expire - self.checked_at).max(0),
            _ => 0,
        }
    }

    /// `YYYY-MM-DDTHH:MM:SSZ` for valid keys.
    pub fn expires_at_iso(&self) -> Option<String> {
        match self.state {
            KeyState::Valid { expire, .. } => format_unix_utc(expire),
            _ => None,
        }
    }
}

pub fn format_unix_utc(secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

/// First characters of a key, safe to put in logs and chat notices.
pub fn key_hint(key: &str) -> String {
    let prefix: String = key.chars().take(4).collect();
    format!("{prefix}…")
}
