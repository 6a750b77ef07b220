use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use tracing::{info, instrument, warn};

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{
        key_duration::KeyDuration,
        key_format::generate_key,
        license_key::{KeyCheck, KeyState, KeyTier, LicenseKey, key_hint},
    },
    infra::clock::Clock,
};

/// Lifetime of a self-service key.
pub const FREE_KEY_TTL_SECS: i64 = 3_600;
/// Minimum gap between two free issuances for one user, counted from issuance.
pub const FREE_KEY_COOLDOWN_SECS: i64 = 7_200;
const MAX_KEY_ATTEMPTS: usize = 8;

// ============================================================================
// Storage Ports
// ============================================================================

#[async_trait]
pub trait LicenseStore: Send + Sync {
    /// Opens a unit of work. Dropping it without `commit` rolls everything back.
    async fn begin(&self) -> AppResult<Box<dyn LicenseUnitOfWork>>;
}

/// Reads and writes of one logical engine operation.
#[async_trait]
pub trait LicenseUnitOfWork: Send {
    /// Blocks other units of work on the same user until this one ends.
    async fn lock_user(&mut self, user_id: i64) -> AppResult<()>;

    async fn get_key(&mut self, key: &str) -> AppResult<Option<LicenseKey>>;
    async fn put_key(&mut self, record: &LicenseKey) -> AppResult<()>;
    /// Returns whether a record existed.
    async fn delete_key(&mut self, key: &str) -> AppResult<bool>;
    async fn list_keys(&mut self) -> AppResult<Vec<LicenseKey>>;
    async fn delete_expired(&mut self, now: i64) -> AppResult<u64>;

    async fn bound_key(&mut self, user_id: i64) -> AppResult<Option<String>>;
    async fn bind_key(&mut self, user_id: i64, key: &str) -> AppResult<()>;

    async fn last_free_issue(&mut self, user_id: i64) -> AppResult<Option<i64>>;
    async fn record_free_issue(&mut self, user_id: i64, issued_at: i64) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

// ============================================================================
// Outcomes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FreeKeyOutcome {
    /// The user already holds a live key; nothing was written.
    Active { key: String, remaining_secs: i64 },
    Issued { key: String, valid_for_secs: i64 },
    CooldownActive { retry_after_secs: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedKey {
    pub key: String,
    pub user_id: i64,
    pub expire: i64,
    pub valid_for_secs: i64,
}

/// A user's ask for a paid key, handed to the owner for pricing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    pub user_id: i64,
    pub duration_secs: i64,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyStats {
    pub free_keys: usize,
    pub paid_keys: usize,
    pub purged: u64,
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct LicenseUseCases {
    store: Arc<dyn LicenseStore>,
    clock: Arc<dyn Clock>,
}

impl LicenseUseCases {
    pub fn new(store: Arc<dyn LicenseStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    #[instrument(skip(self))]
    pub async fn request_free_key(&self, user_id: i64) -> AppResult<FreeKeyOutcome> {
        let now = self.clock.unix_now();
        let mut uow = self.store.begin().await?;
        uow.lock_user(user_id).await?;

        if let Some(bound) = uow.bound_key(user_id).await? {
            match uow.get_key(&bound).await? {
                Some(record) if record.is_live(now) => {
                    uow.commit().await?;
                    return Ok(FreeKeyOutcome::Active {
                        remaining_secs: record.remaining_secs(now),
                        key: record.key,
                    });
                }
                Some(_) => {
                    uow.delete_key(&bound).await?;
                }
                None => {}
            }
        }

        if let Some(issued_at) = uow.last_free_issue(user_id).await? {
            let passed = now - issued_at;
            if passed < FREE_KEY_COOLDOWN_SECS {
                uow.commit().await?;
                return Ok(FreeKeyOutcome::CooldownActive {
                    retry_after_secs: FREE_KEY_COOLDOWN_SECS - passed,
                });
            }
        }

        let key = fresh_key(uow.as_mut(), KeyTier::Free, now).await?;
        let record = LicenseKey {
            key,
            expire: now + FREE_KEY_TTL_SECS,
            user_id: Some(user_id),
            tier: KeyTier::Free,
        };
        uow.put_key(&record).await?;
        uow.bind_key(user_id, &record.key).await?;
        uow.record_free_issue(user_id, now).await?;
        uow.commit().await?;

        info!(user_id, key = %key_hint(&record.key), "Issued free key");
        Ok(FreeKeyOutcome::Issued {
            key: record.key,
            valid_for_secs: FREE_KEY_TTL_SECS,
        })
    }

    /// Validates a requested paid duration. Storage is untouched until the owner
    /// completes the purchase with [`Self::admin_issue_key`].
    #[instrument(skip(self))]
    pub async fn request_paid_key(
        &self,
        user_id: i64,
        duration: KeyDuration,
    ) -> AppResult<PurchaseRequest> {
        let now = self.clock.now_utc().with_timezone(&Local);
        let duration_secs = duration.resolve_secs(&now)?;
        Ok(PurchaseRequest {
            user_id,
            duration_secs,
            label: duration.to_string(),
        })
    }

    #[instrument(skip(self))]
    pub async fn admin_issue_key(
        &self,
        target_user_id: i64,
        duration: KeyDuration,
    ) -> AppResult<IssuedKey> {
        let now_utc = self.clock.now_utc();
        let valid_for_secs = duration.resolve_secs(&now_utc.with_timezone(&Local))?;
        let now = now_utc.timestamp();
        let expire = now
            .checked_add(valid_for_secs)
            .ok_or_else(|| AppError::InvalidInput("Duration is too long".into()))?;

        let mut uow = self.store.begin().await?;
        uow.lock_user(target_user_id).await?;
        let key = fresh_key(uow.as_mut(), KeyTier::Paid, now).await?;
        let record = LicenseKey {
            key,
            expire,
            user_id: Some(target_user_id),
            tier: KeyTier::Paid,
        };
        uow.put_key(&record).await?;
        uow.bind_key(target_user_id, &record.key).await?;
        uow.commit().await?;

        info!(
            user_id = target_user_id,
            key = %key_hint(&record.key),
            valid_for_secs,
            "Issued paid key"
        );
        Ok(IssuedKey {
            key: record.key,
            user_id: target_user_id,
            expire: record.expire,
            valid_for_secs,
        })
    }

    /// Deletes the key record. Bindings pointing at it are left to miss on lookup.
    #[instrument(skip(self, key), fields(key = %key_hint(key.trim())))]
    pub async fn admin_revoke_key(&self, key: &str) -> AppResult<bool> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(false);
        }
        let mut uow = self.store.begin().await?;
        let existed = uow.delete_key(key).await?;
        uow.commit().await?;
        if existed {
            info!("Revoked key");
        }
        Ok(existed)
    }

    /// Looks a key up, deleting it when it is found expired.
    #[instrument(skip(self, key), fields(key = %key_hint(key.trim())))]
    pub async fn check(&self, key: &str) -> AppResult<KeyCheck> {
        let key = key.trim();
        let checked_at = self.clock.unix_now();
        if key.is_empty() {
            return Ok(KeyCheck {
                checked_at,
                state: KeyState::Invalid,
            });
        }

        let mut uow = self.store.begin().await?;
        let state = match uow.get_key(key).await? {
            None => KeyState::Invalid,
            Some(record) if record.is_live(checked_at) => KeyState::Valid {
                tier: record.tier,
                expire: record.expire,
            },
            Some(record) => {
                uow.delete_key(key).await?;
                KeyState::Expired { tier: record.tier }
            }
        };
        uow.commit().await?;

        Ok(KeyCheck { checked_at, state })
    }

    /// Live keys ordered by expiry. Expired records seen on the way are purged.
    #[instrument(skip(self))]
    pub async fn list_active_keys(&self) -> AppResult<Vec<LicenseKey>> {
        let (keys, _) = self.purge_and_list().await?;
        Ok(keys)
    }

    pub async fn stats(&self) -> AppResult<KeyStats> {
        let (keys, purged) = self.purge_and_list().await?;
        let free_keys = keys.iter().filter(|k| k.tier == KeyTier::Free).count();
        Ok(KeyStats {
            free_keys,
            paid_keys: keys.len() - free_keys,
            purged,
        })
    }

    #[instrument(skip(self))]
    pub async fn sweep_expired(&self) -> AppResult<u64> {
        let now = self.clock.unix_now();
        let mut uow = self.store.begin().await?;
        let purged = uow.delete_expired(now).await?;
        uow.commit().await?;
        Ok(purged)
    }

    async fn purge_and_list(&self) -> AppResult<(Vec<LicenseKey>, u64)> {
        let now = self.clock.unix_now();
        let mut uow = self.store.begin().await?;
        let purged = uow.delete_expired(now).await?;
        let mut keys = uow.list_keys().await?;
        uow.commit().await?;

        keys.retain(|k| k.is_live(now));
        keys.sort_by(|a, b| a.expire.cmp(&b.expire).then_with(|| a.key.cmp(&b.key)));
        Ok((keys, purged))
    }
}

/// Draws keys until one does not collide with a live record.
async fn fresh_key(
    uow: &mut dyn LicenseUnitOfWork,
    tier: KeyTier,
    now: i64,
) -> AppResult<String> {
    for _ in 0..MAX_KEY_ATTEMPTS {
        let candidate = generate_key(tier, &mut rand::thread_rng());
        match uow.get_key(&candidate).await? {
            Some(existing) if existing.is_live(now) => {
                warn!(key = %key_hint(&candidate), "Generated key collides with a live key");
            }
            _ => return Ok(candidate),
        }
    }
    Err(AppError::Internal(format!(
        "no unused {tier} key after {MAX_KEY_ATTEMPTS} attempts"
    )))
}
