use async_trait::async_trait;
use sqlx::{Postgres, Row, Transaction};

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::license::{LicenseStore, LicenseUnitOfWork},
    domain::entities::license_key::{KeyTier, LicenseKey},
};

fn row_to_key(row: sqlx::postgres::PgRow) -> LicenseKey {
    let key: String = row.get("key");
    let tier_raw: String = row.get("tier");
    let tier = tier_raw.parse().unwrap_or_else(|_| {
        tracing::warn!(tier = %tier_raw, "Unknown key tier, treating as free");
        KeyTier::Free
    });
    LicenseKey {
        key,
        expire: row.get("expire"),
        user_id: row.get("user_id"),
        tier,
    }
}

#[async_trait]
impl LicenseStore for PostgresPersistence {
    async fn begin(&self) -> AppResult<Box<dyn LicenseUnitOfWork>> {
        let tx = self.pool.begin().await.map_err(AppError::from)?;
        Ok(Box::new(PgLicenseUnitOfWork { tx }))
    }
}

/// One database transaction. Dropping it without `commit` rolls back.
pub struct PgLicenseUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LicenseUnitOfWork for PgLicenseUnitOfWork {
    async fn lock_user(&mut self, user_id: i64) -> AppResult<()> {
        // released at commit or rollback
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn get_key(&mut self, key: &str) -> AppResult<Option<LicenseKey>> {
        let row = sqlx::query(
            r#"
            SELECT key, expire, user_id, tier
            FROM license_keys
            WHERE key = $1
            FOR UPDATE
            "#,
        )
        .bind(key)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_key))
    }

    async fn put_key(&mut self, record: &LicenseKey) -> AppResult<()> {
        let tier: &str = record.tier.as_ref();
        sqlx::query(
            r#"
            INSERT INTO license_keys (key, expire, user_id, tier)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (key) DO UPDATE
            SET expire = EXCLUDED.expire, user_id = EXCLUDED.user_id, tier = EXCLUDED.tier
            "#,
        )
        .bind(&record.key)
        .bind(record.expire)
        .bind(record.user_id)
        .bind(tier)
        .execute(&mut *self.tx)
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn delete_key(&mut self, key: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM license_keys WHERE key = $1")
            .bind(key)
            .execute(&mut *self.tx)
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_keys(&mut self) -> AppResult<Vec<LicenseKey>> {
        let rows = sqlx::query(
            r#"
            SELECT key, expire, user_id, tier
            FROM license_keys
            ORDER BY expire ASC
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_key).collect())
    }

    async fn delete_expired(&mut self, now: i64) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM license_keys WHERE expire <= $1")
            .bind(now)
            .execute(&mut *self.tx)
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected())
    }

    async fn bound_key(&mut self, user_id: i64) -> AppResult<Option<String>> {
        let row = sqlx::query("SELECT key FROM user_keys WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(AppError::from)?;

        Ok(row.map(|r| r.get("key")))
    }

    async fn bind_key(&mut self, user_id: i64, key: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_keys (user_id, key)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET key = EXCLUDED.key
            "#,
        )
        .bind(user_id)
        .bind(key)
        .execute(&mut *self.tx)
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn last_free_issue(&mut self, user_id: i64) -> AppResult<Option<i64>> {
        let row = sqlx::query("SELECT issued_at FROM free_key_issues WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(AppError::from)?;

        Ok(row.map(|r| r.get("issued_at")))
    }

    async fn record_free_issue(&mut self, user_id: i64, issued_at: i64) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO free_key_issues (user_id, issued_at)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET issued_at = EXCLUDED.issued_at
            "#,
        )
        .bind(user_id)
        .bind(issued_at)
        .execute(&mut *self.tx)
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let this = *self;
        this.tx.commit().await.map_err(AppError::from)
    }
}
