use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::chat::{KnownUser, KnownUserRepoTrait},
};

#[async_trait]
impl KnownUserRepoTrait for PostgresPersistence {
    async fn remember(&self, user: &KnownUser, joined_at: i64) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO known_users (user_id, username, first_name, joined_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET username = EXCLUDED.username, first_name = EXCLUDED.first_name
            "#,
        )
        .bind(user.user_id)
        .bind(user.username.as_deref())
        .bind(user.first_name.as_deref())
        .bind(joined_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn list_ids(&self) -> AppResult<Vec<i64>> {
        let rows = sqlx::query("SELECT user_id FROM known_users ORDER BY joined_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;

        Ok(rows.into_iter().map(|r| r.get("user_id")).collect())
    }

    async fn count(&self) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM known_users")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;

        Ok(row.get("count"))
    }
}
