use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;

use super::error::InfraError;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS license_keys (
        key TEXT PRIMARY KEY,
        expire BIGINT NOT NULL,
        user_id BIGINT,
        tier TEXT NOT NULL DEFAULT 'free'
    )",
    "CREATE INDEX IF NOT EXISTS idx_license_keys_expire ON license_keys (expire)",
    "CREATE TABLE IF NOT EXISTS user_keys (
        user_id BIGINT PRIMARY KEY,
        key TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS free_key_issues (
        user_id BIGINT PRIMARY KEY,
        issued_at BIGINT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS known_users (
        user_id BIGINT PRIMARY KEY,
        username TEXT,
        first_name TEXT,
        joined_at BIGINT NOT NULL
    )",
];

pub async fn init_db(
    database_url: &str,
    max_connections: u32,
    connect_timeout: Duration,
) -> Result<PgPool, InfraError> {
    let pool = PgPoolOptions::new()
        .min_connections(2.min(max_connections))
        .max_connections(max_connections)
        .acquire_timeout(connect_timeout)
        .connect(database_url)
        .await?;

    info!("Connected to database!");
    Ok(pool)
}

/// Creates missing tables and indexes. Safe to run on every start.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), InfraError> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database schema ready");
    Ok(())
}
