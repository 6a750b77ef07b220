use std::time::Duration;

use crate::{adapters::persistence::PostgresPersistence, infra::db::init_db};

pub mod app;
pub mod chat_poller;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod setup;
pub mod sweeper;

pub use error::InfraError;

pub async fn postgres_persistence(
    database_url: &str,
    max_connections: u32,
    connect_timeout: Duration,
) -> Result<PostgresPersistence, InfraError> {
    let pool = init_db(database_url, max_connections, connect_timeout).await?;
    Ok(PostgresPersistence::new(pool))
}
