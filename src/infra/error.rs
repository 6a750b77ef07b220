use thiserror::Error;

use crate::app_error::AppError;

/// Errors that stop the service from starting.
///
/// Display messages are safe for logs. Debug output carries the `#[source]` chain,
/// which can include the connection string, so log with `%e`.
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("Database connection failed. Check DATABASE_URL and ensure the database is running.")]
    DatabaseConnection(#[source] sqlx::Error),

    #[error("Cipher initialization failed")]
    CipherInit(#[source] AppError),

    #[error("Chat client initialization failed")]
    ChatClient(#[source] AppError),

    #[error("Log file could not be opened")]
    LogFile(#[source] std::io::Error),

    #[error("TCP bind failed")]
    TcpBind(#[source] std::io::Error),

    #[error("Server error")]
    Server(#[source] std::io::Error),
}

impl From<sqlx::Error> for InfraError {
    fn from(e: sqlx::Error) -> Self {
        InfraError::DatabaseConnection(e)
    }
}
