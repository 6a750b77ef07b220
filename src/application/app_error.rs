use thiserror::Error;

use crate::domain::entities::key_duration::DurationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found")]
    NotFound,

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    Forbidden,
    InvalidInput,
    NotFound,
    MethodNotAllowed,
    UpstreamError,
    InternalError,
}

impl ErrorCode {
    /// Wire text of the `error` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::InvalidInput => "invalid input",
            ErrorCode::NotFound => "not found",
            ErrorCode::MethodNotAllowed => "method not allowed",
            ErrorCode::UpstreamError => "upstream error",
            ErrorCode::InternalError => "internal error",
        }
    }
}

impl From<DurationError> for AppError {
    fn from(err: DurationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
