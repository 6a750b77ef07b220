use crate::app_error::{AppError, ErrorCode};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error before it gets converted into a status response.
        match &self {
            AppError::Forbidden | AppError::NotFound => tracing::debug!(error = ?self, "Request rejected"),
            _ => tracing::error!(error = ?self, "Request failed"),
        }

        match self {
            AppError::Forbidden => error_resp(StatusCode::FORBIDDEN, ErrorCode::Forbidden),
            AppError::InvalidInput(_) => error_resp(StatusCode::BAD_REQUEST, ErrorCode::InvalidInput),
            AppError::NotFound => error_resp(StatusCode::NOT_FOUND, ErrorCode::NotFound),
            AppError::Upstream(_) => error_resp(StatusCode::BAD_GATEWAY, ErrorCode::UpstreamError),
            AppError::Database(_) | AppError::Internal(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError)
            }
        }
    }
}

pub fn error_resp(status: StatusCode, code: ErrorCode) -> Response {
    (status, Json(serde_json::json!({ "error": code.as_str() }))).into_response()
}
