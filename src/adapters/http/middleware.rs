use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};

use crate::{adapters::http::app_state::AppState, app_error::AppError};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Rejects requests whose `X-Api-Key` differs from the configured secret.
/// Passes everything through when no secret is configured.
pub async fn require_api_secret(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(secret) = &app_state.config.api_secret {
        let presented = request
            .headers()
            .get(API_KEY_HEADER)
            .map(|v| v.as_bytes())
            .unwrap_or_default();
        let expected = Sha256::digest(secret.expose_secret().as_bytes());
        if Sha256::digest(presented) != expected {
            tracing::debug!(
                header_present = request.headers().contains_key(API_KEY_HEADER),
                "Rejected request with bad api key"
            );
            return Err(AppError::Forbidden);
        }
    }

    Ok(next.run(request).await)
}
