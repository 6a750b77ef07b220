use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{adapters::http::app_state::AppState, app_error::AppResult};

#[derive(Debug, Deserialize)]
pub struct CheckKeyQuery {
    #[serde(default)]
    key: String,
}

/// GET /check_key?key=...
pub async fn check_key(
    State(app_state): State<AppState>,
    Query(query): Query<CheckKeyQuery>,
) -> AppResult<impl IntoResponse> {
    let result = app_state
        .verification_use_cases
        .check_legacy(&query.key)
        .await?;
    Ok(Json(result))
}

/// POST /verify_access
///
/// Any body is accepted. Anything that is not a JSON object with a `key` reads as an
/// empty key and gets an encrypted `invalid` answer.
pub async fn verify_access(
    State(app_state): State<AppState>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let key = key_from_body(&body);
    let envelope = app_state.verification_use_cases.verify(&key).await?;
    Ok(Json(envelope))
}

fn key_from_body(body: &[u8]) -> String {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return String::new();
    };
    match value.get("key") {
        Some(Value::String(key)) => key.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
