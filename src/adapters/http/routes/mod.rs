pub mod license;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::adapters::http::{app_state::AppState, middleware::require_api_secret};

pub fn router(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/check_key", get(license::check_key))
        .route("/verify_access", post(license::verify_access))
        // route_layer: a wrong method still answers 405 without a key
        .route_layer(middleware::from_fn_with_state(app_state, require_api_secret))
}
