use axum::{
    Router,
    http::{self, StatusCode},
    response::Response,
};
use tower_http::{set_header::SetResponseHeaderLayer, timeout::TimeoutLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::{
    adapters::http::{app_error_impl::error_resp, app_state::AppState, routes},
    app_error::ErrorCode,
};

pub fn create_app(app_state: AppState) -> Router {
    let request_timeout = app_state.config.http_request_timeout;

    Router::new()
        .merge(routes::router(app_state.clone()))
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .with_state(app_state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(SetResponseHeaderLayer::if_not_present(
            http::header::X_CONTENT_TYPE_OPTIONS,
            http::HeaderValue::from_static("nosniff"),
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &http::Request<_>| {
                let request_id = Uuid::new_v4();
                tracing::info_span!(
                    "http-request",
                    method = %request.method(),
                    // path only, the query carries the key
                    path = %request.uri().path(),
                    version = ?request.version(),
                    request_id = %request_id
                )
            }),
        )
}

async fn not_found() -> Response {
    error_resp(StatusCode::NOT_FOUND, ErrorCode::NotFound)
}

async fn method_not_allowed() -> Response {
    error_resp(StatusCode::METHOD_NOT_ALLOWED, ErrorCode::MethodNotAllowed)
}
