//! Canned HTTP endpoints to point the load generator at.
//!
//! - `GET /`              -> 200
//! - `GET /status/:code`  -> that status (400 for codes outside 100..=999)
//! - `GET /delay/:ms`     -> 200 after `ms` milliseconds (capped at 60s)
//! - `GET /json-only`     -> 200 when `Content-Type: application/json`, else 415

use std::time::Duration;

use axum::{
    extract::Path,
    http::{header, HeaderMap, StatusCode},
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;

pub const MAX_DELAY_MS: u64 = 60_000;

pub fn router() -> Router {
    Router::new()
        .route("/", get(|| async { StatusCode::OK }))
        .route("/status/:code", get(status))
        .route("/delay/:ms", get(delay))
        .route("/json-only", get(json_only))
        .layer(TraceLayer::new_for_http())
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn delay(Path(ms): Path<u64>) -> StatusCode {
    tokio::time::sleep(Duration::from_millis(ms.min(MAX_DELAY_MS))).await;
    StatusCode::OK
}

async fn json_only(headers: HeaderMap) -> StatusCode {
    match headers.get(header::CONTENT_TYPE) {
        Some(v) if v.as_bytes().starts_with(b"application/json") => StatusCode::OK,
        _ => StatusCode::UNSUPPORTED_MEDIA_TYPE,
    }
}
