//! Request logging and metrics for the public surface.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};

use crate::http::request::request_id;
use crate::observability::metrics;

/// Count, time and log every request; server errors are logged at error level.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let id = request_id(request.headers()).unwrap_or("unknown").to_string();

    let response = next.run(request).await;

    let status = response.status();
    metrics::record_http_request(status.as_u16(), started);
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if status.is_server_error() {
        tracing::error!(
            request_id = %id,
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            elapsed_ms,
            "Request failed"
        );
    } else {
        tracing::info!(
            request_id = %id,
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            elapsed_ms,
            "Request served"
        );
    }

    response
}
