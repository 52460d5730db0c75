//! Request identification and request-scoped dispatch context.
//!
//! # Responsibilities
//! - Generate a request ID (UUID v4) when the client sent none
//! - Bridge the request ID into a `DispatchContext` for handlers
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The same header name is propagated back on the response

use axum::http::{HeaderMap, HeaderName};
use uuid::Uuid;

use crate::dispatcher::DispatchContext;

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request ID of a request, if present and valid UTF-8.
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
}

/// Dispatch context carrying the request's ID, or a fresh one when the
/// request has none (routes mounted outside the public router).
///
/// ```rust,ignore
/// async fn create_user(State(app): State<AppState>, headers: HeaderMap) -> StatusCode {
///     let ctx = dispatch_context(&headers);
///     app.dispatcher.dispatch(&ctx, "user.created", payload(user)).await?;
/// }
/// ```
pub fn dispatch_context(headers: &HeaderMap) -> DispatchContext {
    let ctx = DispatchContext::background();
    match request_id(headers) {
        Some(id) => ctx.with_request_id(id),
        None => ctx.with_request_id(Uuid::new_v4().to_string()),
    }
}
