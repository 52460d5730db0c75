//! Public HTTP surface setup.
//!
//! # Responsibilities
//! - Serve the index page (`/`) and heartbeat (`/ping`)
//! - Merge service routes supplied by the caller
//! - Wire up middleware (tracing, request ID, version header, logging)

use axum::{
    http::{HeaderName, HeaderValue},
    middleware,
    response::Html,
    routing::get,
    Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::middleware::log_requests;

/// Response header carrying the service version.
pub const X_APP_VERSION: HeaderName = HeaderName::from_static("x-app-version");

/// Build the public router around the caller's `routes`.
///
/// `routes` must not define `/` or `/ping`.
pub fn public_router(config: &AppConfig, routes: Router) -> Router {
    let page = Html(index_page(&config.name, &config.version));

    let router = Router::new()
        .route("/", get(move || {
            let page = page.clone();
            async move { page }
        }))
        .route("/ping", get(|| async { "." }))
        .merge(routes)
        .layer(middleware::from_fn(log_requests))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    let router = match HeaderValue::from_str(&config.version) {
        Ok(version) => router.layer(SetResponseHeaderLayer::overriding(X_APP_VERSION, version)),
        Err(_) => {
            tracing::warn!(version = %config.version, "Version is not a valid header value");
            router
        }
    };

    router.layer(TraceLayer::new_for_http())
}

fn index_page(name: &str, version: &str) -> String {
    let text = format!("{name} {version}");
    format!(
        "<html><head><title>{text}</title></head>\
         <body><h1 style=\"text-align: center; margin-top: 200px; font-size: 50px;\">{text}</h1></body></html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn config() -> AppConfig {
        AppConfig {
            name: "billing".into(),
            version: "1.2.3".into(),
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn ping_sets_version_and_request_id() {
        let router = public_router(&config(), Router::new());
        let response = router
            .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[&X_APP_VERSION], "1.2.3");
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn client_request_id_is_echoed() {
        let router = public_router(&config(), Router::new());
        let response = router
            .oneshot(
                Request::get("/")
                    .header("x-request-id", "req-7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["x-request-id"], "req-7");
        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("billing 1.2.3"));
    }

    #[tokio::test]
    async fn caller_routes_are_merged() {
        let routes = Router::new().route("/users", get(|| async { "users" }));
        let router = public_router(&config(), routes);
        let response = router
            .oneshot(Request::get("/users").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
