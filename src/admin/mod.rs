//! Administrative/diagnostic surface.
//!
//! Routes:
//! - `/`        table of contents
//! - `/status`  service identity, coordinator state, async work in flight
//! - `/events`  registered events with processor counts
//! - `/metrics` Prometheus exposition (when metrics are enabled)

pub mod handlers;

use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use self::handlers::*;
use crate::dispatcher::Dispatcher;
use crate::lifecycle::CoordinatorState;
use crate::net::EndpointKind;

/// Shared state of the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub name: String,
    pub version: String,
    pub env: String,
    pub endpoints: Vec<EndpointKind>,
    pub dispatcher: Dispatcher,
    pub coordinator_state: watch::Receiver<CoordinatorState>,
    pub metrics: Option<PrometheusHandle>,
}

/// Build the admin router; `routes` are merged in as-is.
pub fn setup_admin_router(state: AdminState, routes: Router) -> Router {
    Router::new()
        .route("/", get(get_index))
        .route("/status", get(get_status))
        .route("/events", get(get_events))
        .route("/metrics", get(get_metrics))
        .with_state(state)
        .merge(routes)
        .layer(TraceLayer::new_for_http())
}
