use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::dispatcher::EventSummary;
use crate::lifecycle::CoordinatorState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub name: String,
    pub version: String,
    pub env: String,
    pub state: CoordinatorState,
    pub endpoints: Vec<&'static str>,
    pub async_outstanding: usize,
}

pub async fn get_index(State(state): State<AdminState>) -> Html<String> {
    let mut body = String::from("<h1>Table of contents</h1><ul>");
    body.push_str(r#"<li><a href="/status">Status</a></li>"#);
    body.push_str(r#"<li><a href="/events">Registered events</a></li>"#);
    if state.metrics.is_some() {
        body.push_str(r#"<li><a href="/metrics">Metrics</a></li>"#);
    }
    body.push_str("</ul>");
    Html(body)
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let coordinator_state = *state.coordinator_state.borrow();
    Json(SystemStatus {
        name: state.name.clone(),
        version: state.version.clone(),
        env: state.env.clone(),
        state: coordinator_state,
        endpoints: state.endpoints.iter().map(|kind| kind.name()).collect(),
        async_outstanding: state.dispatcher.tracker().outstanding(),
    })
}

pub async fn get_events(State(state): State<AdminState>) -> Json<Vec<EventSummary>> {
    Json(state.dispatcher.registry().events())
}

pub async fn get_metrics(State(state): State<AdminState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
