//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Install the Prometheus recorder once per process
//! - Run recorder upkeep so histogram buckets do not grow between scrapes
//! - Record dispatch, HTTP and shutdown metrics
//!
//! # Metrics
//! - `appkit_dispatch_total` (counter): dispatches by event, outcome
//! - `appkit_dispatch_duration_seconds` (histogram): fan-out latency by event
//! - `appkit_processor_failures_total` (counter): processor errors by event
//! - `appkit_processor_panics_total` (counter): contained panics by event
//! - `appkit_async_outstanding` (gauge): tracked async dispatches in flight
//! - `appkit_http_requests_total` (counter): public requests by status
//! - `appkit_http_errors_total` (counter): public responses with status >= 500
//! - `appkit_http_request_duration_seconds` (histogram): public request latency
//! - `appkit_http_last_request_timestamp` (gauge): unix time of the last request
//! - `appkit_shutdown_action_duration_seconds` (histogram): per shutdown action
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so library users pay nothing

use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder, or return the one already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = HANDLE.get() {
        return Ok(handle.clone());
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            tracing::info!("Prometheus recorder installed");
            Ok(HANDLE.get_or_init(|| handle).clone())
        }
        // Lost a race with a concurrent init: the winner's handle is the live one.
        Err(e) => HANDLE.get().cloned().ok_or(e),
    }
}

/// Run `handle.run_upkeep()` every `interval` until `stop` is cancelled.
pub fn spawn_upkeep(
    handle: PrometheusHandle,
    interval: Duration,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => handle.run_upkeep(),
            }
        }
        tracing::debug!("Metrics upkeep stopped");
    })
}

pub fn record_dispatch(event: &str, started: Instant, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    metrics::counter!("appkit_dispatch_total", "event" => event.to_string(), "outcome" => outcome)
        .increment(1);
    metrics::histogram!("appkit_dispatch_duration_seconds", "event" => event.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_processor_failure(event: &str) {
    metrics::counter!("appkit_processor_failures_total", "event" => event.to_string()).increment(1);
}

pub fn record_processor_panic(event: &str) {
    metrics::counter!("appkit_processor_panics_total", "event" => event.to_string()).increment(1);
}

pub fn set_async_outstanding(outstanding: usize) {
    metrics::gauge!("appkit_async_outstanding").set(outstanding as f64);
}

pub fn record_http_request(status: u16, started: Instant) {
    metrics::counter!("appkit_http_requests_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("appkit_http_request_duration_seconds")
        .record(started.elapsed().as_secs_f64());
    if status >= 500 {
        metrics::counter!("appkit_http_errors_total").increment(1);
    }
    if let Ok(now) = SystemTime::now().duration_since(UNIX_EPOCH) {
        metrics::gauge!("appkit_http_last_request_timestamp").set(now.as_secs_f64());
    }
}

pub fn record_shutdown_action(action: &str, started: Instant) {
    metrics::histogram!("appkit_shutdown_action_duration_seconds", "action" => action.to_string())
        .record(started.elapsed().as_secs_f64());
}
