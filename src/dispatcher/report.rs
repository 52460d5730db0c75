//! Crash reporting for contained processor panics.

use std::any::Any;

use crate::dispatcher::event::Event;
use crate::observability::metrics;

/// Details of a processor panic caught at the dispatch boundary.
#[derive(Debug, Clone)]
pub struct PanicReport {
    pub event: Event,
    pub request_id: Option<String>,
    pub message: String,
}

/// Sink for processor panics (crash reporter, alerting, ...).
pub trait PanicReporter: Send + Sync {
    fn report(&self, report: &PanicReport);
}

/// Reports panics as error-level log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPanicReporter;

impl PanicReporter for LogPanicReporter {
    fn report(&self, report: &PanicReport) {
        metrics::record_processor_panic(report.event.as_str());
        tracing::error!(
            event = %report.event,
            request_id = report.request_id.as_deref().unwrap_or("none"),
            panic = %report.message,
            "dispatcher-panic"
        );
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
