//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → admin endpoint `/metrics` (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows from HTTP headers into dispatch spans
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
