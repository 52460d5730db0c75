//! In-process event dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     module → add_processor / add_listener → registry.rs (append, copy-on-write)
//!
//! Request path:
//!     handler → dispatch.rs (snapshot processors)
//!             → [context.rs transaction?] → one task per processor
//!             → wait for all → first observed error
//!
//! Fire-and-forget:
//!     dispatch_async → tracker.rs (counted task) → dispatch
//!
//! Shutdown:
//!     lifecycle → tracker.drain() (waits for in-flight async dispatches)
//! ```
//!
//! # Design Decisions
//! - Panics are contained per processor and sent to a `PanicReporter`
//! - No event is dropped silently on exit: async work is always tracked
//! - A process-wide default instance exists (global.rs) but is injectable

pub mod context;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod global;
pub mod registry;
pub mod report;
pub mod tracker;

pub use context::{DispatchContext, Transaction};
pub use dispatch::Dispatcher;
pub use error::DispatchError;
pub use event::{payload, BoxError, Event, EventListener, Payload, Processor, ProcessorResult};
pub use global::global;
pub use registry::{EventRegistry, EventSummary};
pub use report::{LogPanicReporter, PanicReport, PanicReporter};
pub use tracker::{AsyncTracker, TrackGuard};
