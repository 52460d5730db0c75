//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Bind listeners → Spawn serve loops → Register shutdown actions
//!         → Dispatch app.started
//!
//! Shutdown (shutdown.rs):
//!     Signal / request / endpoint failure
//!         → every action: grace delay → graceful stop (deadline) → force stop
//!         → drain async dispatches → report failures
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then listeners, then serving
//! - Shutdown actions run concurrently, each with its own deadline
//! - Every failure is collected; none stops another action from running

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{
    ActionOutcome, ActionState, CoordinatorState, RegistrationConflict, ShutdownAction,
    ShutdownCause, ShutdownCoordinator, ShutdownError, ShutdownReport, ShutdownTrigger,
};
pub use startup::{App, AppError, AppStarted, APP_STARTED};
