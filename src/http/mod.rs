//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (public endpoint)
//!     → server.rs (Axum router, layers)
//!     → request.rs (request ID, dispatch context)
//!     → middleware.rs (count, time, log)
//!     → caller's routes
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use request::{dispatch_context, request_id, X_REQUEST_ID};
pub use server::{public_router, X_APP_VERSION};
