//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerConfig (ports, 0 = disabled)
//!     → listener.rs (bind rpc / public http / admin, fail fast)
//!     → ListenerSet (bound sockets)
//!     → lifecycle::startup (one serve loop per endpoint)
//!     → connection.rs (accept, serve, drain or force close)
//! ```
//!
//! # Design Decisions
//! - Sockets are bound before any traffic-serving code runs
//! - Each endpoint is independently optional
//! - Connections are owned by the serve loop, so a forced stop can drop them

pub mod connection;
pub mod listener;

pub use connection::{serve, ConnectionId, ServeControl};
pub use listener::{Acceptor, EndpointKind, ListenerError, ListenerSet};
