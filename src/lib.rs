//! Service scaffolding: in-process event dispatch and coordinated shutdown.

pub mod admin;
pub mod config;
pub mod dispatcher;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::AppConfig;
pub use dispatcher::{DispatchContext, Dispatcher, Event, Processor};
pub use lifecycle::{App, ShutdownAction, ShutdownCoordinator};
