//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → App::new (binds listeners, sizes shutdown deadlines)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; endpoints are created once per process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A port of 0 disables an endpoint; it never means "ephemeral port"

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{AppConfig, ListenerConfig, ObservabilityConfig, ShutdownConfig};
pub use validation::{validate_config, ValidationError};
