//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → DispatchConfig handed to the Dispatcher at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    DispatchConfig, HttpConfig, ListenerConfig, LogFormat, MiddlewareFailure,
    ObservabilityConfig, ServerConfig, SocketFamily, TlsConfig, TransportKind,
};
pub use validation::{validate_config, ValidationError};
