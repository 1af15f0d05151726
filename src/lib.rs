//! JSON-RPC 2.0 dispatch library.
//!
//! Requests arrive on a byte stream (a socket connection, an HTTP body or
//! CGI stdin), are decoded into an envelope, routed through global and
//! per-command middleware to a registered handler, and answered with exactly
//! one response envelope on the matching writer.

// Core subsystems
pub mod commands;
pub mod dispatch;
pub mod protocol;

// Transports
pub mod cgi;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::ServerConfig;
pub use dispatch::{Context, Dispatcher, HandlerResult, Outcome, Registry};
pub use http::HttpTransport;
pub use lifecycle::Shutdown;
pub use protocol::{ErrorCode, RpcError};
