//! HTTP transport adapter.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, tower-http layers)
//!     → request.rs (request ID generation)
//!     → rpc_handler (body bytes + side-channel data)
//!     → Dispatcher::execute_with_data
//!     → JSON body back to the client (204 when suppressed)
//! ```

pub mod request;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::HttpTransport;
