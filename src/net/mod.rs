//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP / Unix-domain connection
//!     → listener.rs (accept loop, connection limits, stale socket cleanup)
//!     → connection.rs (connection id, live-connection tracking)
//!     → Dispatcher::execute (one request, one response)
//!     → close
//!
//! Connection States:
//!     Accepted → Dispatching → Closed
//! ```
//!
//! # Design Decisions
//! - No keep-alive: each connection carries exactly one exchange
//! - Bounded by a semaphore; the permit lives as long as the connection task
//! - Each connection tracked for graceful shutdown
//! - tls.rs serves the HTTP transport only; raw sockets are plaintext

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{start_server, Acceptor, ListenerError};
pub use tls::{load_tls_config, TlsError};
