//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! reader (socket / HTTP body / stdin)
//!     → interceptor.rs (optional: may take over the exchange)
//!     → protocol::codec (one JSON value)
//!     → engine.rs (validate, route)
//!     → context.rs (per-request state)
//!     → global middleware → command middleware → handler
//!     → engine.rs (encode reply)
//!     → writer
//!
//! Dispatch States:
//!     Decoding → Routing → GlobalMiddleware → CommandMiddleware → Handling → Responding → Done
//! ```
//!
//! # Design Decisions
//! - The registry is frozen when the `Dispatcher` is built; reads take no lock
//! - Handlers and middleware share one signature and one failure contract
//! - The engine is the only writer; the context only records the reply

pub mod context;
pub mod engine;
pub mod interceptor;
pub mod registry;

pub use context::{Context, DataMap};
pub use engine::{DispatchError, Dispatcher, Outcome};
pub use interceptor::{Interception, Interceptor};
pub use registry::{Command, CommandBuilder, Registry};

/// Failure type returned by handlers and middleware.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Return type shared by handlers and middleware.
pub type HandlerResult = Result<(), BoxError>;
