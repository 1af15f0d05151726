//! JSON-RPC 2.0 envelope model.
//!
//! # Data Flow
//! ```text
//! byte stream
//!     → codec.rs (read exactly one JSON value, size limit)
//!     → envelope.rs (Request::from_value: shape + id checks)
//!     → [dispatch engine]
//!     → envelope.rs (Response: result XOR error)
//!     → codec.rs (CGI header, JSON body, newline)
//!     → byte stream
//! ```
//!
//! # Design Decisions
//! - Result/error exclusivity is carried by the `Payload` enum
//! - Identifiers are a tagged variant; only numbers, strings and null are valid
//! - Parameters are a tagged variant so typed accessors can pattern-match

pub mod codec;
pub mod envelope;
pub mod error;

pub use codec::{DecodeError, Framing};
pub use envelope::{Params, Payload, Request, RequestId, Response, Version, JSONRPC_VERSION};
pub use error::{ErrorCode, RpcError};
