use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Everything that can go wrong on the client side of one call.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    /// The server answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("connection closed before a response arrived")]
    Closed,

    #[error("server sent no response")]
    NoResponse,
}
