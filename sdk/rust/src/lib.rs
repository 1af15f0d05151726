//! Client library for `rpc-dispatch` servers.
//!
//! Every call builds one request envelope with the fixed id `1`, sends it
//! over HTTP(S), TCP or a Unix socket, and decodes exactly one response.
//! An error object in the response comes back as [`ClientError::Rpc`].

pub mod client;
pub mod envelope;
pub mod error;
pub mod tcp;

pub use client::{HttpClient, HttpClientOptions};
pub use envelope::{Request, Response, RpcError, REQUEST_ID};
pub use error::ClientError;
pub use tcp::TcpClient;
#[cfg(unix)]
pub use tcp::UnixClient;
