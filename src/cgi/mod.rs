//! CGI transport adapter.
//!
//! # Data Flow
//! ```text
//! web server spawns the process
//!     → stdin (bounded by CONTENT_LENGTH when set)
//!     → Dispatcher::execute_with_data (REMOTE_ADDR, REQUEST_METHOD injected)
//!     → stdout (CGI header block + JSON body)
//! ```
//!
//! Logging must never touch stdout in this mode; the subscriber always
//! writes to stderr.

use std::collections::HashMap;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::config::DispatchConfig;
use crate::dispatch::{DataMap, DispatchError, Dispatcher, Outcome};

/// The parts of the CGI environment the adapter reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgiEnv {
    pub content_length: Option<u64>,
    pub remote_addr: Option<String>,
    pub request_method: Option<String>,
}

impl CgiEnv {
    pub fn from_process() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut vars: HashMap<String, String> = vars
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .collect();
        Self {
            content_length: vars
                .remove("CONTENT_LENGTH")
                .and_then(|len| len.trim().parse().ok()),
            remote_addr: vars.remove("REMOTE_ADDR"),
            request_method: vars.remove("REQUEST_METHOD"),
        }
    }

    fn data(&self) -> DataMap {
        let mut data = DataMap::new();
        if let Some(addr) = &self.remote_addr {
            data.insert("remote_addr".to_string(), Box::new(addr.clone()));
        }
        if let Some(method) = &self.request_method {
            data.insert("request_method".to_string(), Box::new(method.clone()));
        }
        data
    }
}

/// The dispatch policy for CGI mode: the header block is always written.
pub fn dispatch_config(config: &DispatchConfig) -> DispatchConfig {
    DispatchConfig {
        cgi_headers: true,
        ..config.clone()
    }
}

/// Serve exactly one request from `reader` to `writer` under `env`.
pub async fn serve<R, W>(
    dispatcher: &Dispatcher,
    env: &CgiEnv,
    reader: R,
    writer: W,
) -> Result<Outcome, DispatchError>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    tracing::debug!(
        content_length = ?env.content_length,
        remote_addr = ?env.remote_addr,
        "CGI request"
    );
    let data = env.data();
    match env.content_length {
        Some(len) => {
            dispatcher
                .execute_with_data(reader.take(len), writer, data)
                .await
        }
        None => dispatcher.execute_with_data(reader, writer, data).await,
    }
}

/// Serve the process's own stdin/stdout.
pub async fn serve_stdio(dispatcher: &Dispatcher) -> Result<Outcome, DispatchError> {
    serve(
        dispatcher,
        &CgiEnv::from_process(),
        tokio::io::stdin(),
        tokio::io::stdout(),
    )
    .await
}
