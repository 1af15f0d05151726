//! The dispatch engine.
//!
//! # Responsibilities
//! - Run one decode → route → middleware → handle → encode cycle per call
//! - Turn every failure into exactly one error envelope (or none, when suppressed)
//! - Record per-request metrics and the `dispatch` span
//!
//! # Design Decisions
//! - Fail fast: the first failing step decides the response
//! - Unknown methods short-circuit before any middleware runs
//! - The engine never closes the stream; that belongs to the transport

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{field, Instrument, Span};

use crate::config::{DispatchConfig, MiddlewareFailure};
use crate::dispatch::context::{Context, DataMap};
use crate::dispatch::interceptor::{Interception, Interceptor};
use crate::dispatch::registry::Registry;
use crate::dispatch::BoxError;
use crate::observability::metrics;
use crate::protocol::codec::{self, DecodeError, Framing};
use crate::protocol::{
    ErrorCode, Payload, Request, RequestId, Response, RpcError, JSONRPC_VERSION,
};

/// Label used for requests that never resolved to a registered method.
const UNROUTED: &str = "-";

/// How a single dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A result envelope was written.
    Success,
    /// An error envelope with this code was written.
    Failed(ErrorCode),
    /// Middleware failed under the silent policy; nothing was written.
    Suppressed,
    /// The interceptor took over the exchange.
    Intercepted,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failed(_) => "error",
            Outcome::Suppressed => "suppressed",
            Outcome::Intercepted => "intercepted",
        }
    }
}

/// Transport-level dispatch failure. Protocol failures are responses, not errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("transport I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Routes envelopes to the commands of a frozen [`Registry`].
///
/// Shared across connections behind an `Arc`; every method takes `&self`.
pub struct Dispatcher {
    config: DispatchConfig,
    framing: Framing,
    registry: Registry,
    interceptor: Option<Arc<dyn Interceptor>>,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig, registry: Registry) -> Self {
        tracing::debug!(
            methods = ?registry.methods(),
            cgi_headers = config.cgi_headers,
            strict_version = config.strict_version,
            "dispatcher ready"
        );
        Self {
            framing: Framing::from(&config),
            config,
            registry,
            interceptor: None,
        }
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Serve one request from `reader`, answering on `writer`.
    pub async fn execute<R, W>(&self, reader: R, writer: W) -> Result<Outcome, DispatchError>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        self.run(reader, writer, None).await
    }

    /// Like [`Dispatcher::execute`], seeding the context's side-channel with `data`.
    pub async fn execute_with_data<R, W>(
        &self,
        reader: R,
        writer: W,
        data: DataMap,
    ) -> Result<Outcome, DispatchError>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        self.run(reader, writer, Some(data)).await
    }

    async fn run<R, W>(
        &self,
        reader: R,
        mut writer: W,
        data: Option<DataMap>,
    ) -> Result<Outcome, DispatchError>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let span = tracing::info_span!("dispatch", method = field::Empty, id = field::Empty);
        let started = Instant::now();
        let mut method = UNROUTED;

        let result = self
            .dispatch(reader, &mut writer, data, span.clone(), &mut method)
            .instrument(span.clone())
            .await;

        match &result {
            Ok(outcome) => {
                metrics::record_dispatch(method, outcome.label(), started);
                tracing::debug!(
                    parent: &span,
                    outcome = ?outcome,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "dispatch complete"
                );
            }
            Err(e) => {
                metrics::record_dispatch(method, "transport_error", started);
                tracing::warn!(parent: &span, error = %e, "dispatch aborted");
            }
        }
        result
    }

    async fn dispatch<'s, R, W>(
        &'s self,
        reader: R,
        writer: &mut W,
        data: Option<DataMap>,
        span: Span,
        method: &mut &'s str,
    ) -> Result<Outcome, DispatchError>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let mut reader = BufReader::new(reader);

        if let Some(interceptor) = &self.interceptor {
            match interceptor.intercept(&mut reader, &mut *writer).await {
                Ok(Interception::Finished) => return Ok(Outcome::Intercepted),
                Ok(Interception::Continue) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "interceptor failed");
                    let err = RpcError::new(
                        ErrorCode::InterceptorError,
                        ErrorCode::InterceptorError.default_message(),
                    )
                    .with_data(e.to_string());
                    return self.reply(writer, Response::failure(RequestId::Null, err)).await;
                }
            }
        }

        // Decoding
        let value = match codec::read_value(&mut reader, self.config.max_request_bytes).await {
            Ok(value) => value,
            Err(DecodeError::Io(e)) => return Err(e.into()),
            Err(DecodeError::TooLarge { limit }) => {
                tracing::warn!(limit, "request too large");
                let err = RpcError::invalid_request(format!("request exceeds {limit} bytes"));
                return self.reply(writer, Response::failure(RequestId::Null, err)).await;
            }
            Err(e) => {
                tracing::debug!(error = %e, "unparseable request");
                let err = RpcError::parse_error().with_data(e.to_string());
                return self.reply(writer, Response::failure(RequestId::Null, err)).await;
            }
        };

        let request = match Request::from_value(value) {
            Ok(request) => request,
            Err(err) => {
                return self.reply(writer, Response::failure(RequestId::Null, err)).await;
            }
        };
        let id = request.response_id();
        span.record("method", request.method.as_str());
        span.record("id", field::display(&id));

        if self.config.strict_version && request.jsonrpc != JSONRPC_VERSION {
            let err = RpcError::invalid_request(format!(
                "unsupported jsonrpc version '{}'",
                request.jsonrpc
            ));
            return self.reply(writer, Response::failure(id, err)).await;
        }

        if self.config.log_requests {
            tracing::info!(
                method = %request.method,
                params = %request.params.to_value(),
                "request"
            );
        }

        // Routing
        let Some((name, command)) = self.registry.get_key_value(&request.method) else {
            tracing::debug!(method = %request.method, "method not found");
            let err = RpcError::method_not_found(&request.method);
            return self.reply(writer, Response::failure(id, err)).await;
        };
        *method = name;

        let mut ctx = Context::new(request.method, request.params, id.clone())
            .with_data(data)
            .with_span(span);

        // Global, then command middleware
        for middleware in self.registry.global().iter().chain(&command.middleware) {
            if let Err(e) = middleware(&mut ctx) {
                return match self.middleware_failed(&mut ctx, e) {
                    Some(payload) => self.reply(writer, Response::new(id, payload)).await,
                    None => Ok(Outcome::Suppressed),
                };
            }
        }

        // Handling
        let payload = match (command.handler)(&mut ctx) {
            Ok(()) => ctx.take_reply().unwrap_or(Payload::Result(Value::Null)),
            Err(e) => {
                tracing::error!(error = %e, "handler failed");
                ctx.take_reply()
                    .unwrap_or_else(|| Payload::Error(into_rpc_error(e)))
            }
        };

        self.reply(writer, Response::new(id, payload)).await
    }

    /// Decide the reply after a middleware failure; `None` writes nothing.
    fn middleware_failed(&self, ctx: &mut Context, e: BoxError) -> Option<Payload> {
        if let Some(reply) = ctx.take_reply() {
            tracing::debug!(error = %e, "middleware stopped the chain");
            return Some(reply);
        }
        if e.is::<RpcError>() {
            return Some(Payload::Error(into_rpc_error(e)));
        }
        match self.config.middleware_failure {
            MiddlewareFailure::WrapInternal => {
                tracing::warn!(error = %e, "middleware failed");
                Some(Payload::Error(RpcError::internal(e.to_string())))
            }
            MiddlewareFailure::Silent => {
                tracing::warn!(error = %e, "middleware failed, no response written");
                None
            }
        }
    }

    async fn reply<W>(&self, writer: &mut W, response: Response) -> Result<Outcome, DispatchError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let outcome = match response.error() {
            Some(err) => Outcome::Failed(err.code),
            None => Outcome::Success,
        };
        let bytes = codec::encode(&response, self.framing)?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(outcome)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("interceptor", &self.interceptor.is_some())
            .finish()
    }
}

/// An `RpcError` returned as the failure is used as-is; anything else is an internal error.
fn into_rpc_error(e: BoxError) -> RpcError {
    match e.downcast::<RpcError>() {
        Ok(err) => *err,
        Err(e) => RpcError::internal(e.to_string()),
    }
}
