//! HTTP transport setup.
//!
//! # Responsibilities
//! - Create the Axum Router with the RPC endpoint
//! - Wire up middleware (tracing, limits, request ID, CORS, timeout)
//! - Feed request bodies to the dispatcher, with request metadata injected
//! - Serve plain HTTP or HTTPS with graceful shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::HttpConfig;
use crate::dispatch::{DataMap, Dispatcher, Outcome};
use crate::http::request::{self, MakeRequestUuid, X_REQUEST_ID};

/// JSON-RPC over HTTP POST.
pub struct HttpTransport {
    router: Router,
    config: HttpConfig,
}

impl HttpTransport {
    pub fn new(dispatcher: Arc<Dispatcher>, config: &HttpConfig) -> Self {
        let router = Self::build_router(dispatcher, config);
        Self {
            router,
            config: config.clone(),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(dispatcher: Arc<Dispatcher>, config: &HttpConfig) -> Router {
        let body_limit = dispatcher.config().max_request_bytes;
        let mut router = Router::new()
            .route(&config.path, post(rpc_handler))
            .with_state(dispatcher);

        if config.cors {
            router = router.layer(CorsLayer::permissive());
        }

        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                .layer(RequestBodyLimitLayer::new(body_limit))
                .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs))),
        )
    }

    /// The fully layered router, for in-process use and tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve plain HTTP on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, path = %self.config.path, "HTTP transport listening");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP transport stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` resolves.
    pub async fn run_tls<F>(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown: F,
    ) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = axum_server::Handle::new();
        let grace = Duration::from_secs(self.config.request_timeout_secs);
        let watcher = handle.clone();
        tokio::spawn(async move {
            shutdown.await;
            watcher.graceful_shutdown(Some(grace));
        });

        tracing::info!(address = %addr, path = %self.config.path, "HTTPS transport listening");
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS transport stopped");
        Ok(())
    }
}

/// One POST body, one dispatch.
async fn rpc_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    request: Request<Body>,
) -> Response {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string());
    let request_id = request::request_id(request.headers());

    let limit = dispatcher.config().max_request_bytes;
    let body = match axum::body::to_bytes(request.into_body(), limit).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "request body rejected").into_response();
        }
    };

    let mut data = DataMap::new();
    if let Some(id) = request_id {
        data.insert("request_id".to_string(), Box::new(id));
    }
    if let Some(addr) = remote_addr {
        data.insert("remote_addr".to_string(), Box::new(addr));
    }

    let mut out = Vec::new();
    match dispatcher.execute_with_data(&body[..], &mut out, data).await {
        Ok(Outcome::Suppressed) => StatusCode::NO_CONTENT.into_response(),
        Ok(Outcome::Intercepted) => out.into_response(),
        Ok(_) => ([(header::CONTENT_TYPE, "application/json")], out).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "dispatch failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
