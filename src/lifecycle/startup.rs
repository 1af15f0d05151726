//! Startup orchestration.
//!
//! # Responsibilities
//! - Install the metrics exporter when enabled
//! - Freeze the registry into a `Dispatcher`
//! - Start the configured transport and run it until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::cgi;
use crate::config::{ServerConfig, TransportKind};
use crate::dispatch::{DispatchError, Dispatcher, Registry};
use crate::http::HttpTransport;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::net::{load_tls_config, Acceptor, ListenerError, TlsError};
use crate::observability::{init_metrics, MetricsError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("failed to bind HTTP transport on {address}: {source}")]
    HttpBind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP transport failed: {0}")]
    Http(#[source] std::io::Error),

    #[error("CGI dispatch failed: {0}")]
    Cgi(#[from] DispatchError),
}

/// Run the configured transport until a shutdown signal (or, for CGI, one request).
pub async fn serve(config: ServerConfig, registry: Registry) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr = parse_addr(&config.observability.metrics_address)?;
        init_metrics(addr)?;
    }

    let dispatch = match config.transport {
        TransportKind::Cgi => cgi::dispatch_config(&config.dispatch),
        _ => config.dispatch.clone(),
    };
    let dispatcher = Arc::new(Dispatcher::new(dispatch, registry));
    tracing::info!(
        transport = ?config.transport,
        methods = dispatcher.registry().len(),
        "dispatcher initialized"
    );

    if config.transport == TransportKind::Cgi {
        let outcome = cgi::serve_stdio(&dispatcher).await?;
        tracing::debug!(outcome = ?outcome, "CGI request served");
        return Ok(());
    }

    let shutdown = Shutdown::new();
    let stopped = shutdown.signalled();
    tokio::spawn(signals::shutdown_on_signal(shutdown));

    match config.transport {
        TransportKind::Socket => {
            let acceptor = Acceptor::bind(&config.listener).await?;
            acceptor.serve_with_shutdown(dispatcher, stopped).await;
        }
        TransportKind::Http => {
            let transport = HttpTransport::new(dispatcher, &config.http);
            match &config.http.tls {
                Some(tls) => {
                    let rustls = load_tls_config(tls).await?;
                    let addr = parse_addr(&config.http.bind_address)?;
                    transport
                        .run_tls(addr, rustls, stopped)
                        .await
                        .map_err(StartupError::Http)?;
                }
                None => {
                    let listener = TcpListener::bind(&config.http.bind_address)
                        .await
                        .map_err(|source| StartupError::HttpBind {
                            address: config.http.bind_address.clone(),
                            source,
                        })?;
                    transport
                        .run(listener, stopped)
                        .await
                        .map_err(StartupError::Http)?;
                }
            }
        }
        TransportKind::Cgi => {}
    }

    tracing::info!("shutdown complete");
    Ok(())
}

fn parse_addr(address: &str) -> Result<SocketAddr, StartupError> {
    address
        .parse()
        .map_err(|_| StartupError::InvalidAddress(address.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_addr() {
        assert!(parse_addr("127.0.0.1:9090").is_ok());
        assert!(matches!(
            parse_addr("localhost"),
            Err(StartupError::InvalidAddress(a)) if a == "localhost"
        ));
    }

    #[tokio::test]
    async fn test_bind_failure_is_fatal() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = ServerConfig::default();
        config.listener.address = taken.local_addr().unwrap().to_string();

        let err = serve(config, Registry::new()).await.unwrap_err();
        assert!(matches!(err, StartupError::Listener(_)));
    }
}
