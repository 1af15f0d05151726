//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use rpc_dispatch::commands;
use rpc_dispatch::config::{DispatchConfig, HttpConfig, ListenerConfig, SocketFamily};
use rpc_dispatch::dispatch::{Dispatcher, Registry};
use rpc_dispatch::http::HttpTransport;
use rpc_dispatch::lifecycle::Shutdown;
use rpc_dispatch::net::Acceptor;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A server running in the background until `shutdown` is triggered.
#[allow(dead_code)]
pub struct TestServer {
    pub endpoint: String,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<()>,
}

#[allow(dead_code)]
impl TestServer {
    pub async fn stop(self) {
        self.shutdown.trigger();
        self.handle.await.unwrap();
    }
}

/// The reference command set.
pub fn default_registry() -> Registry {
    let mut registry = Registry::new();
    commands::register_defaults(&mut registry);
    registry
}

/// Serve `registry` over TCP on an ephemeral port.
#[allow(dead_code)]
pub async fn start_tcp_server(registry: Registry) -> TestServer {
    let config = ListenerConfig {
        address: "127.0.0.1:0".to_string(),
        ..ListenerConfig::default()
    };
    start_socket_server(&config, registry).await
}

/// Serve `registry` over a Unix socket in a fresh temp path.
#[allow(dead_code)]
pub async fn start_unix_server(name: &str, registry: Registry) -> (TestServer, PathBuf) {
    let path = std::env::temp_dir().join(format!("rpc-it-{}-{}.sock", name, std::process::id()));
    let _ = std::fs::remove_file(&path);
    let config = ListenerConfig {
        address: path.display().to_string(),
        family: SocketFamily::Unix,
        ..ListenerConfig::default()
    };
    (start_socket_server(&config, registry).await, path)
}

async fn start_socket_server(config: &ListenerConfig, registry: Registry) -> TestServer {
    let acceptor = Acceptor::bind(config).await.unwrap();
    let endpoint = match acceptor.local_addr() {
        Some(addr) => addr.to_string(),
        None => config.address.clone(),
    };
    let dispatcher = Arc::new(Dispatcher::new(DispatchConfig::default(), registry));
    let shutdown = Shutdown::new();
    let stopped = shutdown.signalled();
    let handle = tokio::spawn(acceptor.serve_with_shutdown(dispatcher, stopped));

    TestServer {
        endpoint,
        shutdown,
        handle,
    }
}

/// Serve `registry` over HTTP on an ephemeral port; `endpoint` is the full URL.
#[allow(dead_code)]
pub async fn start_http_server(registry: Registry) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let config = HttpConfig::default();
    let endpoint = format!("http://{}{}", addr, config.path);

    let dispatcher = Arc::new(Dispatcher::new(DispatchConfig::default(), registry));
    let transport = HttpTransport::new(dispatcher, &config);
    let shutdown = Shutdown::new();
    let stopped = shutdown.signalled();
    let handle = tokio::spawn(async move {
        transport.run(listener, stopped).await.unwrap();
    });

    TestServer {
        endpoint,
        shutdown,
        handle,
    }
}
