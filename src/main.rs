//! JSON-RPC 2.0 dispatcher.
//!
//! # Architecture Overview
//!
//! ```text
//!   socket connection ─┐
//!   HTTP POST body ────┼─▶ Dispatcher ─▶ global middleware ─▶ command middleware ─▶ handler
//!   CGI stdin ─────────┘        │
//!                               └─▶ exactly one response envelope on the same transport
//! ```
//!
//! Serves the reference command set from [`rpc_dispatch::commands`].

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use rpc_dispatch::commands;
use rpc_dispatch::config::{self, ConfigError, ServerConfig, TransportKind};
use rpc_dispatch::dispatch::Registry;
use rpc_dispatch::lifecycle;
use rpc_dispatch::observability::init_logging;

const AUTH_TOKEN_VAR: &str = "RPC_AUTH_TOKEN";

#[derive(Parser)]
#[command(name = "rpc-dispatch")]
#[command(about = "JSON-RPC 2.0 dispatcher over sockets, HTTP or CGI", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured transport.
    #[arg(short, long, value_enum)]
    transport: Option<Transport>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Transport {
    Socket,
    Http,
    Cgi,
}

impl From<Transport> for TransportKind {
    fn from(transport: Transport) -> Self {
        match transport {
            Transport::Socket => TransportKind::Socket,
            Transport::Http => TransportKind::Http,
            Transport::Cgi => TransportKind::Cgi,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(transport) = cli.transport {
        config.transport = transport.into();
        config::validate_config(&config).map_err(ConfigError::Validation)?;
    }

    init_logging(&config.observability)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = ?config.transport,
        "rpc-dispatch starting"
    );

    let mut registry = Registry::new();
    commands::register_defaults(&mut registry);
    match std::env::var(AUTH_TOKEN_VAR) {
        Ok(token) if !token.is_empty() => {
            registry.use_global(commands::require_token(token));
            tracing::info!("authToken required on every request");
        }
        _ => {}
    }

    lifecycle::serve(config, registry).await?;
    Ok(())
}
