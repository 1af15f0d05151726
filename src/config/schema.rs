//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the dispatcher process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Which transport feeds the dispatcher.
    pub transport: TransportKind,

    /// Socket listener (raw TCP or Unix domain socket).
    pub listener: ListenerConfig,

    /// HTTP transport settings.
    pub http: HttpConfig,

    /// Dispatch policy (framing, validation, failure handling).
    pub dispatch: DispatchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Transport selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// One request per accepted TCP / Unix socket connection.
    #[default]
    Socket,
    /// JSON-RPC over HTTP POST bodies.
    Http,
    /// A single request on stdin, answered on stdout.
    Cgi,
}

/// Socket family for the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SocketFamily {
    #[default]
    Tcp,
    Unix,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// `host:port` for TCP, a filesystem path for Unix sockets.
    pub address: String,

    pub family: SocketFamily,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// How long shutdown waits for in-flight connections.
    pub shutdown_grace_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:9000".to_string(),
            family: SocketFamily::Tcp,
            max_connections: 10_000,
            shutdown_grace_secs: 10,
        }
    }
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Route the RPC endpoint is mounted on.
    pub path: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Answer CORS preflight and add permissive CORS headers.
    pub cors: bool,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            path: "/rpc".to_string(),
            request_timeout_secs: 30,
            cors: true,
            tls: None,
        }
    }
}

/// TLS configuration for the HTTP transport.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// What happens when middleware fails without recording a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MiddlewareFailure {
    /// Answer with a generic `InternalError` carrying the failure text.
    #[default]
    WrapInternal,
    /// Stop without writing anything.
    Silent,
}

/// Dispatch policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Write `Content-Type: application/json` + blank line before envelopes.
    /// Always on under the CGI transport.
    pub cgi_headers: bool,

    /// Whether the CGI header also precedes error envelopes.
    pub cgi_headers_on_error: bool,

    /// Reject requests whose `jsonrpc` member is not "2.0".
    pub strict_version: bool,

    /// Log method and params of every request.
    pub log_requests: bool,

    pub middleware_failure: MiddlewareFailure,

    /// Largest request document accepted, in bytes.
    pub max_request_bytes: usize,

    /// Terminate each response document with `\n`.
    pub newline_delimited: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            cgi_headers: false,
            cgi_headers_on_error: true,
            strict_version: true,
            log_requests: false,
            middleware_failure: MiddlewareFailure::WrapInternal,
            max_request_bytes: 2 * 1024 * 1024, // 2MB
            newline_delimited: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.transport, TransportKind::Socket);
        assert_eq!(config.listener.family, SocketFamily::Tcp);
        assert!(config.dispatch.strict_version);
        assert!(!config.dispatch.cgi_headers);
        assert_eq!(config.dispatch.middleware_failure, MiddlewareFailure::WrapInternal);
        assert_eq!(config.http.path, "/rpc");
    }

    #[test]
    fn test_partial_sections() {
        let config: ServerConfig = toml::from_str(
            r#"
            transport = "cgi"

            [listener]
            address = "/tmp/rpc.sock"
            family = "unix"

            [dispatch]
            cgi_headers = true
            middleware_failure = "silent"

            [http.tls]
            cert_path = "cert.pem"
            key_path = "key.pem"
            "#,
        )
        .unwrap();
        assert_eq!(config.transport, TransportKind::Cgi);
        assert_eq!(config.listener.family, SocketFamily::Unix);
        assert_eq!(config.listener.max_connections, 10_000);
        assert!(config.dispatch.cgi_headers);
        assert!(config.dispatch.cgi_headers_on_error);
        assert_eq!(config.dispatch.middleware_failure, MiddlewareFailure::Silent);
        assert_eq!(config.http.tls.unwrap().key_path, "key.pem");
    }
}
