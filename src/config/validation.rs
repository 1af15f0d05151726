//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{ServerConfig, SocketFamily, TransportKind};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.address must not be empty")]
    EmptyListenerAddress,

    #[error("listener.max_connections must be greater than zero")]
    ZeroConnections,

    #[error("unix sockets are not supported on this platform")]
    UnixUnsupported,

    #[error("http.bind_address '{0}' is not a socket address")]
    InvalidHttpAddress(String),

    #[error("http.path '{0}' must start with '/'")]
    InvalidHttpPath(String),

    #[error("http.request_timeout_secs must be greater than zero")]
    ZeroTimeout,

    #[error("dispatch.max_request_bytes must be greater than zero")]
    ZeroRequestLimit,

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.transport == TransportKind::Socket {
        if config.listener.address.trim().is_empty() {
            errors.push(ValidationError::EmptyListenerAddress);
        }
        if config.listener.max_connections == 0 {
            errors.push(ValidationError::ZeroConnections);
        }
        if config.listener.family == SocketFamily::Unix && !cfg!(unix) {
            errors.push(ValidationError::UnixUnsupported);
        }
    }

    if config.transport == TransportKind::Http {
        if config.http.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidHttpAddress(
                config.http.bind_address.clone(),
            ));
        }
        if !config.http.path.starts_with('/') {
            errors.push(ValidationError::InvalidHttpPath(config.http.path.clone()));
        }
        if config.http.request_timeout_secs == 0 {
            errors.push(ValidationError::ZeroTimeout);
        }
    }

    if config.dispatch.max_request_bytes == 0 {
        errors.push(ValidationError::ZeroRequestLimit);
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_problem() {
        let mut config = ServerConfig::default();
        config.listener.address = " ".into();
        config.listener.max_connections = 0;
        config.dispatch.max_request_bytes = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyListenerAddress,
                ValidationError::ZeroConnections,
                ValidationError::ZeroRequestLimit,
            ]
        );
    }

    #[test]
    fn test_http_section_checked_only_for_http() {
        let mut config = ServerConfig::default();
        config.http.path = "rpc".into();
        assert!(validate_config(&config).is_ok());

        config.transport = TransportKind::Http;
        config.http.bind_address = "localhost".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidHttpPath("rpc".into())));
        assert!(errors.contains(&ValidationError::InvalidHttpAddress("localhost".into())));
    }

    #[test]
    fn test_metrics_address_checked_when_enabled() {
        let mut config = ServerConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::InvalidMetricsAddress("nowhere".into())]
        );
    }
}
