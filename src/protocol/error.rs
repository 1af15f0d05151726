//! RPC error object and the standard error-code taxonomy.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// JSON-RPC error code.
///
/// The five protocol codes are named; `InterceptorError` is the band used
/// when a handler interceptor fails. Everything else is open to handlers and
/// middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    InterceptorError,
    Application(i64),
}

impl ErrorCode {
    pub const fn code(self) -> i64 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::InterceptorError => 32000,
            ErrorCode::Application(code) => code,
        }
    }

    /// Message used when the engine raises the error itself.
    pub fn default_message(self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::InternalError => "Internal error",
            ErrorCode::InterceptorError => "Interceptor error",
            ErrorCode::Application(_) => "Application error",
        }
    }
}

impl From<i64> for ErrorCode {
    fn from(code: i64) -> Self {
        match code {
            -32700 => ErrorCode::ParseError,
            -32600 => ErrorCode::InvalidRequest,
            -32601 => ErrorCode::MethodNotFound,
            -32602 => ErrorCode::InvalidParams,
            -32603 => ErrorCode::InternalError,
            32000 => ErrorCode::InterceptorError,
            other => ErrorCode::Application(other),
        }
    }
}

impl From<ErrorCode> for i64 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The `error` member of a response envelope. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("rpc error {code}: {message}")]
pub struct RpcError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach an auxiliary data payload.
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn parse_error() -> Self {
        Self::from_code(ErrorCode::ParseError)
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::InvalidRequest).with_data(reason.into())
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::from_code(ErrorCode::MethodNotFound).with_data(method)
    }

    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::InvalidParams).with_data(reason.into())
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::InternalError).with_data(reason.into())
    }

    fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }
}
