//! Request and response envelopes.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Number, Value};

use crate::protocol::error::RpcError;

/// The only protocol version tag this crate speaks.
pub const JSONRPC_VERSION: &str = "2.0";

/// Version tag of an outgoing envelope. Always serializes as `"2.0"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Version;

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        if tag == JSONRPC_VERSION {
            Ok(Version)
        } else {
            Err(de::Error::invalid_value(
                de::Unexpected::Str(&tag),
                &JSONRPC_VERSION,
            ))
        }
    }
}

/// Request identifier. Echoed verbatim in the response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(Number),
    String(String),
    #[default]
    Null,
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        RequestId::Number(id.into())
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId::String(id.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
            RequestId::Null => f.write_str("null"),
        }
    }
}

/// Decoded `params` member.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    /// Positional parameters.
    Array(Vec<Value>),
    /// Named parameters. The typed accessors only look here.
    Object(Map<String, Value>),
    /// Anything else the client sent (not valid JSON-RPC, but tolerated).
    Scalar(Value),
    #[default]
    Null,
}

impl From<Value> for Params {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Params::Null,
            Value::Array(items) => Params::Array(items),
            Value::Object(map) => Params::Object(map),
            scalar => Params::Scalar(scalar),
        }
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Params::Array(items) => items.serialize(serializer),
            Params::Object(map) => map.serialize(serializer),
            Params::Scalar(value) => value.serialize(serializer),
            Params::Null => serializer.serialize_unit(),
        }
    }
}

impl Params {
    pub fn is_null(&self) -> bool {
        matches!(self, Params::Null)
    }

    /// Reassemble the untyped JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Params::Array(items) => Value::Array(items.clone()),
            Params::Object(map) => Value::Object(map.clone()),
            Params::Scalar(value) => value.clone(),
            Params::Null => Value::Null,
        }
    }

    /// Look up a named parameter. Always `None` unless the params are an object.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Params::Object(map) => map.get(name),
            _ => None,
        }
    }

    /// Numbers are read as `f64` and truncated; out-of-range values saturate.
    pub fn int(&self, name: &str, default: i64) -> i64 {
        match self.get(name) {
            Some(Value::Number(n)) => n.as_f64().map_or(default, |f| f as i64),
            _ => default,
        }
    }

    pub fn float(&self, name: &str, default: f64) -> f64 {
        match self.get(name) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
            _ => default,
        }
    }

    pub fn string(&self, name: &str, default: &str) -> String {
        match self.get(name) {
            Some(Value::String(s)) => s.clone(),
            _ => default.to_string(),
        }
    }

    pub fn bool(&self, name: &str, default: bool) -> bool {
        match self.get(name) {
            Some(Value::Bool(b)) => *b,
            _ => default,
        }
    }

    /// Elements of the wrong type are skipped. Never fails; empty on mismatch.
    pub fn int_array(&self, name: &str) -> Vec<i64> {
        self.array(name)
            .filter_map(|item| item.as_f64())
            .map(|f| f as i64)
            .collect()
    }

    pub fn float_array(&self, name: &str) -> Vec<f64> {
        self.array(name).filter_map(Value::as_f64).collect()
    }

    pub fn string_array(&self, name: &str) -> Vec<String> {
        self.array(name)
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect()
    }

    fn array(&self, name: &str) -> impl Iterator<Item = &Value> {
        match self.get(name) {
            Some(Value::Array(items)) => items.iter(),
            _ => (&[] as &[Value]).iter(),
        }
    }
}

/// An incoming request envelope. Never mutated after decode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Params::is_null")]
    pub params: Params,
    /// `None` when the member was absent (a notification).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Value, id: impl Into<RequestId>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: Params::from(params),
            id: Some(id.into()),
        }
    }

    /// Decode one envelope from a complete JSON document.
    pub fn decode(bytes: &[u8]) -> Result<Self, RpcError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| RpcError::parse_error().with_data(e.to_string()))?;
        Self::from_value(value)
    }

    /// Check the structure of an already-parsed JSON value.
    ///
    /// The version tag is carried through as-is; whether it must equal
    /// `"2.0"` is a dispatcher policy.
    pub fn from_value(value: Value) -> Result<Self, RpcError> {
        let mut object = match value {
            Value::Object(object) => object,
            Value::Array(_) => {
                return Err(RpcError::invalid_request("batch requests are not supported"))
            }
            _ => return Err(RpcError::invalid_request("request must be a JSON object")),
        };

        let jsonrpc = match object.remove("jsonrpc") {
            None => String::new(),
            Some(Value::String(tag)) => tag,
            Some(_) => return Err(RpcError::invalid_request("jsonrpc must be a string")),
        };

        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            Some(_) => return Err(RpcError::invalid_request("method must be a string")),
            None => return Err(RpcError::invalid_request("method is required")),
        };

        let id = match object.remove("id") {
            None => None,
            Some(Value::Null) => Some(RequestId::Null),
            Some(Value::Number(n)) => Some(RequestId::Number(n)),
            Some(Value::String(s)) => Some(RequestId::String(s)),
            Some(_) => {
                return Err(RpcError::invalid_request(
                    "id must be a string, a number or null",
                ))
            }
        };

        let params = object.remove("params").map(Params::from).unwrap_or_default();

        Ok(Self {
            jsonrpc,
            method,
            params,
            id,
        })
    }

    /// Identifier to echo: absent and null both answer with null.
    pub fn response_id(&self) -> RequestId {
        self.id.clone().unwrap_or_default()
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Exactly one of `result` / `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    Result(Value),
    Error(RpcError),
}

/// An outgoing response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: Version,
    #[serde(flatten)]
    pub payload: Payload,
    pub id: RequestId,
}

impl Response {
    pub fn new(id: RequestId, payload: Payload) -> Self {
        Self {
            jsonrpc: Version,
            payload,
            id,
        }
    }

    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: Version,
            payload: Payload::Result(result),
            id,
        }
    }

    pub fn failure(id: RequestId, error: RpcError) -> Self {
        Self {
            jsonrpc: Version,
            payload: Payload::Error(error),
            id,
        }
    }

    pub fn error(&self) -> Option<&RpcError> {
        match &self.payload {
            Payload::Error(err) => Some(err),
            Payload::Result(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error().is_some()
    }
}
