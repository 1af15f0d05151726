//! Client-side envelopes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientError;

/// Every request from this crate carries the same identifier.
pub const REQUEST_ID: u64 = 1;

#[derive(Debug, Serialize)]
pub struct Request<'a, P: Serialize + ?Sized> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a P,
    id: u64,
}

impl<'a, P: Serialize + ?Sized> Request<'a, P> {
    pub fn new(method: &'a str, params: &'a P) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
            id: REQUEST_ID,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ClientError> {
        serde_json::to_vec(self).map_err(ClientError::Encode)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A decoded response envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
    #[serde(default)]
    pub id: Value,
}

impl Response {
    /// Decode exactly one envelope; surrounding whitespace is ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, ClientError> {
        serde_json::from_slice(bytes).map_err(ClientError::Decode)
    }

    /// The result decoded as `T`, or the error object as [`ClientError::Rpc`].
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        if let Some(err) = self.error {
            return Err(ClientError::Rpc {
                code: err.code,
                message: err.message,
                data: err.data,
            });
        }
        serde_json::from_value(self.result.unwrap_or(Value::Null)).map_err(ClientError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_has_fixed_id() {
        let bytes = Request::new("sum", &json!({"a": 1})).encode().unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "method": "sum", "params": {"a": 1}, "id": 1})
        );
    }

    #[test]
    fn test_error_object_surfaces() {
        let response = Response::decode(
            br#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found","data":"nope"},"id":1}"#,
        )
        .unwrap();

        match response.into_result::<Value>().unwrap_err() {
            ClientError::Rpc { code, message, data } => {
                assert_eq!(code, -32601);
                assert_eq!(message, "Method not found");
                assert_eq!(data, Some(json!("nope")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_null_result() {
        let response = Response::decode(b"{\"jsonrpc\":\"2.0\",\"result\":null,\"id\":null}\n").unwrap();
        assert_eq!(response.id, Value::Null);
        assert_eq!(response.into_result::<Option<i64>>().unwrap(), None);
    }

    #[test]
    fn test_typed_result() {
        #[derive(Deserialize)]
        struct Sum {
            result: f64,
        }
        let response =
            Response::decode(br#"{"jsonrpc":"2.0","result":{"result":5.0},"id":1}"#).unwrap();
        assert_eq!(response.into_result::<Sum>().unwrap().result, 5.0);
    }
}
