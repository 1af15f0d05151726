//! Per-request execution context.
//!
//! A `Context` is created by the engine for exactly one dispatch and is
//! threaded by `&mut` through global middleware, command middleware and the
//! handler. Nothing in it outlives the request.

use std::any::Any;
use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::Span;

use crate::dispatch::HandlerResult;
use crate::protocol::{ErrorCode, Params, Payload, RequestId, RpcError};

/// Side-channel values keyed by name.
pub type DataMap = HashMap<String, Box<dyn Any + Send + Sync>>;

/// Mutable state for one request.
pub struct Context {
    method: String,
    params: Params,
    id: RequestId,
    reply: Option<Payload>,
    data: Option<DataMap>,
    span: Span,
}

impl Context {
    /// Build a context outside the engine, e.g. to unit-test a handler.
    pub fn new(method: impl Into<String>, params: Params, id: RequestId) -> Self {
        Self {
            method: method.into(),
            params,
            id,
            reply: None,
            data: None,
            span: Span::current(),
        }
    }

    pub(crate) fn with_data(mut self, data: Option<DataMap>) -> Self {
        self.data = data;
        self
    }

    pub(crate) fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// The `dispatch` span of this request, for logging from middleware and handlers.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// The response recorded so far, if any.
    pub fn reply(&self) -> Option<&Payload> {
        self.reply.as_ref()
    }

    pub(crate) fn take_reply(&mut self) -> Option<Payload> {
        self.reply.take()
    }

    /// Record the success result.
    pub fn json<T: Serialize>(&mut self, result: T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(result)?;
        self.set_reply(Payload::Result(value));
        Ok(())
    }

    /// Record an error response and return the failure that stops the chain.
    ///
    /// Meant to be returned directly: `return ctx.error(code, "...")`.
    pub fn error(&mut self, code: ErrorCode, message: impl Into<String>) -> HandlerResult {
        self.reject(RpcError::new(code, message))
    }

    /// Like [`Context::error`], with an auxiliary data payload.
    pub fn error_with_data(
        &mut self,
        code: ErrorCode,
        message: impl Into<String>,
        data: impl Into<Value>,
    ) -> HandlerResult {
        self.reject(RpcError::new(code, message).with_data(data))
    }

    /// Record a prepared error object and fail with it.
    pub fn reject(&mut self, err: RpcError) -> HandlerResult {
        self.set_reply(Payload::Error(err.clone()));
        Err(Box::new(err))
    }

    fn set_reply(&mut self, payload: Payload) {
        if self.reply.is_some() {
            tracing::warn!(parent: &self.span, "response already recorded, replacing it");
        }
        self.reply = Some(payload);
    }

    /// Decode the params into a structured type.
    ///
    /// Mismatched shapes come back as `InvalidParams`, so handlers can use `?`.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, RpcError> {
        serde_json::from_value(self.params.to_value())
            .map_err(|e| RpcError::invalid_params(e.to_string()))
    }

    pub fn param_int(&self, name: &str, default: i64) -> i64 {
        self.params.int(name, default)
    }

    pub fn param_float(&self, name: &str, default: f64) -> f64 {
        self.params.float(name, default)
    }

    pub fn param_string(&self, name: &str, default: &str) -> String {
        self.params.string(name, default)
    }

    pub fn param_bool(&self, name: &str, default: bool) -> bool {
        self.params.bool(name, default)
    }

    pub fn param_int_array(&self, name: &str) -> Vec<i64> {
        self.params.int_array(name)
    }

    pub fn param_float_array(&self, name: &str) -> Vec<f64> {
        self.params.float_array(name)
    }

    pub fn param_string_array(&self, name: &str) -> Vec<String> {
        self.params.string_array(name)
    }

    /// Store a value for later middleware or the handler.
    pub fn set_data<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.data
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), Box::new(value));
    }

    /// Fetch a stored value. `None` when absent or stored with another type.
    pub fn get_data<T: Any>(&self, name: &str) -> Option<&T> {
        self.data.as_ref()?.get(name)?.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("method", &self.method)
            .field("params", &self.params)
            .field("id", &self.id)
            .field("reply", &self.reply)
            .field("data_keys", &self.data.as_ref().map(|d| d.len()).unwrap_or(0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn ctx(params: Value) -> Context {
        Context::new("test", Params::from(params), RequestId::from(1u64))
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct UserInfo {
        id: i64,
        name: String,
        active: bool,
        roles: Vec<String>,
    }

    #[test]
    fn test_param_float_type_mismatch_returns_default() {
        let ctx = ctx(json!({"a": "not-a-number"}));
        assert_eq!(ctx.param_float("a", 1.0), 1.0);
    }

    #[test]
    fn test_param_int_array_absent_is_empty() {
        let ctx = ctx(json!({}));
        assert_eq!(ctx.param_int_array("xs"), Vec::<i64>::new());
    }

    #[test]
    fn test_json_records_result() {
        let mut ctx = ctx(json!({}));
        ctx.json(json!({"result": 5.0})).unwrap();
        assert_eq!(ctx.reply(), Some(&Payload::Result(json!({"result": 5.0}))));
    }

    #[test]
    fn test_error_records_and_fails() {
        let mut ctx = ctx(json!({}));
        let err = ctx.error(ErrorCode::Application(400), "bad").unwrap_err();
        let rpc = err.downcast_ref::<RpcError>().unwrap();
        assert_eq!(rpc.code, ErrorCode::Application(400));
        assert!(matches!(ctx.reply(), Some(Payload::Error(e)) if e.message == "bad"));
    }

    #[test]
    fn test_bind_structured_params() {
        let ctx = ctx(json!({"id": 3, "name": "ada", "active": true, "roles": ["admin"]}));
        let user: UserInfo = ctx.bind().unwrap();
        assert_eq!(
            user,
            UserInfo {
                id: 3,
                name: "ada".into(),
                active: true,
                roles: vec!["admin".into()],
            }
        );
    }

    #[test]
    fn test_bind_shape_mismatch() {
        let ctx = ctx(json!({"id": "three"}));
        let err = ctx.bind::<UserInfo>().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
    }

    #[test]
    fn test_side_channel() {
        let mut ctx = ctx(json!({}));
        assert!(ctx.get_data::<i64>("request_id").is_none());

        ctx.set_data("request_id", 1001_i64);
        assert_eq!(ctx.get_data::<i64>("request_id"), Some(&1001));
        assert!(ctx.get_data::<String>("request_id").is_none());
    }

    #[test]
    fn test_injected_data_is_visible() {
        let mut data = DataMap::new();
        data.insert("remote_addr".into(), Box::new("10.0.0.1".to_string()));
        let ctx = ctx(json!({})).with_data(Some(data));
        assert_eq!(
            ctx.get_data::<String>("remote_addr").map(String::as_str),
            Some("10.0.0.1")
        );
    }
}
