//! Reference command set served by the `rpc-dispatch` binary.
//!
//! Small, but it exercises every path through the engine: plain results,
//! command middleware, handler-recorded errors, structured binding and a
//! global guard.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::dispatch::{Context, HandlerResult, Registry};
use crate::protocol::ErrorCode;

/// Application error code used when a parameter fails a command's precondition.
pub const BAD_REQUEST: ErrorCode = ErrorCode::Application(400);

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UserInfo {
    pub id: i64,
    pub name: String,
    pub active: bool,
    pub roles: Vec<String>,
}

/// Register `ping`, `sum`, `multiply`, `divide` and `getUserInfo`.
pub fn register_defaults(registry: &mut Registry) {
    registry.register("ping", ping);
    registry.register("sum", sum);
    registry.register("multiply", multiply).with(require_positive_a);
    registry.register("divide", divide);
    registry.register("getUserInfo", get_user_info);
}

/// Global middleware rejecting requests whose `authToken` param is not `token`.
pub fn require_token(
    token: String,
) -> impl Fn(&mut Context) -> HandlerResult + Send + Sync + 'static {
    move |ctx| {
        if ctx.param_string("authToken", "") != token {
            tracing::warn!(parent: ctx.span(), method = ctx.method(), "unauthorized request");
            return ctx.error(BAD_REQUEST, "unauthorized");
        }
        Ok(())
    }
}

fn ping(ctx: &mut Context) -> HandlerResult {
    ctx.json("pong")?;
    Ok(())
}

fn sum(ctx: &mut Context) -> HandlerResult {
    let a = ctx.param_float("a", 0.0);
    let b = ctx.param_float("b", 0.0);

    let mut result = Map::new();
    result.insert("result".into(), number(a + b));
    if let Some(id) = ctx.get_data::<String>("request_id") {
        result.insert("request_id".into(), Value::String(id.clone()));
    }
    ctx.json(result)?;
    Ok(())
}

/// Whole values within the exactly representable range go out as integers.
fn number(value: f64) -> Value {
    const EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
    if value.fract() == 0.0 && value.abs() <= EXACT {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

fn require_positive_a(ctx: &mut Context) -> HandlerResult {
    if ctx.param_float("a", 1.0) <= 0.0 {
        return ctx.error(BAD_REQUEST, "parameter 'a' must be positive");
    }
    Ok(())
}

fn multiply(ctx: &mut Context) -> HandlerResult {
    let a = ctx.param_float("a", 1.0);
    let b = ctx.param_float("b", 1.0);
    ctx.json(json!({ "result": number(a * b) }))?;
    Ok(())
}

fn divide(ctx: &mut Context) -> HandlerResult {
    let a = ctx.param_float("a", 1.0);
    let b = ctx.param_float("b", 1.0);
    if b == 0.0 {
        return ctx.error(ErrorCode::InternalError, "division by zero");
    }
    ctx.json(json!({ "result": number(a / b) }))?;
    Ok(())
}

fn get_user_info(ctx: &mut Context) -> HandlerResult {
    let user: UserInfo = ctx.bind()?;
    ctx.json(json!({
        "user_id": user.id,
        "name": user.name,
        "active": user.active,
        "roles": user.roles,
    }))?;
    Ok(())
}
