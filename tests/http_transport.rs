//! End-to-end dispatch over HTTP.

use rpc_client::{ClientError, HttpClient};
use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn test_sum_over_http() {
    let server = common::start_http_server(common::default_registry()).await;
    let client = HttpClient::new(&server.endpoint).unwrap();

    let value: Value = client.call("sum", &json!({"a": 2, "b": 3})).await.unwrap();
    assert_eq!(value["result"].as_f64(), Some(5.0));
    // The HTTP transport always injects a request id.
    assert!(value["request_id"].is_string());

    let err = client.call::<_, Value>("missing", &json!([])).await.unwrap_err();
    assert!(matches!(err, ClientError::Rpc { code: -32601, .. }));

    server.stop().await;
}

#[tokio::test]
async fn test_request_ids_do_not_leak_between_requests() {
    let server = common::start_http_server(common::default_registry()).await;
    let http = reqwest::Client::new();

    let calls = (0..16).map(|i| {
        let http = http.clone();
        let endpoint = server.endpoint.clone();
        tokio::spawn(async move {
            let request_id = format!("req-{i}");
            let response: Value = http
                .post(endpoint)
                .header("x-request-id", &request_id)
                .json(&json!({"jsonrpc": "2.0", "method": "sum", "params": {"a": i}, "id": i}))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            (i, request_id, response)
        })
    });

    for call in calls.collect::<Vec<_>>() {
        let (i, request_id, response) = call.await.unwrap();
        assert_eq!(response["id"], i);
        assert_eq!(response["result"]["request_id"], request_id.as_str());
        assert_eq!(response["result"]["result"].as_f64(), Some(f64::from(i)));
    }

    server.stop().await;
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let server = common::start_http_server(common::default_registry()).await;

    let response = reqwest::Client::new()
        .post(&server.endpoint)
        .body("{\"jsonrpc\":")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32700);
    assert_eq!(body["id"], Value::Null);

    server.stop().await;
}

#[tokio::test]
async fn test_global_token_guard() {
    let mut registry = common::default_registry();
    registry.use_global(rpc_dispatch::commands::require_token("s3cret".into()));
    let server = common::start_http_server(registry).await;
    let client = HttpClient::new(&server.endpoint).unwrap();

    let err = client.call::<_, Value>("ping", &json!({})).await.unwrap_err();
    assert!(matches!(err, ClientError::Rpc { code: 400, ref message, .. } if message == "unauthorized"));

    let pong: String = client.call("ping", &json!({"authToken": "s3cret"})).await.unwrap();
    assert_eq!(pong, "pong");

    server.stop().await;
}
