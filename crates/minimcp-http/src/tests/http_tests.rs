use bytes::Bytes;
use http_body_util::Full;
use hyper::header::ALLOW;
use hyper::{Method, Request, StatusCode};
use serde_json::json;

use super::fixtures::*;
use crate::HttpTransport;

fn transport() -> HttpTransport {
    HttpTransport::new(server())
}

/// Plain transport only needs `application/json` in Accept
fn plain_post(body: impl Into<String>) -> Request<Full<Bytes>> {
    post_with(body, &[("accept", "application/json")])
}

#[tokio::test]
async fn test_ping_is_answered_with_json() {
    let response = transport()
        .handle(plain_post(request(json!(1), "ping", json!(null))))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "application/json");
    assert_eq!(
        body_text(response).await,
        r#"{"jsonrpc":"2.0","id":1,"result":{}}"#
    );
}

#[tokio::test]
async fn test_unknown_method_is_404() {
    let response = transport()
        .handle(plain_post(request(json!(1), "no/such", json!(null))))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_text(response).await,
        r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#
    );
}

#[tokio::test]
async fn test_notification_is_accepted_without_body() {
    let response = transport()
        .handle(plain_post(
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_text(response).await, "");
}

#[tokio::test]
async fn test_malformed_json_is_400_with_null_id() {
    let response = transport().handle(plain_post("{not json")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["id"], json!(null));
    assert_eq!(body["error"]["code"], -32700);
}

#[tokio::test]
async fn test_tool_business_error_is_200_with_error_marker() {
    let response = transport()
        .handle(plain_post(call(3, "divide", json!({"a": 1, "b": 0}))))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], 3);
    assert_eq!(body["result"]["isError"], true);
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_invalid_params_is_400() {
    let response = transport()
        .handle(plain_post(call(4, "add", json!({"a": 1}))))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], -32602);
}

#[tokio::test]
async fn test_notifications_are_dropped_in_plain_mode() {
    let response = transport()
        .handle(plain_post(call(5, "notify_twice", json!({}))))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "application/json");
    let body = body_json(response).await;
    assert_eq!(body["result"]["content"][0]["text"], "finished");
}

#[tokio::test]
async fn test_non_post_is_405() {
    let req = Request::builder()
        .method(Method::GET)
        .uri("/mcp")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = transport().handle(req).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers().get(ALLOW).unwrap(), "POST");
}

#[tokio::test]
async fn test_wrong_accept_is_406() {
    let response = transport()
        .handle(post_with(
            request(json!(1), "ping", json!(null)),
            &[("accept", "text/html")],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn test_wrong_content_type_is_415() {
    let response = transport()
        .handle(post_with(
            request(json!(1), "ping", json!(null)),
            &[("content-type", "text/plain")],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let transport = transport().with_max_body_size(16);
    let response = transport
        .handle(plain_post(request(json!(1), "ping", json!(null))))
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_non_utf8_body_is_parse_error() {
    let req = Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .header("content-type", "application/json")
        .header("accept", "application/json")
        .body(Full::new(Bytes::from_static(&[0xff, 0xfe, 0x7b])))
        .unwrap();
    let response = transport().handle(req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], -32700);
}

#[tokio::test]
async fn test_unsupported_protocol_version_is_400_except_for_initialize() {
    let response = transport()
        .handle(post_with(
            request(json!(1), "ping", json!(null)),
            &[("accept", "application/json"), ("mcp-protocol-version", "1999-01-01")],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let initialize = request(
        json!(2),
        "initialize",
        json!({
            "protocolVersion": "2025-06-18",
            "capabilities": {},
            "clientInfo": {"name": "test", "version": "1"}
        }),
    );
    let response = transport()
        .handle(post_with(
            initialize,
            &[("accept", "application/json"), ("mcp-protocol-version", "1999-01-01")],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["result"]["protocolVersion"],
        "2025-06-18"
    );
}
