use std::sync::Arc;
use std::time::Duration;

use http_body_util::BodyExt;
use hyper::StatusCode;
use minimcp_server::Scope;
use serde_json::{Value, json};

use super::fixtures::*;
use crate::StreamableHttpTransport;
use crate::sse::parse_messages;

fn transport() -> StreamableHttpTransport {
    StreamableHttpTransport::new(server())
}

fn call_with_progress(id: i64, tool: &str) -> String {
    request(
        json!(id),
        "tools/call",
        json!({"name": tool, "arguments": {}, "_meta": {"progressToken": "p1"}}),
    )
}

fn events(payload: &str) -> Vec<Value> {
    parse_messages(payload)
        .iter()
        .map(|data| serde_json::from_str(data).unwrap())
        .collect()
}

#[tokio::test]
async fn test_silent_handler_gets_plain_json() {
    let response = transport()
        .handle(post(call(1, "add", json!({"a": 2, "b": 3}))))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "application/json");
    let body = body_json(response).await;
    assert_eq!(body["result"]["content"][0]["text"], "5");
}

#[tokio::test]
async fn test_notifying_handler_upgrades_to_event_stream() {
    let response = transport()
        .handle(post(call_with_progress(7, "notify_twice")))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "text/event-stream");
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "no-cache, no-transform"
    );

    let events = events(&body_text(response).await);
    assert_eq!(events.len(), 3);
    assert_eq!(events[0]["method"], "notifications/progress");
    assert_eq!(events[0]["params"]["progressToken"], "p1");
    assert_eq!(events[1]["method"], "notifications/message");
    // Final event is the terminal response
    assert_eq!(events[2]["id"], 7);
    assert_eq!(events[2]["result"]["content"][0]["text"], "finished");
}

#[tokio::test]
async fn test_business_error_without_notifications_stays_plain() {
    let response = transport()
        .handle(post(call(2, "divide", json!({"a": 1, "b": 0}))))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "application/json");
    assert_eq!(body_json(response).await["result"]["isError"], true);
}

#[tokio::test]
async fn test_notification_gets_202_and_no_stream() {
    let response = transport()
        .handle(post(
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(response.headers().get("content-type").is_none());
    assert_eq!(body_text(response).await, "");
}

#[tokio::test]
async fn test_malformed_body_is_400_json() {
    let response = transport().handle(post("[{]")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(content_type(&response), "application/json");
    let body = body_json(response).await;
    assert_eq!(body["id"], json!(null));
    assert_eq!(body["error"]["code"], -32700);
}

#[tokio::test]
async fn test_event_stream_must_be_acceptable() {
    let response = transport()
        .handle(post_with(
            request(json!(1), "ping", json!(null)),
            &[("accept", "application/json")],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_comments_fill_quiet_periods() {
    let transport = transport().with_keep_alive_interval(Duration::from_secs(5));
    let response = transport.handle(post(call(9, "slow_stream", json!({})))).await;
    assert_eq!(content_type(&response), "text/event-stream");

    let payload = body_text(response).await;
    assert_eq!(payload.matches(": ping\n\n").count(), 2);
    let events = events(&payload);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1]["result"]["content"][0]["text"], "slow done");
}

#[tokio::test(start_paused = true)]
async fn test_idle_timeout_mid_stream_ends_with_connection_closed() {
    let server = builder()
        .idle_timeout(Duration::from_secs(1))
        .build()
        .unwrap();
    let transport = StreamableHttpTransport::new(server).with_keep_alive_interval(Duration::from_secs(60));
    let response = transport
        .handle(post(call(11, "notify_then_hang", json!({}))))
        .await;
    assert_eq!(content_type(&response), "text/event-stream");

    let events = events(&body_text(response).await);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1]["id"], 11);
    assert_eq!(events[1]["error"]["code"], -32000);
}

#[tokio::test]
async fn test_dropping_the_stream_cancels_the_handler() {
    let server = server();
    let transport = StreamableHttpTransport::new(server.clone());
    let flag = Arc::new(DropFlag::default());
    let scope: Scope = flag.clone();

    let response = transport
        .handle_with_scope(post(call(12, "notify_then_hang", json!({}))), Some(scope))
        .await;
    assert_eq!(content_type(&response), "text/event-stream");

    let mut body = response.into_body();
    let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
    assert!(String::from_utf8_lossy(&first).contains("hanging"));
    assert!(!flag.is_set());

    drop(body);
    assert!(eventually(|| flag.is_set()).await);
    let limiter = server.limiter();
    assert!(eventually(|| limiter.active() == 0).await);
}

#[tokio::test]
async fn test_disconnect_before_decision_cancels_the_handler() {
    let server = server();
    let transport = StreamableHttpTransport::new(server.clone());
    let flag = Arc::new(DropFlag::default());
    let scope: Scope = flag.clone();

    let pending = transport.handle_with_scope(post(call(13, "hang", json!({}))), Some(scope));
    let outcome = tokio::time::timeout(Duration::from_millis(50), pending).await;
    assert!(outcome.is_err());

    assert!(eventually(|| flag.is_set()).await);
    let limiter = server.limiter();
    assert!(eventually(|| limiter.active() == 0).await);
}

#[tokio::test]
async fn test_parallel_posts_get_independent_shapes() {
    let transport = transport();
    let (streamed, plain) = tokio::join!(
        transport.handle(post(call_with_progress(20, "notify_twice"))),
        transport.handle(post(call(21, "add", json!({"a": 1, "b": 1})))),
    );
    assert_eq!(content_type(&streamed), "text/event-stream");
    assert_eq!(content_type(&plain), "application/json");
    assert_eq!(events(&body_text(streamed).await).last().unwrap()["id"], 20);
    assert_eq!(body_json(plain).await["id"], 21);
}
