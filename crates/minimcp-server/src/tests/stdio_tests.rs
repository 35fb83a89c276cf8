use std::collections::HashMap;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex};

use super::fixtures::{call, request, server};
use crate::stdio::StdioTransport;

/// Feed `input` to a stdio transport and collect every line it writes.
async fn run(input: String) -> Vec<Value> {
    let (mut client_tx, server_rx) = duplex(4096);
    let (server_tx, client_rx) = duplex(4096);

    let transport = StdioTransport::new(server());
    let serve = tokio::spawn(async move { transport.serve(BufReader::new(server_rx), server_tx).await });

    client_tx.write_all(input.as_bytes()).await.unwrap();
    drop(client_tx);

    let mut lines = BufReader::new(client_rx).lines();
    let mut out = Vec::new();
    while let Some(line) = lines.next_line().await.unwrap() {
        out.push(serde_json::from_str(&line).unwrap());
    }
    serve.await.unwrap().unwrap();
    out
}

#[tokio::test]
async fn test_one_reply_per_request_line() {
    let input = format!(
        "{}\n\n   \n{}\n{}\n",
        request(json!(1), "ping", Value::Null),
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        call(2, "add", json!({"a": 1, "b": 2})),
    );
    let out = run(input).await;
    assert_eq!(out.len(), 2);

    let by_id: HashMap<i64, &Value> = out
        .iter()
        .map(|v| (v["id"].as_i64().unwrap(), v))
        .collect();
    assert_eq!(by_id[&1]["result"], json!({}));
    assert_eq!(by_id[&2]["result"]["content"][0]["text"], "3");
}

#[tokio::test]
async fn test_invalid_lines_get_error_envelopes() {
    let out = run("not json\n{\"jsonrpc\":\"2.0\",\"id\":5,\"result\":{}}\n".to_string()).await;
    assert_eq!(out.len(), 2);

    let codes: Vec<i64> = out
        .iter()
        .map(|v| v["error"]["code"].as_i64().unwrap())
        .collect();
    assert!(codes.contains(&-32700));
    assert!(codes.contains(&-32600));
    let parse_error = out.iter().find(|v| v["error"]["code"] == -32700).unwrap();
    assert_eq!(parse_error["id"], Value::Null);
}

#[tokio::test]
async fn test_notifications_are_written_before_the_reply() {
    let input = format!(
        "{}\n",
        request(
            json!(3),
            "tools/call",
            json!({"name": "notify_twice", "_meta": {"progressToken": 42}}),
        )
    );
    let out = run(input).await;
    assert_eq!(out.len(), 3);
    assert_eq!(out[0]["method"], "notifications/progress");
    assert_eq!(out[0]["params"]["progressToken"], 42);
    assert_eq!(out[1]["method"], "notifications/message");
    assert_eq!(out[2]["id"], 3);
    assert_eq!(out[2]["result"]["content"][0]["text"], "finished");
}

#[tokio::test]
async fn test_trailing_line_without_newline() {
    let out = run(request(json!("tail"), "ping", Value::Null)).await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["id"], "tail");
}
