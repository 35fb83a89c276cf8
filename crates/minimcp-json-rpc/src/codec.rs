//! Text <-> message conversion.
//!
//! [`decode`] is the server-side input decoder: it accepts requests,
//! notifications and batches of them. [`decode_message`] accepts any of the
//! four envelope shapes and is the inverse of [`encode`].

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{EncodeError, InvalidMessageError};
use crate::message::JsonRpcMessage;
use crate::types::RequestId;

/// Result of decoding server input
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Single(JsonRpcMessage),
    /// Each element is decoded independently; one bad element does not poison the rest.
    Batch(Vec<Result<JsonRpcMessage, InvalidMessageError>>),
}

/// Decode raw bytes, rejecting invalid UTF-8 as a parse error.
pub fn decode_bytes(bytes: &[u8]) -> crate::Result<Decoded> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| InvalidMessageError::parse_error(format!("Invalid UTF-8: {}", e)))?;
    decode(text)
}

/// Decode a message (or batch) sent to the server.
///
/// Fails with `ParseError` on invalid JSON and `InvalidRequest` when the
/// envelope is not a request or notification.
pub fn decode(text: &str) -> crate::Result<Decoded> {
    match parse(text)? {
        Value::Array(items) => {
            if items.is_empty() {
                return Err(InvalidMessageError::invalid_request("Empty batch", None));
            }
            Ok(Decoded::Batch(
                items.into_iter().map(classify_inbound).collect(),
            ))
        }
        value => classify_inbound(value).map(Decoded::Single),
    }
}

/// Decode any single JSON-RPC envelope, including responses and errors.
pub fn decode_message(text: &str) -> crate::Result<JsonRpcMessage> {
    classify(parse(text)?)
}

/// Encode a message as one line of JSON.
pub fn encode<T: Serialize + ?Sized>(message: &T) -> Result<String, EncodeError> {
    let text = serde_json::to_string(message)?;
    if let Some(pos) = text.find(['\n', '\r']) {
        return Err(EncodeError::EmbeddedLineBreak(pos));
    }
    Ok(text)
}

/// True iff the message carries no id and therefore gets no response.
pub fn is_notification(message: &JsonRpcMessage) -> bool {
    message.is_notification()
}

fn parse(text: &str) -> Result<Value, InvalidMessageError> {
    serde_json::from_str(text).map_err(|e| InvalidMessageError::parse_error(e.to_string()))
}

fn classify_inbound(value: Value) -> Result<JsonRpcMessage, InvalidMessageError> {
    match classify(value)? {
        msg @ (JsonRpcMessage::Request(_) | JsonRpcMessage::Notification(_)) => Ok(msg),
        other => Err(InvalidMessageError::invalid_request(
            "Message to the server must be a request or notification",
            other.id().cloned(),
        )),
    }
}

fn classify(value: Value) -> Result<JsonRpcMessage, InvalidMessageError> {
    let Value::Object(obj) = value else {
        return Err(InvalidMessageError::invalid_request(
            "Message must be a JSON object",
            None,
        ));
    };
    let id = recover_id(&obj);

    match obj.get("jsonrpc") {
        Some(Value::String(v)) if v == crate::JSONRPC_VERSION => {}
        Some(other) => {
            return Err(InvalidMessageError::invalid_request(
                format!("Unsupported jsonrpc version: {}", other),
                id,
            ));
        }
        None => {
            return Err(InvalidMessageError::invalid_request(
                "Missing jsonrpc version",
                id,
            ));
        }
    }

    if obj.contains_key("method") {
        if !obj.contains_key("id") {
            return typed(obj, id).map(JsonRpcMessage::Notification);
        }
        if id.is_none() {
            return Err(InvalidMessageError::invalid_request(
                "Request id must be a string or an integer",
                None,
            ));
        }
        return typed(obj, id).map(JsonRpcMessage::Request);
    }

    match (obj.contains_key("result"), obj.contains_key("error")) {
        (true, false) => typed(obj, id).map(JsonRpcMessage::Response),
        (false, true) => typed(obj, id).map(JsonRpcMessage::Error),
        (true, true) => Err(InvalidMessageError::invalid_request(
            "Response must not carry both result and error",
            id,
        )),
        (false, false) => Err(InvalidMessageError::invalid_request(
            "Message is neither a request, notification nor response",
            id,
        )),
    }
}

fn recover_id(obj: &Map<String, Value>) -> Option<RequestId> {
    match obj.get("id")? {
        Value::String(s) => Some(RequestId::String(s.clone())),
        Value::Number(n) => n.as_i64().map(RequestId::Number),
        _ => None,
    }
}

fn typed<T: DeserializeOwned>(
    obj: Map<String, Value>,
    id: Option<RequestId>,
) -> Result<T, InvalidMessageError> {
    serde_json::from_value(Value::Object(obj))
        .map_err(|e| InvalidMessageError::invalid_request(e.to_string(), id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, JsonRpcError, JsonRpcErrorObject};
    use crate::notification::JsonRpcNotification;
    use crate::request::{JsonRpcRequest, RequestParams};
    use crate::response::JsonRpcResponse;
    use serde_json::json;

    fn single(text: &str) -> JsonRpcMessage {
        match decode(text).unwrap() {
            Decoded::Single(msg) => msg,
            Decoded::Batch(_) => panic!("expected a single message"),
        }
    }

    #[test]
    fn test_decode_request() {
        let msg = single(r#"{"jsonrpc":"2.0","id":"1","method":"ping"}"#);
        match msg {
            JsonRpcMessage::Request(req) => {
                assert_eq!(req.id, RequestId::from("1"));
                assert_eq!(req.method, "ping");
                assert!(req.params.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_notification() {
        let msg = single(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#);
        assert!(is_notification(&msg));
        assert_eq!(msg.method(), Some("notifications/initialized"));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = decode("{not json").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ParseError);
        assert!(err.id.is_none());
    }

    #[test]
    fn test_invalid_utf8_is_parse_error() {
        let err = decode_bytes(&[0x7b, 0xff, 0xfe, 0x7d]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ParseError);
    }

    #[test]
    fn test_wrong_version_is_invalid_request() {
        let err = decode(r#"{"jsonrpc":"1.0","id":3,"method":"ping"}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
        assert_eq!(err.id, Some(RequestId::Number(3)));

        let err = decode(r#"{"id":3,"method":"ping"}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_response_is_rejected_as_server_input() {
        let err = decode(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
        assert_eq!(err.id, Some(RequestId::Number(1)));
    }

    #[test]
    fn test_null_request_id_is_invalid() {
        let err = decode(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_scalar_params_are_invalid() {
        let err = decode(r#"{"jsonrpc":"2.0","id":1,"method":"ping","params":5}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
        assert_eq!(err.id, Some(RequestId::Number(1)));
    }

    #[test]
    fn test_batch_elements_decode_independently() {
        let decoded = decode(
            r#"[{"jsonrpc":"2.0","id":1,"method":"ping"},{"jsonrpc":"1.0","id":2,"method":"ping"},{"jsonrpc":"2.0","method":"notifications/initialized"}]"#,
        )
        .unwrap();
        let Decoded::Batch(items) = decoded else {
            panic!("expected a batch");
        };
        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert_eq!(items[1].as_ref().unwrap_err().id, Some(RequestId::Number(2)));
        assert!(items[2].as_ref().unwrap().is_notification());

        assert_eq!(decode("[]").unwrap_err().kind, ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_encode_escapes_line_breaks() {
        let response = JsonRpcResponse::new(
            RequestId::from(1),
            json!({"text": "line one\nline two\r\n"}),
        );
        let text = encode(&JsonRpcMessage::from(response)).unwrap();
        assert!(!text.contains('\n'));
        assert!(!text.contains('\r'));
    }

    #[test]
    fn test_round_trip() {
        let mut params = serde_json::Map::new();
        params.insert("name".into(), json!("add"));
        params.insert("arguments".into(), json!({"a": 1, "b": 2.5}));

        let messages = vec![
            JsonRpcMessage::from(JsonRpcRequest::new(
                RequestId::from("abc"),
                "tools/call",
                Some(RequestParams::Object(params)),
            )),
            JsonRpcMessage::from(JsonRpcRequest::new(RequestId::from(9), "ping", None)),
            JsonRpcMessage::from(JsonRpcNotification::with_value(
                "notifications/progress",
                json!({"progressToken": 1, "progress": 0.5}),
            )),
            JsonRpcMessage::from(JsonRpcResponse::new(
                RequestId::from(4),
                json!({"content": [{"type": "text", "text": "3"}]}),
            )),
            JsonRpcMessage::from(JsonRpcError::new(
                None,
                JsonRpcErrorObject::new(ErrorKind::ParseError),
            )),
            JsonRpcMessage::from(JsonRpcError::new(
                Some(RequestId::from("x")),
                JsonRpcErrorObject::with_detail(ErrorKind::ResourceNotFound, "math://nope"),
            )),
        ];

        for message in messages {
            let text = encode(&message).unwrap();
            assert_eq!(decode_message(&text).unwrap(), message, "{}", text);
        }
    }
}
