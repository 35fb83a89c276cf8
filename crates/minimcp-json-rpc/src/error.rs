use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use thiserror::Error;

use crate::error_codes;
use crate::types::{JsonRpcVersion, RequestId};

/// Semantic error classification. Each kind maps to exactly one wire code
/// and one HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    ResourceNotFound,
    InternalError,
    ConnectionClosed,
}

impl ErrorKind {
    pub fn code(&self) -> i64 {
        match self {
            ErrorKind::ParseError => error_codes::PARSE_ERROR,
            ErrorKind::InvalidRequest => error_codes::INVALID_REQUEST,
            ErrorKind::MethodNotFound => error_codes::METHOD_NOT_FOUND,
            ErrorKind::InvalidParams => error_codes::INVALID_PARAMS,
            ErrorKind::ResourceNotFound => error_codes::RESOURCE_NOT_FOUND,
            ErrorKind::InternalError => error_codes::INTERNAL_ERROR,
            ErrorKind::ConnectionClosed => error_codes::CONNECTION_CLOSED,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::ParseError => "Parse error",
            ErrorKind::InvalidRequest => "Invalid Request",
            ErrorKind::MethodNotFound => "Method not found",
            ErrorKind::InvalidParams => "Invalid params",
            ErrorKind::ResourceNotFound => "Resource not found",
            ErrorKind::InternalError => "Internal error",
            ErrorKind::ConnectionClosed => "Connection closed",
        }
    }

    pub fn http_status(&self) -> u16 {
        code_to_http_status(self.code())
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            error_codes::PARSE_ERROR => Some(ErrorKind::ParseError),
            error_codes::INVALID_REQUEST => Some(ErrorKind::InvalidRequest),
            error_codes::METHOD_NOT_FOUND => Some(ErrorKind::MethodNotFound),
            error_codes::INVALID_PARAMS => Some(ErrorKind::InvalidParams),
            error_codes::RESOURCE_NOT_FOUND => Some(ErrorKind::ResourceNotFound),
            error_codes::INTERNAL_ERROR => Some(ErrorKind::InternalError),
            error_codes::CONNECTION_CLOSED => Some(ErrorKind::ConnectionClosed),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// Wire code for an error kind.
pub fn error_kind_to_code(kind: ErrorKind) -> i64 {
    kind.code()
}

/// HTTP status used by HTTP transports when the reply carries this error code.
/// Unknown codes are reported as 500.
pub fn code_to_http_status(code: i64) -> u16 {
    match code {
        error_codes::PARSE_ERROR | error_codes::INVALID_REQUEST => 400,
        error_codes::METHOD_NOT_FOUND | error_codes::RESOURCE_NOT_FOUND => 404,
        error_codes::INVALID_PARAMS => 400,
        error_codes::CONNECTION_CLOSED => 499,
        _ => 500,
    }
}

/// JSON-RPC Error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    /// Error object with the canonical message of `kind` and no data.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            code: kind.code(),
            message: kind.message().to_string(),
            data: None,
        }
    }

    /// Error object carrying a human readable detail and the time it was raised.
    pub fn with_detail(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            data: Some(json!({
                "detail": detail.into(),
                "isoTimestamp": chrono::Utc::now().to_rfc3339(),
            })),
            ..Self::new(kind)
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        ErrorKind::from_code(self.code)
    }

    pub fn detail(&self) -> Option<&str> {
        self.data.as_ref()?.get("detail")?.as_str()
    }
}

/// JSON-RPC Error response. `id` serializes as `null` when the request id
/// could not be recovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: Option<RequestId>,
    pub error: JsonRpcErrorObject,
}

impl JsonRpcError {
    pub fn new(id: Option<RequestId>, error: JsonRpcErrorObject) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            error,
        }
    }

    pub fn method_not_found(id: RequestId) -> Self {
        Self::new(Some(id), JsonRpcErrorObject::new(ErrorKind::MethodNotFound))
    }

    pub fn http_status(&self) -> u16 {
        code_to_http_status(self.error.code)
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "JSON-RPC Error {}: {}",
            self.error.code, self.error.message
        )
    }
}

impl std::error::Error for JsonRpcError {}

/// Envelope-level decode failure. Surfaced to the transport, which decides
/// how to present it, since the offending message may not carry an id.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {detail}")]
pub struct InvalidMessageError {
    pub kind: ErrorKind,
    pub detail: String,
    pub id: Option<RequestId>,
}

impl InvalidMessageError {
    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ParseError,
            detail: detail.into(),
            id: None,
        }
    }

    pub fn invalid_request(detail: impl Into<String>, id: Option<RequestId>) -> Self {
        Self {
            kind: ErrorKind::InvalidRequest,
            detail: detail.into(),
            id,
        }
    }

    pub fn http_status(&self) -> u16 {
        self.kind.http_status()
    }

    /// The error envelope a transport should send back for this failure.
    pub fn to_response(&self) -> JsonRpcError {
        JsonRpcError::new(
            self.id.clone(),
            JsonRpcErrorObject::with_detail(self.kind, self.detail.clone()),
        )
    }

    /// The error envelope as a single line of JSON.
    pub fn to_json(&self) -> String {
        // Serializing a JsonRpcError only fails for non-string map keys, which it never holds.
        serde_json::to_string(&self.to_response()).unwrap_or_else(|_| {
            format!(
                r#"{{"jsonrpc":"2.0","id":null,"error":{{"code":{},"message":"{}"}}}}"#,
                self.kind.code(),
                self.kind.message()
            )
        })
    }
}

/// Encoding failure
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("JSON serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encoded message contains a raw line break at byte {0}")]
    EmbeddedLineBreak(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorKind::ParseError.code(), -32700);
        assert_eq!(ErrorKind::InvalidRequest.code(), -32600);
        assert_eq!(ErrorKind::MethodNotFound.code(), -32601);
        assert_eq!(ErrorKind::InvalidParams.code(), -32602);
        assert_eq!(ErrorKind::ResourceNotFound.code(), -32002);
        assert_eq!(ErrorKind::InternalError.code(), -32603);
        assert_eq!(ErrorKind::ConnectionClosed.code(), -32000);
    }

    #[test]
    fn test_http_status_table() {
        assert_eq!(code_to_http_status(-32700), 400);
        assert_eq!(code_to_http_status(-32600), 400);
        assert_eq!(code_to_http_status(-32601), 404);
        assert_eq!(code_to_http_status(-32602), 400);
        assert_eq!(code_to_http_status(-32002), 404);
        assert_eq!(code_to_http_status(-32603), 500);
        assert_eq!(code_to_http_status(-32000), 499);
        assert_eq!(code_to_http_status(-1), 500);
    }

    #[test]
    fn test_kind_code_round_trip() {
        for kind in [
            ErrorKind::ParseError,
            ErrorKind::InvalidRequest,
            ErrorKind::MethodNotFound,
            ErrorKind::InvalidParams,
            ErrorKind::ResourceNotFound,
            ErrorKind::InternalError,
            ErrorKind::ConnectionClosed,
        ] {
            assert_eq!(ErrorKind::from_code(error_kind_to_code(kind)), Some(kind));
        }
    }

    #[test]
    fn test_method_not_found_has_no_data() {
        let error = JsonRpcError::method_not_found(RequestId::from("7"));
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(
            json,
            r#"{"jsonrpc":"2.0","id":"7","error":{"code":-32601,"message":"Method not found"}}"#
        );
    }

    #[test]
    fn test_invalid_message_error_uses_null_id() {
        let err = InvalidMessageError::parse_error("expected value at line 1 column 1");
        let value: Value = serde_json::from_str(&err.to_json()).unwrap();
        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["error"]["code"], -32700);
        assert_eq!(
            value["error"]["data"]["detail"],
            "expected value at line 1 column 1"
        );
        assert!(value["error"]["data"]["isoTimestamp"].is_string());
        assert_eq!(err.http_status(), 400);
    }
}
