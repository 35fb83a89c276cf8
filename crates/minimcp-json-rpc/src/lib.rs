//! # JSON-RPC 2.0 Envelope Codec
//!
//! Transport-agnostic JSON-RPC 2.0 value types for the minimcp runtime.
//! This crate turns raw text into typed messages and back, and owns the
//! process-wide tables mapping error kinds to wire codes and HTTP statuses.
//!
//! ## Features
//! - Strict `"jsonrpc": "2.0"` validation
//! - Request / Notification / Response / Error as one tagged union
//! - Batch input, with each element decoded independently
//! - Line-safe encoding (never emits a raw `\n` or `\r`)

pub mod codec;
pub mod error;
pub mod message;
pub mod notification;
pub mod request;
pub mod response;
pub mod types;

pub mod prelude;

/// Result of decoding an inbound envelope
pub type Result<T> = std::result::Result<T, InvalidMessageError>;

// Re-export main types
pub use codec::{Decoded, decode, decode_bytes, decode_message, encode, is_notification};
pub use error::{
    EncodeError, ErrorKind, InvalidMessageError, JsonRpcError, JsonRpcErrorObject,
    code_to_http_status, error_kind_to_code,
};
pub use message::JsonRpcMessage;
pub use notification::JsonRpcNotification;
pub use request::{JsonRpcRequest, RequestParams};
pub use response::JsonRpcResponse;
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Wire-exact JSON-RPC error codes used by MCP
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // MCP-specific server errors
    pub const RESOURCE_NOT_FOUND: i64 = -32002;
    pub const CONNECTION_CLOSED: i64 = -32000;
}
