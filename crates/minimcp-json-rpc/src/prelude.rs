//! Commonly used JSON-RPC types.

pub use crate::{
    Decoded, ErrorKind, InvalidMessageError, JsonRpcError, JsonRpcErrorObject, JsonRpcMessage,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId, RequestParams, decode,
    encode, is_notification,
};
