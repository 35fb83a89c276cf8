use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::RequestParams;
use crate::types::JsonRpcVersion;

/// A JSON-RPC notification (a request without an id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<RequestParams>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method: method.into(),
            params,
        }
    }

    /// Build a notification from an arbitrary JSON value as params.
    /// Non-structured values (null, scalars) produce a notification without params.
    pub fn with_value(method: impl Into<String>, params: Value) -> Self {
        Self::new(method, RequestParams::try_from(params).ok())
    }
}
