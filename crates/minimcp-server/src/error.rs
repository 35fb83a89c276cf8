//! Error taxonomy for handler execution.
//!
//! [`McpError`] is what handlers return. [`McpError::kind`] is the single
//! place a failure is classified into a wire [`ErrorKind`]; transports only
//! present the result.

use std::time::Duration;

use minimcp_json_rpc::{EncodeError, ErrorKind, JsonRpcErrorObject};
use thiserror::Error;

/// Result type for handler and registry operations
pub type McpResult<T> = Result<T, McpError>;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Operation-level failure reported by a tool. Answered as a successful
    /// response whose result carries `isError: true`.
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    #[error("Handler timed out after {0:?} without activity")]
    Timeout(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Server overloaded: no handler slot within {0:?}")]
    Overloaded(Duration),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Responder(#[from] ResponderError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl McpError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        McpError::InvalidParameters(message.into())
    }

    pub fn tool_execution(message: impl Into<String>) -> Self {
        McpError::ToolExecution(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        McpError::Internal(message.into())
    }

    /// Wire classification of this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            McpError::MethodNotFound(_) => ErrorKind::MethodNotFound,
            McpError::InvalidParameters(_)
            | McpError::MissingParameter(_)
            | McpError::ToolNotFound(_)
            | McpError::PromptNotFound(_)
            | McpError::Serialization(_) => ErrorKind::InvalidParams,
            McpError::ResourceNotFound(_) => ErrorKind::ResourceNotFound,
            McpError::Timeout(_) | McpError::Cancelled => ErrorKind::ConnectionClosed,
            McpError::ToolExecution(_)
            | McpError::Overloaded(_)
            | McpError::Internal(_)
            | McpError::Configuration(_)
            | McpError::Context(_)
            | McpError::Responder(_) => ErrorKind::InternalError,
        }
    }

    /// Detail text carried in the error object's `data`. Method-not-found
    /// errors carry none so the envelope stays canonical.
    pub fn detail(&self) -> Option<String> {
        match self {
            McpError::MethodNotFound(_) => None,
            other => Some(other.to_string()),
        }
    }

    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        match self.detail() {
            Some(detail) => JsonRpcErrorObject::with_detail(self.kind(), detail),
            None => JsonRpcErrorObject::new(self.kind()),
        }
    }
}

/// Misuse of the per-request context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("No Context: called outside of an active handler invocation")]
    NoContext,

    #[error("No scope of type {0} was supplied for this request")]
    ScopeUnavailable(&'static str),
}

/// Notification sink failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("Notification sink closed")]
    Closed,

    #[error("Notification sink failed: {0}")]
    Failed(String),
}

/// Responder misuse or delivery failure
#[derive(Debug, Error)]
pub enum ResponderError {
    #[error("Responder already terminated; notification rejected")]
    Terminated,

    #[error("Responder already produced its terminal outcome")]
    AlreadyTerminated,

    #[error("Responder has no request id to answer")]
    NoRequestId,

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}
