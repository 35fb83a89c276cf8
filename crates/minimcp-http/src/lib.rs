//! # HTTP transports for minimcp
//!
//! Two adapters over [`MiniMcp::handle`](minimcp_server::MiniMcp::handle),
//! one POST per JSON-RPC message:
//!
//! - [`HttpTransport`]: always answers with a single `application/json` body.
//! - [`StreamableHttpTransport`]: answers with `application/json` when the
//!   handler finishes without notifying, and upgrades to a
//!   `text/event-stream` body as soon as it sends its first notification.
//!
//! [`HttpMcpServer`] binds either adapter to a TCP listener with hyper,
//! routing the configured MCP path and applying CORS headers.

pub mod cors;
pub mod plain_http;
pub mod protocol;
pub mod server;
pub mod sse;
pub mod streamable_http;

#[cfg(test)]
mod tests;

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;

// Re-export main types
pub use cors::CorsLayer;
pub use plain_http::HttpTransport;
pub use protocol::{accepts, extract_protocol_version, is_initialize, is_json_content};
pub use server::{HttpMcpServer, HttpMcpServerBuilder, HttpServerConfig};
pub use sse::SseEvent;
pub use streamable_http::StreamableHttpTransport;

/// Response body shared by both transports: a full JSON body or an SSE stream
pub type McpBody = UnsyncBoxBody<Bytes, hyper::Error>;

/// Result type for HTTP MCP operations
pub type Result<T> = std::result::Result<T, HttpMcpError>;

/// HTTP MCP specific errors
#[derive(Debug, thiserror::Error)]
pub enum HttpMcpError {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}
