//! # minimcp server
//!
//! A stateless Model Context Protocol runtime. A caller hands [`MiniMcp::handle`]
//! one raw JSON-RPC message and gets back one raw reply, or
//! [`HandleResult::NoMessage`] for notifications. How the bytes travel is the
//! business of a transport: [`stdio::StdioTransport`] here, HTTP in
//! `minimcp-http`.
//!
//! ## Features
//! - Static method table: `initialize`, `ping`, `shutdown`, `tools/*`, `prompts/*`, `resources/*`
//! - Bounded concurrency with a resettable idle watchdog per handler
//! - Per-request [`Context`] reachable from anywhere inside the handler
//! - [`Responder`] that streams notifications ahead of the final result
//! - Tool failures reported to the model as results, not protocol errors
//!
//! ```no_run
//! use minimcp_server::prelude::*;
//! use minimcp_server::stdio::StdioTransport;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let add = FunctionTool::new(
//!     Tool::new("add", ToolSchema::object().with_required("a").with_required("b")),
//!     |args: ToolArguments, _ctx: Context| async move {
//!         let a: f64 = required_arg(&args, "a")?;
//!         let b: f64 = required_arg(&args, "b")?;
//!         Ok(CallToolResult::text((a + b).to_string()))
//!     },
//! );
//!
//! let server = MiniMcp::builder().name("calc").tool(add).build()?;
//! StdioTransport::new(server).run().await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod context;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod prompt;
pub mod resource;
pub mod responder;
pub mod server;
pub mod stdio;
pub mod tool;
pub mod uri_template;

pub mod prelude;

#[cfg(test)]
mod tests;

pub use builder::{McpServerBuilder, ServerConfig};
pub use context::{Context, Scope};
pub use error::{ContextError, McpError, McpResult, ResponderError, SinkError};
pub use handlers::McpHandler;
pub use limiter::{IdleHandle, Limiter, LimiterGuard};
pub use prompt::{FunctionPrompt, McpPrompt, PromptArguments};
pub use resource::{FunctionResource, McpResource, ResourceDefinition, UriParams};
pub use responder::{NotificationSink, Responder};
pub use server::{HandleResult, MiniMcp, RequestState};
pub use tool::{FunctionTool, McpTool, ToolArguments, optional_arg, required_arg};

// Re-export the layers below for transport and tool authors
pub use minimcp_json_rpc;
pub use minimcp_protocol;
