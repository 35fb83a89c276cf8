//! # Model Context Protocol (MCP) payload types
//!
//! The request parameter and result types behind the minimcp method table:
//! the initialize handshake, tools, prompts, resources and progress
//! notifications. Envelope types live in `minimcp-json-rpc`.

pub mod content;
pub mod initialize;
pub mod notifications;
pub mod prompts;
pub mod resources;
pub mod tools;
pub mod version;

// Re-export main types
pub use content::ContentBlock;
pub use initialize::{
    Implementation, InitializeRequest, InitializeResult, PromptsCapabilities,
    ResourcesCapabilities, ServerCapabilities, ToolsCapabilities,
};
pub use notifications::{ProgressNotificationParams, ProgressToken};
pub use prompts::{
    GetPromptParams, GetPromptResult, ListPromptsResult, Prompt, PromptArgument, PromptMessage,
    Role,
};
pub use resources::{
    ListResourceTemplatesResult, ListResourcesResult, ReadResourceParams, ReadResourceResult,
    Resource, ResourceContents, ResourceTemplate,
};
pub use tools::{CallToolParams, CallToolResult, ListToolsResult, Tool, ToolAnnotations, ToolSchema};
pub use version::McpVersion;

/// Method names of the MCP request table
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const PING: &str = "ping";
    pub const SHUTDOWN: &str = "shutdown";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const PROMPTS_LIST: &str = "prompts/list";
    pub const PROMPTS_GET: &str = "prompts/get";
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_TEMPLATES_LIST: &str = "resources/templates/list";
    pub const RESOURCES_READ: &str = "resources/read";

    pub const NOTIFICATION_INITIALIZED: &str = "notifications/initialized";
    pub const NOTIFICATION_CANCELLED: &str = "notifications/cancelled";
    pub const NOTIFICATION_PROGRESS: &str = "notifications/progress";
}
