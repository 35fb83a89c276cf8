//! Everything needed to define tools, prompts and resources.

pub use crate::{
    Context, FunctionPrompt, FunctionResource, FunctionTool, HandleResult, McpError, McpPrompt,
    McpResource, McpResult, McpServerBuilder, McpTool, MiniMcp, PromptArguments, Scope,
    ToolArguments, UriParams, optional_arg, required_arg,
};
pub use minimcp_protocol::{
    CallToolResult, ContentBlock, Prompt, PromptArgument, PromptMessage, Resource,
    ResourceContents, ResourceTemplate, Tool, ToolAnnotations, ToolSchema,
};
