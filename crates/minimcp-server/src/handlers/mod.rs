//! MCP Handler System
//!
//! One [`McpHandler`] per method of the static dispatch table.

use std::sync::Arc;

use async_trait::async_trait;
use minimcp_protocol::{
    CallToolParams, CallToolResult, GetPromptParams, GetPromptResult, Implementation,
    InitializeRequest, InitializeResult, ListPromptsResult, ListResourceTemplatesResult,
    ListResourcesResult, ListToolsResult, McpVersion, PromptsCapabilities, ReadResourceParams,
    ReadResourceResult, ResourcesCapabilities, ServerCapabilities, ToolsCapabilities,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::context::Context;
use crate::error::{McpError, McpResult};
use crate::prompt::{PromptRegistry, missing_arguments};
use crate::resource::ResourceRegistry;
use crate::tool::{ToolRegistry, missing_required};

/// Generic MCP handler trait
#[async_trait]
pub trait McpHandler: Send + Sync {
    /// Handle one request or notification. The returned value becomes the
    /// `result` of the response; it is discarded for notifications.
    async fn handle(&self, params: Option<Value>, ctx: Context) -> McpResult<Value>;
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> McpResult<T> {
    let params = params.ok_or_else(|| McpError::invalid_params("Missing params"))?;
    Ok(serde_json::from_value(params)?)
}

fn to_result<T: Serialize>(result: &T) -> McpResult<Value> {
    serde_json::to_value(result)
        .map_err(|e| McpError::internal(format!("Failed to serialize result: {}", e)))
}

/// `initialize`: negotiates the protocol version and advertises capabilities.
pub struct InitializeHandler {
    server_info: Implementation,
    instructions: Option<String>,
}

impl InitializeHandler {
    pub fn new(server_info: Implementation, instructions: Option<String>) -> Self {
        Self {
            server_info,
            instructions,
        }
    }

    fn capabilities() -> ServerCapabilities {
        ServerCapabilities {
            prompts: Some(PromptsCapabilities {
                list_changed: Some(false),
            }),
            resources: Some(ResourcesCapabilities {
                subscribe: Some(false),
                list_changed: Some(false),
            }),
            tools: Some(ToolsCapabilities {
                list_changed: Some(false),
            }),
            experimental: None,
        }
    }
}

#[async_trait]
impl McpHandler for InitializeHandler {
    async fn handle(&self, params: Option<Value>, _ctx: Context) -> McpResult<Value> {
        let request: InitializeRequest = parse_params(params)?;
        let version = McpVersion::negotiate(&request.protocol_version);
        info!(
            "Initialize from {} {}: requested {}, answering {}",
            request.client_info.name, request.client_info.version, request.protocol_version, version
        );

        to_result(&InitializeResult {
            protocol_version: version.as_str().to_string(),
            capabilities: Self::capabilities(),
            server_info: self.server_info.clone(),
            instructions: self.instructions.clone(),
        })
    }
}

/// `ping`
pub struct PingHandler;

#[async_trait]
impl McpHandler for PingHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: Context) -> McpResult<Value> {
        Ok(json!({}))
    }
}

/// `shutdown`. The runtime keeps no state, so this only acknowledges.
pub struct ShutdownHandler;

#[async_trait]
impl McpHandler for ShutdownHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: Context) -> McpResult<Value> {
        info!("Shutdown requested by client");
        Ok(json!({}))
    }
}

pub struct ToolsListHandler {
    tools: Arc<ToolRegistry>,
}

impl ToolsListHandler {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl McpHandler for ToolsListHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: Context) -> McpResult<Value> {
        to_result(&ListToolsResult {
            tools: self.tools.definitions(),
        })
    }
}

/// `tools/call`. A tool's own [`McpError::ToolExecution`] is folded into a
/// successful result with `isError: true`.
pub struct ToolsCallHandler {
    tools: Arc<ToolRegistry>,
}

impl ToolsCallHandler {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl McpHandler for ToolsCallHandler {
    async fn handle(&self, params: Option<Value>, ctx: Context) -> McpResult<Value> {
        let CallToolParams { name, arguments } = parse_params(params)?;
        let tool = self
            .tools
            .get(&name)
            .ok_or_else(|| McpError::ToolNotFound(name.clone()))?;

        let args = arguments.unwrap_or_default();
        let missing = missing_required(&tool.definition(), &args);
        if !missing.is_empty() {
            return Err(McpError::invalid_params(format!(
                "Tool '{}' is missing required arguments: {}",
                name,
                missing.join(", ")
            )));
        }

        let result = match tool.call(args, ctx).await {
            Ok(result) => result,
            Err(McpError::ToolExecution(message)) => {
                debug!("Tool '{}' reported failure: {}", name, message);
                CallToolResult::error(message)
            }
            Err(e) => return Err(e),
        };
        to_result(&result)
    }
}

pub struct PromptsListHandler {
    prompts: Arc<PromptRegistry>,
}

impl PromptsListHandler {
    pub fn new(prompts: Arc<PromptRegistry>) -> Self {
        Self { prompts }
    }
}

#[async_trait]
impl McpHandler for PromptsListHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: Context) -> McpResult<Value> {
        to_result(&ListPromptsResult {
            prompts: self.prompts.definitions(),
        })
    }
}

pub struct PromptsGetHandler {
    prompts: Arc<PromptRegistry>,
}

impl PromptsGetHandler {
    pub fn new(prompts: Arc<PromptRegistry>) -> Self {
        Self { prompts }
    }
}

#[async_trait]
impl McpHandler for PromptsGetHandler {
    async fn handle(&self, params: Option<Value>, ctx: Context) -> McpResult<Value> {
        let GetPromptParams { name, arguments } = parse_params(params)?;
        let prompt = self
            .prompts
            .get(&name)
            .ok_or_else(|| McpError::PromptNotFound(name.clone()))?;

        let definition = prompt.definition();
        let missing = missing_arguments(&definition, &arguments);
        if !missing.is_empty() {
            return Err(McpError::invalid_params(format!(
                "Prompt '{}' is missing required arguments: {}",
                name,
                missing.join(", ")
            )));
        }

        let messages = prompt.render(arguments, ctx).await?;
        to_result(&GetPromptResult {
            description: definition.description,
            messages,
        })
    }
}

pub struct ResourcesListHandler {
    resources: Arc<ResourceRegistry>,
}

impl ResourcesListHandler {
    pub fn new(resources: Arc<ResourceRegistry>) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl McpHandler for ResourcesListHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: Context) -> McpResult<Value> {
        to_result(&ListResourcesResult {
            resources: self.resources.resources(),
        })
    }
}

pub struct ResourceTemplatesListHandler {
    resources: Arc<ResourceRegistry>,
}

impl ResourceTemplatesListHandler {
    pub fn new(resources: Arc<ResourceRegistry>) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl McpHandler for ResourceTemplatesListHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: Context) -> McpResult<Value> {
        to_result(&ListResourceTemplatesResult {
            resource_templates: self.resources.templates(),
        })
    }
}

pub struct ResourcesReadHandler {
    resources: Arc<ResourceRegistry>,
}

impl ResourcesReadHandler {
    pub fn new(resources: Arc<ResourceRegistry>) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl McpHandler for ResourcesReadHandler {
    async fn handle(&self, params: Option<Value>, ctx: Context) -> McpResult<Value> {
        let ReadResourceParams { uri } = parse_params(params)?;
        let (resource, uri_params) = self
            .resources
            .resolve(&uri)
            .ok_or_else(|| McpError::ResourceNotFound(uri.clone()))?;

        let contents = resource.read(uri, uri_params, ctx).await?;
        to_result(&ReadResourceResult { contents })
    }
}

/// `notifications/initialized`
pub struct InitializedNotificationHandler;

#[async_trait]
impl McpHandler for InitializedNotificationHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: Context) -> McpResult<Value> {
        debug!("Client reported initialization complete");
        Ok(Value::Null)
    }
}

/// `notifications/cancelled`. Each request owns its own execution, so there
/// is nothing shared to cancel; the notice is only logged.
pub struct CancelledNotificationHandler;

#[async_trait]
impl McpHandler for CancelledNotificationHandler {
    async fn handle(&self, params: Option<Value>, _ctx: Context) -> McpResult<Value> {
        let params = params.unwrap_or(Value::Null);
        let request_id = params.get("requestId").cloned().unwrap_or_default();
        let reason = params
            .get("reason")
            .and_then(|r| r.as_str())
            .unwrap_or("unspecified");
        debug!(
            request_id = %request_id,
            reason = %reason,
            "Client cancelled a request"
        );
        Ok(Value::Null)
    }
}
