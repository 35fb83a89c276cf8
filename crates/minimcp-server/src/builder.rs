//! MCP Server Builder

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use minimcp_protocol::Implementation;
use minimcp_protocol::methods;

use crate::error::{McpError, McpResult};
use crate::handlers::*;
use crate::limiter::{DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_CONCURRENCY, Limiter};
use crate::prompt::{McpPrompt, PromptRegistry};
use crate::resource::{McpResource, ResourceRegistry};
use crate::server::MiniMcp;
use crate::tool::{McpTool, ToolRegistry};

/// Server identity and execution limits
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub title: Option<String>,
    pub instructions: Option<String>,
    /// Inactivity window after which a running handler is cancelled
    pub idle_timeout: Duration,
    /// Handlers allowed to execute at once
    pub max_concurrency: usize,
    /// How long a message may wait for a handler slot. `None` waits indefinitely.
    pub acquire_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "minimcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: None,
            instructions: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            acquire_timeout: None,
        }
    }
}

/// Builder for [`MiniMcp`]
#[derive(Default)]
pub struct McpServerBuilder {
    config: ServerConfig,
    tools: ToolRegistry,
    prompts: PromptRegistry,
    resources: ResourceRegistry,
    validation_errors: Vec<String>,
}

impl McpServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.config.instructions = Some(instructions.into());
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.config.max_concurrency = max;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquire_timeout = Some(timeout);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn tool<T: McpTool + 'static>(mut self, tool: T) -> Self {
        if let Err(e) = self.tools.insert(Arc::new(tool)) {
            self.validation_errors.push(e.to_string());
        }
        self
    }

    pub fn prompt<P: McpPrompt + 'static>(mut self, prompt: P) -> Self {
        if let Err(e) = self.prompts.insert(Arc::new(prompt)) {
            self.validation_errors.push(e.to_string());
        }
        self
    }

    pub fn resource<R: McpResource + 'static>(mut self, resource: R) -> Self {
        if let Err(e) = self.resources.insert(Arc::new(resource)) {
            self.validation_errors.push(e.to_string());
        }
        self
    }

    /// Validate and freeze the method table.
    pub fn build(self) -> McpResult<MiniMcp> {
        if self.config.name.is_empty() {
            return Err(McpError::Configuration("Server name cannot be empty".into()));
        }
        if self.config.max_concurrency == 0 {
            return Err(McpError::Configuration(
                "max_concurrency must be at least 1".into(),
            ));
        }
        if self.config.idle_timeout.is_zero() {
            return Err(McpError::Configuration(
                "idle_timeout must be greater than zero".into(),
            ));
        }
        if !self.validation_errors.is_empty() {
            return Err(McpError::Configuration(format!(
                "Registration errors:\n{}",
                self.validation_errors.join("\n")
            )));
        }

        let mut server_info = Implementation::new(&self.config.name, &self.config.version);
        if let Some(title) = &self.config.title {
            server_info = server_info.with_title(title);
        }

        let tools = Arc::new(self.tools);
        let prompts = Arc::new(self.prompts);
        let resources = Arc::new(self.resources);

        let mut requests: HashMap<&'static str, Arc<dyn McpHandler>> = HashMap::new();
        requests.insert(
            methods::INITIALIZE,
            Arc::new(InitializeHandler::new(
                server_info,
                self.config.instructions.clone(),
            )),
        );
        requests.insert(methods::PING, Arc::new(PingHandler));
        requests.insert(methods::SHUTDOWN, Arc::new(ShutdownHandler));
        requests.insert(methods::TOOLS_LIST, Arc::new(ToolsListHandler::new(tools.clone())));
        requests.insert(methods::TOOLS_CALL, Arc::new(ToolsCallHandler::new(tools)));
        requests.insert(
            methods::PROMPTS_LIST,
            Arc::new(PromptsListHandler::new(prompts.clone())),
        );
        requests.insert(methods::PROMPTS_GET, Arc::new(PromptsGetHandler::new(prompts)));
        requests.insert(
            methods::RESOURCES_LIST,
            Arc::new(ResourcesListHandler::new(resources.clone())),
        );
        requests.insert(
            methods::RESOURCES_TEMPLATES_LIST,
            Arc::new(ResourceTemplatesListHandler::new(resources.clone())),
        );
        requests.insert(
            methods::RESOURCES_READ,
            Arc::new(ResourcesReadHandler::new(resources)),
        );

        let mut notifications: HashMap<&'static str, Arc<dyn McpHandler>> = HashMap::new();
        notifications.insert(
            methods::NOTIFICATION_INITIALIZED,
            Arc::new(InitializedNotificationHandler),
        );
        notifications.insert(
            methods::NOTIFICATION_CANCELLED,
            Arc::new(CancelledNotificationHandler),
        );

        let limiter = Limiter::new(self.config.max_concurrency, self.config.idle_timeout)
            .with_acquire_timeout(self.config.acquire_timeout);

        Ok(MiniMcp::from_parts(
            self.config,
            limiter,
            requests,
            notifications,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::resource::{FunctionResource, UriParams};
    use crate::tool::{FunctionTool, ToolArguments};
    use minimcp_protocol::{CallToolResult, ResourceContents, ResourceTemplate, Tool, ToolSchema};

    fn noop(name: &str) -> FunctionTool<impl Fn(ToolArguments, Context) -> std::future::Ready<McpResult<CallToolResult>> + Send + Sync> {
        FunctionTool::new(Tool::new(name, ToolSchema::object()), |_args, _ctx| {
            std::future::ready(Ok(CallToolResult::text("ok")))
        })
    }

    #[test]
    fn test_build_rejects_duplicate_tools() {
        let result = McpServerBuilder::new().tool(noop("a")).tool(noop("a")).build();
        assert!(matches!(result, Err(McpError::Configuration(msg)) if msg.contains("'a'")));
    }

    #[test]
    fn test_build_rejects_equivalent_resource_templates() {
        let table = |pattern: &str| {
            FunctionResource::template(
                ResourceTemplate::new(pattern, "table"),
                |uri: String, _params: UriParams, _ctx: Context| async move {
                    Ok(vec![ResourceContents::text(uri, "")])
                },
            )
        };
        let result = McpServerBuilder::new()
            .resource(table("math://tables/{n}"))
            .resource(table("math://tables/{m}"))
            .build();
        assert!(
            matches!(result, Err(McpError::Configuration(msg)) if msg.contains("math://tables/{m}"))
        );
    }

    #[test]
    fn test_build_rejects_zero_limits() {
        assert!(McpServerBuilder::new().max_concurrency(0).build().is_err());
        assert!(
            McpServerBuilder::new()
                .idle_timeout(Duration::ZERO)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_build_defaults() {
        let server = McpServerBuilder::new().name("calc").tool(noop("a")).build().unwrap();
        assert_eq!(server.config().name, "calc");
        assert_eq!(server.config().max_concurrency, 100);
        assert_eq!(server.config().idle_timeout, Duration::from_secs(30));
    }
}
