//! Tools: trait, closure-backed implementation and registry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use minimcp_protocol::{CallToolResult, Tool};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::{McpError, McpResult};

/// Arguments of a `tools/call`
pub type ToolArguments = Map<String, Value>;

/// A callable tool.
///
/// Return [`McpError::ToolExecution`] for operation failures the model
/// should see (answered as a result with `isError: true`). Any other error
/// is a protocol failure.
#[async_trait]
pub trait McpTool: Send + Sync {
    fn definition(&self) -> Tool;

    async fn call(&self, args: ToolArguments, ctx: Context) -> McpResult<CallToolResult>;
}

/// Tool backed by an async closure
pub struct FunctionTool<F> {
    tool: Tool,
    f: F,
}

impl<F, Fut> FunctionTool<F>
where
    F: Fn(ToolArguments, Context) -> Fut + Send + Sync,
    Fut: Future<Output = McpResult<CallToolResult>> + Send,
{
    pub fn new(tool: Tool, f: F) -> Self {
        Self { tool, f }
    }
}

#[async_trait]
impl<F, Fut> McpTool for FunctionTool<F>
where
    F: Fn(ToolArguments, Context) -> Fut + Send + Sync,
    Fut: Future<Output = McpResult<CallToolResult>> + Send,
{
    fn definition(&self) -> Tool {
        self.tool.clone()
    }

    async fn call(&self, args: ToolArguments, ctx: Context) -> McpResult<CallToolResult> {
        (self.f)(args, ctx).await
    }
}

/// Typed lookup of a required argument
pub fn required_arg<T: DeserializeOwned>(args: &ToolArguments, name: &str) -> McpResult<T> {
    let value = args
        .get(name)
        .ok_or_else(|| McpError::MissingParameter(name.to_string()))?;
    serde_json::from_value(value.clone())
        .map_err(|e| McpError::invalid_params(format!("Argument '{}': {}", name, e)))
}

/// Typed lookup of an optional argument
pub fn optional_arg<T: DeserializeOwned>(args: &ToolArguments, name: &str) -> McpResult<Option<T>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => required_arg(args, name).map(Some),
    }
}

/// Name-keyed tool table, immutable once the server is built
#[derive(Default)]
pub struct ToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, Arc<dyn McpTool>>,
}

impl ToolRegistry {
    pub(crate) fn insert(&mut self, tool: Arc<dyn McpTool>) -> McpResult<()> {
        let name = tool.definition().name;
        validate_name("tool", &name)?;
        if self.tools.contains_key(&name) {
            return Err(McpError::Configuration(format!(
                "Tool '{}' is already registered",
                name
            )));
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn McpTool>> {
        self.tools.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Definitions in registration order
    pub fn definitions(&self) -> Vec<Tool> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }
}

pub(crate) fn validate_name(kind: &str, name: &str) -> McpResult<()> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(McpError::Configuration(format!(
            "Invalid {} name '{}': must be non-empty without whitespace",
            kind, name
        )));
    }
    Ok(())
}

/// Arguments named in the tool's `required` list but absent from the call
pub(crate) fn missing_required(tool: &Tool, args: &ToolArguments) -> Vec<String> {
    tool.input_schema
        .required
        .iter()
        .filter(|name| !args.contains_key(name.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use minimcp_protocol::ToolSchema;
    use serde_json::json;

    fn echo() -> Arc<dyn McpTool> {
        Arc::new(FunctionTool::new(
            Tool::new("echo", ToolSchema::object().with_required("text")),
            |args: ToolArguments, _ctx: Context| async move {
                let text: String = required_arg(&args, "text")?;
                Ok(CallToolResult::text(text))
            },
        ))
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = ToolRegistry::default();
        registry.insert(echo()).unwrap();
        assert!(matches!(
            registry.insert(echo()),
            Err(McpError::Configuration(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_arg_helpers() {
        let args = json!({"a": 2.5, "flag": null, "s": "x"});
        let args = args.as_object().unwrap();

        assert_eq!(required_arg::<f64>(args, "a").unwrap(), 2.5);
        assert!(matches!(
            required_arg::<f64>(args, "b"),
            Err(McpError::MissingParameter(_))
        ));
        assert!(matches!(
            required_arg::<f64>(args, "s"),
            Err(McpError::InvalidParameters(_))
        ));
        assert_eq!(optional_arg::<bool>(args, "flag").unwrap(), None);
    }

    #[test]
    fn test_missing_required() {
        let tool = echo().definition();
        assert_eq!(missing_required(&tool, &Map::new()), vec!["text".to_string()]);
    }

    #[test]
    fn test_invalid_names() {
        assert!(validate_name("tool", "").is_err());
        assert!(validate_name("tool", "two words").is_err());
        assert!(validate_name("tool", "math.add").is_ok());
    }
}
