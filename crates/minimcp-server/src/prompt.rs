//! Prompts: trait, closure-backed implementation and registry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use minimcp_protocol::{Prompt, PromptMessage};

use crate::context::Context;
use crate::error::{McpError, McpResult};
use crate::tool::validate_name;

/// Arguments of a `prompts/get`
pub type PromptArguments = HashMap<String, String>;

#[async_trait]
pub trait McpPrompt: Send + Sync {
    fn definition(&self) -> Prompt;

    /// Render the prompt. Required arguments are checked before this is called.
    async fn render(&self, args: PromptArguments, ctx: Context) -> McpResult<Vec<PromptMessage>>;
}

pub struct FunctionPrompt<F> {
    prompt: Prompt,
    f: F,
}

impl<F, Fut> FunctionPrompt<F>
where
    F: Fn(PromptArguments, Context) -> Fut + Send + Sync,
    Fut: Future<Output = McpResult<Vec<PromptMessage>>> + Send,
{
    pub fn new(prompt: Prompt, f: F) -> Self {
        Self { prompt, f }
    }
}

#[async_trait]
impl<F, Fut> McpPrompt for FunctionPrompt<F>
where
    F: Fn(PromptArguments, Context) -> Fut + Send + Sync,
    Fut: Future<Output = McpResult<Vec<PromptMessage>>> + Send,
{
    fn definition(&self) -> Prompt {
        self.prompt.clone()
    }

    async fn render(&self, args: PromptArguments, ctx: Context) -> McpResult<Vec<PromptMessage>> {
        (self.f)(args, ctx).await
    }
}

#[derive(Default)]
pub struct PromptRegistry {
    order: Vec<String>,
    prompts: HashMap<String, Arc<dyn McpPrompt>>,
}

impl PromptRegistry {
    pub(crate) fn insert(&mut self, prompt: Arc<dyn McpPrompt>) -> McpResult<()> {
        let name = prompt.definition().name;
        validate_name("prompt", &name)?;
        if self.prompts.contains_key(&name) {
            return Err(McpError::Configuration(format!(
                "Prompt '{}' is already registered",
                name
            )));
        }
        self.order.push(name.clone());
        self.prompts.insert(name, prompt);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn McpPrompt>> {
        self.prompts.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn definitions(&self) -> Vec<Prompt> {
        self.order
            .iter()
            .filter_map(|name| self.prompts.get(name))
            .map(|prompt| prompt.definition())
            .collect()
    }
}

/// Required arguments of `prompt` missing from `args`
pub(crate) fn missing_arguments(prompt: &Prompt, args: &PromptArguments) -> Vec<String> {
    prompt
        .arguments
        .iter()
        .filter(|arg| arg.is_required() && !args.contains_key(&arg.name))
        .map(|arg| arg.name.clone())
        .collect()
}
