//! Resources: static URIs and `{param}` templates.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use minimcp_protocol::{Resource, ResourceContents, ResourceTemplate};

use crate::context::Context;
use crate::error::{McpError, McpResult};
use crate::tool::validate_name;
use crate::uri_template::UriTemplate;

/// Template variables extracted from a read URI (empty for static resources)
pub type UriParams = HashMap<String, String>;

/// What a resource is listed as
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceDefinition {
    Static(Resource),
    Template(ResourceTemplate),
}

impl ResourceDefinition {
    pub fn name(&self) -> &str {
        match self {
            ResourceDefinition::Static(r) => &r.name,
            ResourceDefinition::Template(t) => &t.name,
        }
    }
}

#[async_trait]
pub trait McpResource: Send + Sync {
    fn definition(&self) -> ResourceDefinition;

    async fn read(&self, uri: String, params: UriParams, ctx: Context)
    -> McpResult<Vec<ResourceContents>>;
}

pub struct FunctionResource<F> {
    definition: ResourceDefinition,
    f: F,
}

impl<F, Fut> FunctionResource<F>
where
    F: Fn(String, UriParams, Context) -> Fut + Send + Sync,
    Fut: Future<Output = McpResult<Vec<ResourceContents>>> + Send,
{
    pub fn new(resource: Resource, f: F) -> Self {
        Self {
            definition: ResourceDefinition::Static(resource),
            f,
        }
    }

    pub fn template(template: ResourceTemplate, f: F) -> Self {
        Self {
            definition: ResourceDefinition::Template(template),
            f,
        }
    }
}

#[async_trait]
impl<F, Fut> McpResource for FunctionResource<F>
where
    F: Fn(String, UriParams, Context) -> Fut + Send + Sync,
    Fut: Future<Output = McpResult<Vec<ResourceContents>>> + Send,
{
    fn definition(&self) -> ResourceDefinition {
        self.definition.clone()
    }

    async fn read(
        &self,
        uri: String,
        params: UriParams,
        ctx: Context,
    ) -> McpResult<Vec<ResourceContents>> {
        (self.f)(uri, params, ctx).await
    }
}

/// Static resources keyed by exact URI, then templates tried in registration order
#[derive(Default)]
pub struct ResourceRegistry {
    statics: Vec<(Resource, Arc<dyn McpResource>)>,
    by_uri: HashMap<String, usize>,
    templates: Vec<(ResourceTemplate, UriTemplate, Arc<dyn McpResource>)>,
}

impl ResourceRegistry {
    pub(crate) fn insert(&mut self, resource: Arc<dyn McpResource>) -> McpResult<()> {
        match resource.definition() {
            ResourceDefinition::Static(def) => {
                validate_name("resource", &def.name)?;
                if self.by_uri.contains_key(&def.uri) || self.template_key_taken(&def.uri) {
                    return Err(McpError::Configuration(format!(
                        "Resource '{}' is already registered",
                        def.uri
                    )));
                }
                self.by_uri.insert(def.uri.clone(), self.statics.len());
                self.statics.push((def, resource));
            }
            ResourceDefinition::Template(def) => {
                validate_name("resource template", &def.name)?;
                let compiled = UriTemplate::new(&def.uri_template)?;
                let key = compiled.normalized();
                if self.template_key_taken(key) || self.by_uri.contains_key(key) {
                    return Err(McpError::Configuration(format!(
                        "Resource template '{}' is already registered",
                        def.uri_template
                    )));
                }
                self.templates.push((def, compiled, resource));
            }
        }
        Ok(())
    }

    fn template_key_taken(&self, key: &str) -> bool {
        self.templates.iter().any(|(_, t, _)| t.normalized() == key)
    }

    pub fn is_empty(&self) -> bool {
        self.statics.is_empty() && self.templates.is_empty()
    }

    pub fn resources(&self) -> Vec<Resource> {
        self.statics.iter().map(|(def, _)| def.clone()).collect()
    }

    pub fn templates(&self) -> Vec<ResourceTemplate> {
        self.templates.iter().map(|(def, _, _)| def.clone()).collect()
    }

    /// Exact URI first, then the first matching template.
    pub fn resolve(&self, uri: &str) -> Option<(Arc<dyn McpResource>, UriParams)> {
        if let Some(&index) = self.by_uri.get(uri) {
            return Some((self.statics[index].1.clone(), UriParams::new()));
        }
        self.templates.iter().find_map(|(_, compiled, resource)| {
            compiled
                .match_uri(uri)
                .map(|params| (resource.clone(), params))
        })
    }
}
