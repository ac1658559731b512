//! Tool trait and registry

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Something the agent can call by name
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses in `Action:`
    fn name(&self) -> &str;

    /// One-line description shown in the prompt
    fn description(&self) -> &str;

    /// JSON schema of the expected `Action Input`
    fn args_schema(&self) -> Value;

    /// Run the tool; the returned text becomes the observation
    async fn call(&self, input: Value) -> anyhow::Result<String>;
}

/// Registry of the tools available to one agent
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Registration order, kept stable for the prompt
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// `name: description, args: {schema}` lines for the prompt
    pub fn describe(&self) -> String {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                format!(
                    "{}: {}, args: {}",
                    tool.name(),
                    tool.description(),
                    compact_properties(&tool.args_schema())
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The `properties` object of a schema, or the whole schema when absent
fn compact_properties(schema: &Value) -> String {
    schema
        .get("properties")
        .unwrap_or(schema)
        .to_string()
}
