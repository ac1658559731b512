//! Elasticsearch tools: direct REST ones and proxies for MCP server tools

use super::tool::Tool;
use crate::elastic::{ElasticsearchClient, SearchLogsInput};
use crate::mcp::{McpSession, McpToolDefinition};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Full-text log search with an optional date range
pub struct SearchLogsTool {
    client: Arc<ElasticsearchClient>,
}

impl SearchLogsTool {
    pub fn new(client: Arc<ElasticsearchClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for SearchLogsTool {
    fn name(&self) -> &str {
        "search_logs"
    }

    fn description(&self) -> &str {
        "Search Elasticsearch logs by matching the message field, optionally within a date range"
    }

    fn args_schema(&self) -> Value {
        SearchLogsInput::schema()
    }

    async fn call(&self, input: Value) -> Result<String> {
        let input: SearchLogsInput =
            serde_json::from_value(input).context("search_logs needs a \"query\" string")?;
        self.client.search_logs(&input).await
    }
}

/// Lists indices, optionally filtered by pattern
pub struct ListIndicesTool {
    client: Arc<ElasticsearchClient>,
}

impl ListIndicesTool {
    pub fn new(client: Arc<ElasticsearchClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ListIndicesTool {
    fn name(&self) -> &str {
        "list_indices"
    }

    fn description(&self) -> &str {
        "List all available Elasticsearch indices with health and document counts"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "index_pattern": {"type": "string", "description": "Optional pattern such as logs-*"}
            }
        })
    }

    async fn call(&self, input: Value) -> Result<String> {
        let pattern = input
            .get("index_pattern")
            .or_else(|| input.get("query"))
            .and_then(|v| v.as_str())
            .filter(|p| !p.contains(' '));
        let indices = self.client.list_indices(pattern).await?;
        Ok(format_indices(&indices))
    }
}

fn format_indices(indices: &[Value]) -> String {
    if indices.is_empty() {
        return "No indices found.".to_string();
    }
    let field = |v: &Value, key: &str| v.get(key).and_then(|f| f.as_str()).unwrap_or("?").to_string();
    let lines: Vec<String> = indices
        .iter()
        .map(|i| {
            format!(
                "{} (health: {}, status: {}, docs: {})",
                field(i, "index"),
                field(i, "health"),
                field(i, "status"),
                field(i, "docs.count")
            )
        })
        .collect();
    format!("Found {} indices:\n{}", indices.len(), lines.join("\n"))
}

/// Cluster health summary
pub struct ClusterHealthTool {
    client: Arc<ElasticsearchClient>,
}

impl ClusterHealthTool {
    pub fn new(client: Arc<ElasticsearchClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ClusterHealthTool {
    fn name(&self) -> &str {
        "cluster_health"
    }

    fn description(&self) -> &str {
        "Get the Elasticsearch cluster health status, node and shard counts"
    }

    fn args_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn call(&self, _input: Value) -> Result<String> {
        let health = self.client.cluster_health().await?;
        Ok(serde_json::to_string_pretty(&health)?)
    }
}

/// One tool advertised by the MCP server, forwarded through `tools/call`
pub struct McpTool {
    session: Arc<McpSession>,
    definition: McpToolDefinition,
    description: String,
}

impl McpTool {
    pub fn new(session: Arc<McpSession>, definition: McpToolDefinition) -> Self {
        let description = definition
            .description
            .clone()
            .unwrap_or_else(|| format!("MCP tool {}", definition.name));
        Self {
            session,
            definition,
            description,
        }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn args_schema(&self) -> Value {
        self.definition.input_schema.clone()
    }

    async fn call(&self, input: Value) -> Result<String> {
        let result = self.session.call_tool(&self.definition.name, input).await?;
        let text = result.text();
        if result.is_error {
            return Err(anyhow!(if text.is_empty() {
                format!("{} failed", self.definition.name)
            } else {
                text
            }));
        }
        Ok(text)
    }
}
