//! Assemble an agent from settings

use super::react::ReactAgent;
use super::tool::ToolRegistry;
use super::tools::{ClusterHealthTool, ListIndicesTool, McpTool, SearchLogsTool};
use crate::config::{Backend, Settings};
use crate::elastic::ElasticsearchClient;
use crate::llm::ChatClient;
use crate::mcp::{ElasticsearchMcpClient, McpSession};
use crate::network::HttpClient;
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::info;

/// Build the agent for the configured backend.
///
/// For the MCP backend this starts (or connects to) the server and
/// registers every tool it advertises.
pub async fn build_agent(settings: &Settings) -> Result<ReactAgent> {
    let http = HttpClient::with_settings(&settings.outgoing)?;
    let llm = ChatClient::new(http.clone(), &settings.model);
    info!("Model {} at {}", llm.model(), llm.base_url());

    let agent = match settings.agent.backend {
        Backend::Rest => {
            let tools = rest_tools(&http, settings)?;
            ReactAgent::new(llm, tools, settings.agent.max_iterations)
        }
        Backend::Mcp => {
            let client = ElasticsearchMcpClient::new(http, &settings.mcp, &settings.elasticsearch)?
                .with_timeout(settings.outgoing.timeout()?);
            let session = Arc::new(client.connect().await?);
            let tools = mcp_tools(&session).await?;
            ReactAgent::new(llm, tools, settings.agent.max_iterations).with_session(session)
        }
    };

    info!("Agent ready with tools: {}", agent.tools().names().join(", "));
    Ok(agent.with_system_prompt(settings.agent.system_prompt.clone()))
}

/// The direct REST tools
pub fn rest_tools(http: &HttpClient, settings: &Settings) -> Result<ToolRegistry> {
    let client = Arc::new(ElasticsearchClient::new(http.clone(), &settings.elasticsearch)?);
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(SearchLogsTool::new(client.clone())));
    tools.register(Arc::new(ListIndicesTool::new(client.clone())));
    tools.register(Arc::new(ClusterHealthTool::new(client)));
    Ok(tools)
}

/// One proxy per tool the MCP server advertises
pub async fn mcp_tools(session: &Arc<McpSession>) -> Result<ToolRegistry> {
    let definitions = session.list_tools().await?;
    if definitions.is_empty() {
        bail!("MCP server at {} advertised no tools", session.endpoint());
    }

    let mut tools = ToolRegistry::new();
    for definition in definitions {
        tools.register(Arc::new(McpTool::new(session.clone(), definition)));
    }
    Ok(tools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::McpTransportKind;
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    #[tokio::test]
    async fn test_rest_backend_tools() {
        let agent = build_agent(&Settings::default()).await.unwrap();
        assert_eq!(
            agent.tools().names(),
            vec!["search_logs", "list_indices", "cluster_health"]
        );
    }

    #[tokio::test]
    async fn test_invalid_timeout_is_rejected() {
        let mut settings = Settings::default();
        settings.outgoing.request_timeout = f64::NAN;
        assert!(build_agent(&settings).await.is_err());
    }

    #[tokio::test]
    async fn test_mcp_backend_registers_advertised_tools() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .respond_with(|req: &Request| {
                let body: Value = serde_json::from_slice(&req.body).unwrap();
                let result = match body["method"].as_str() {
                    Some("initialize") => json!({"protocolVersion": "2024-11-05", "capabilities": {}}),
                    Some("tools/list") => json!({"tools": [
                        {"name": "list_indices", "description": "List indices"},
                        {"name": "search", "inputSchema": {"type": "object"}}
                    ]}),
                    Some("tools/call") => json!({
                        "content": [{"type": "text", "text": "index not found"}],
                        "isError": true
                    }),
                    _ => return ResponseTemplate::new(202),
                };
                ResponseTemplate::new(200)
                    .set_body_json(json!({"jsonrpc": "2.0", "id": body["id"], "result": result}))
            })
            .mount(&server)
            .await;

        let mut settings = Settings::default();
        settings.agent.backend = Backend::Mcp;
        settings.mcp.transport = McpTransportKind::Http;
        settings.mcp.route_url = Some(format!("{}/mcp", server.uri()));

        let agent = build_agent(&settings).await.unwrap();
        assert_eq!(agent.tools().names(), vec!["list_indices", "search"]);

        let search = agent.tools().get("search").unwrap();
        assert_eq!(search.description(), "MCP tool search");
        let err = search.call(json!({"index": "missing"})).await.unwrap_err();
        assert_eq!(err.to_string(), "index not found");

        agent.shutdown().await;
    }
}
