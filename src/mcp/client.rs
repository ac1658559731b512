//! Session negotiation with the Elasticsearch MCP server

use super::error::{McpError, McpResult};
use super::protocol::{
    CallToolResult, Implementation, InitializeResult, ListToolsResult, McpToolDefinition,
    PROTOCOL_VERSION,
};
use super::transport::{HttpTransport, StdioTransport, Transport, ACCEPT};
use crate::config::{ElasticsearchSettings, McpSettings, McpTransportKind};
use crate::elastic::{http_fallback, normalize_url};
use crate::network::{HttpClient, HttpRequest};
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default wait for a single MCP reply
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Safety cap on `tools/list` pages
const MAX_TOOL_PAGES: usize = 32;

/// Opens sessions to the MCP server fronting one Elasticsearch cluster
pub struct ElasticsearchMcpClient {
    http: HttpClient,
    settings: McpSettings,
    elastic_url: String,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
}

impl ElasticsearchMcpClient {
    /// Validate the cluster URL and capture what the server needs to start
    pub fn new(
        http: HttpClient,
        settings: &McpSettings,
        elastic: &ElasticsearchSettings,
    ) -> McpResult<Self> {
        let elastic_url = normalize_url(&elastic.url)?;
        let (username, password) = match elastic.credentials() {
            Some((u, p)) => (Some(u.to_string()), Some(p.to_string())),
            None => (None, None),
        };

        Ok(Self {
            http,
            settings: settings.clone(),
            elastic_url,
            username,
            password,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Override the per-request wait
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn elastic_url(&self) -> &str {
        &self.elastic_url
    }

    /// Arguments handed to the package runner for a given cluster URL
    pub fn server_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            self.settings.package.clone(),
            "--elasticsearch-url".to_string(),
            url.to_string(),
        ];
        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            args.push("--username".to_string());
            args.push(user.clone());
            args.push("--password".to_string());
            args.push(pass.clone());
        }
        args.extend(self.settings.extra_args.iter().cloned());
        args
    }

    /// Open the configured transport and run the `initialize` handshake
    pub async fn connect(&self) -> McpResult<McpSession> {
        match self.settings.transport {
            McpTransportKind::Stdio => {
                info!("Connecting to MCP server for {}", self.elastic_url);
                connect_with_fallback(&self.elastic_url, |url| self.open_stdio(url)).await
            }
            McpTransportKind::Http => {
                let raw = self
                    .settings
                    .route_url
                    .as_deref()
                    .ok_or(McpError::MissingRoute)?;
                let route = normalize_url(raw)?;
                info!("Connecting to MCP route {}", route);
                connect_with_fallback(&route, |url| self.open_http(url)).await
            }
        }
    }

    async fn open_stdio(&self, url: String) -> McpResult<McpSession> {
        let transport =
            StdioTransport::spawn(&self.settings.command, &self.server_args(&url), self.timeout)?;
        McpSession::initialize(Box::new(transport), url).await
    }

    async fn open_http(&self, url: String) -> McpResult<McpSession> {
        let http = if self.settings.verify_ssl {
            self.http.clone()
        } else {
            self.http.insecure()?
        };
        let transport = HttpTransport::new(http, url.clone());
        McpSession::initialize(Box::new(transport), url).await
    }
}

/// Run `open` against `url`; on failure, retry once over plain HTTP when the
/// URL is HTTPS on a private network host.
pub async fn connect_with_fallback<T, F, Fut>(url: &str, open: F) -> McpResult<T>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = McpResult<T>>,
{
    match open(url.to_string()).await {
        Ok(value) => Ok(value),
        Err(e) => match http_fallback(url) {
            Some(fallback) => {
                warn!("Connection to {} failed ({}), retrying with {}", url, e, fallback);
                open(fallback).await.map_err(|retry_err| {
                    error!("Fallback connection failed: {}", retry_err);
                    retry_err
                })
            }
            None => {
                error!("Failed to connect to MCP server at {}: {}", url, e);
                Err(e)
            }
        },
    }
}

/// An initialized MCP session.
///
/// Dropping the session drops the transport, which stops a subprocess
/// server; [`McpSession::close`] does the same explicitly.
pub struct McpSession {
    transport: Box<dyn Transport>,
    server_info: InitializeResult,
    endpoint: String,
}

impl McpSession {
    /// Handshake: `initialize`, then `notifications/initialized`
    pub async fn initialize(transport: Box<dyn Transport>, endpoint: String) -> McpResult<Self> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": Implementation {
                name: "es-log-agent".to_string(),
                version: crate::VERSION.to_string(),
            },
        });

        let result = transport.request("initialize", Some(params)).await?;
        let server_info: InitializeResult = serde_json::from_value(result)?;
        transport.notify("notifications/initialized", None).await?;

        if let Some(server) = &server_info.server_info {
            debug!("MCP server: {} {}", server.name, server.version);
        }
        info!("MCP session initialized successfully ({})", transport.describe());

        Ok(Self {
            transport,
            server_info,
            endpoint,
        })
    }

    pub fn server_info(&self) -> &InitializeResult {
        &self.server_info
    }

    /// URL this session was opened against, after any fallback
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Every tool the server advertises, following `nextCursor`
    pub async fn list_tools(&self) -> McpResult<Vec<McpToolDefinition>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_TOOL_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ListToolsResult =
                serde_json::from_value(self.transport.request("tools/list", params).await?)?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }

        warn!("tools/list did not finish after {} pages", MAX_TOOL_PAGES);
        Ok(tools)
    }

    /// `tools/call`
    pub async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<CallToolResult> {
        debug!("Calling MCP tool {} with {}", name, arguments);
        let result = self
            .transport
            .request(
                "tools/call",
                Some(json!({ "name": name, "arguments": arguments })),
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Custom `invoke` method: a single user message, raw result back
    pub async fn invoke(&self, question: &str) -> McpResult<Value> {
        self.transport
            .request("invoke", Some(invoke_params(question)))
            .await
    }

    pub async fn close(&self) -> McpResult<()> {
        self.transport.close().await
    }
}

fn invoke_params(question: &str) -> Value {
    json!({ "messages": [{ "role": "user", "content": question }] })
}

/// POST one `invoke` envelope to an MCP route and return status and body as-is
pub async fn send_raw_invoke(
    http: &HttpClient,
    url: &str,
    question: &str,
) -> anyhow::Result<(u16, String)> {
    let url = normalize_url(url)?;
    let envelope = json!({
        "jsonrpc": "2.0",
        "id": "1",
        "method": "invoke",
        "params": invoke_params(question),
    });
    let request = HttpRequest::post(url)
        .header("Content-Type", "application/json")
        .header("Accept", ACCEPT)
        .json(envelope);
    let response = http.execute(request).await?;
    Ok((response.status, response.text))
}

/// Console rendering of a raw `invoke` reply
pub fn render_invoke_reply(status: u16, body: &str) -> String {
    format!("Status: {}\nResponse:\n{}", status, body)
}


#[cfg(all(test, unix))]
mod stdio_tests {
    use super::*;

    /// Stands in for `npx`: ignores its arguments and speaks just enough MCP.
    const FAKE_RUNNER: &str = r#"
while IFS= read -r line; do
  case "$line" in
    *'"method":"notifications/'*) continue ;;
  esac
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      echo '{"jsonrpc":"2.0","id":'"$id"',"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"fake-es","version":"1"}}}' ;;
    *'"method":"tools/list"'*)
      echo '{"jsonrpc":"2.0","id":'"$id"',"result":{"tools":[{"name":"get_shards"}]}}' ;;
    *)
      echo '{"jsonrpc":"2.0","id":'"$id"',"result":{"content":[{"type":"text","text":"green"}]}}' ;;
  esac
done
"#;

    #[tokio::test]
    async fn test_stdio_session() {
        let script = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(script.path(), FAKE_RUNNER).unwrap();

        let mcp = McpSettings {
            command: "sh".to_string(),
            ..Default::default()
        };
        let elastic = ElasticsearchSettings::default();
        let client = ElasticsearchMcpClient::new(HttpClient::new().unwrap(), &mcp, &elastic).unwrap();

        // `sh <script> -y <package> ...`: the generated arguments become
        // positional parameters the script ignores.
        let args: Vec<String> = std::iter::once(script.path().display().to_string())
            .chain(client.server_args(client.elastic_url()))
            .collect();
        let transport = StdioTransport::spawn("sh", &args, Duration::from_secs(5)).unwrap();
        let session = McpSession::initialize(Box::new(transport), client.elastic_url().to_string())
            .await
            .unwrap();

        let tools = session.list_tools().await.unwrap();
        assert_eq!(tools[0].name, "get_shards");

        let health = session.call_tool("get_shards", json!({})).await.unwrap();
        assert_eq!(health.text(), "green");

        session.close().await.unwrap();
    }
}
