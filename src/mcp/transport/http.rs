//! JSON-RPC over HTTP POST, with plain JSON or SSE replies

use super::Transport;
use crate::mcp::error::{McpError, McpResult};
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::network::{HttpClient, HttpRequest};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Accept header the MCP routes expect
pub const ACCEPT: &str = "application/json, text/event-stream";
const SESSION_HEADER: &str = "Mcp-Session-Id";

/// MCP server behind an HTTP route
pub struct HttpTransport {
    http: HttpClient,
    url: String,
    session_id: RwLock<Option<String>>,
}

impl HttpTransport {
    pub fn new(http: HttpClient, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            session_id: RwLock::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn build(&self, message: &JsonRpcRequest) -> McpResult<HttpRequest> {
        let mut request = HttpRequest::post(&self.url)
            .header("Content-Type", "application/json")
            .header("Accept", ACCEPT)
            .json(serde_json::to_value(message)?);

        if let Some(session) = self.session_id.read().ok().and_then(|s| s.clone()) {
            request = request.header(SESSION_HEADER, session);
        }
        Ok(request)
    }

    async fn post(&self, message: &JsonRpcRequest) -> McpResult<crate::network::HttpResponse> {
        let response = self.http.execute(self.build(message)?).await?;

        if let Some(session) = response.header(SESSION_HEADER) {
            if let Ok(mut guard) = self.session_id.write() {
                if guard.as_deref() != Some(session) {
                    debug!("MCP session id assigned: {}", session);
                    *guard = Some(session.to_string());
                }
            }
        }

        if !response.is_success() {
            return Err(McpError::Http {
                status: response.status,
                body: response.text,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        let id = Value::String(Uuid::new_v4().to_string());
        let message = JsonRpcRequest::new(id.clone(), method, params);
        let response = self.post(&message).await?;
        parse_http_reply(&response.text, &id)?.into_result()
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        let message = JsonRpcRequest::notification(method, params);
        self.post(&message).await.map(|_| ())
    }

    async fn close(&self) -> McpResult<()> {
        if let Ok(mut guard) = self.session_id.write() {
            *guard = None;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("http:{}", self.url)
    }
}

/// Extract the reply to `id` from a plain JSON or `text/event-stream` body.
///
/// For SSE, each event's `data:` lines are joined; the event answering `id`
/// wins, else the first event that is not a server-initiated message.
pub fn parse_http_reply(body: &str, id: &Value) -> McpResult<JsonRpcResponse> {
    let trimmed = body.trim();
    if trimmed.starts_with('{') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    let mut candidates = Vec::new();
    let mut data = String::new();
    for line in trimmed.lines().chain(std::iter::once("")) {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            if !data.is_empty() {
                if let Ok(message) = serde_json::from_str::<JsonRpcResponse>(&data) {
                    candidates.push(message);
                }
                data.clear();
            }
        } else if let Some(payload) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(payload.trim_start());
        }
    }

    if let Some(pos) = candidates.iter().position(|m| m.answers(id)) {
        return Ok(candidates.swap_remove(pos));
    }
    candidates
        .into_iter()
        .find(|m| m.method.is_none())
        .ok_or_else(|| McpError::Protocol(format!("no JSON-RPC reply in response body: {}", trimmed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    #[test]
    fn test_parse_plain_json() {
        let reply = parse_http_reply(r#"{"jsonrpc":"2.0","id":"a","result":{"x":1}}"#, &json!("a")).unwrap();
        assert_eq!(reply.into_result().unwrap()["x"], 1);
    }

    #[test]
    fn test_parse_sse_picks_matching_event() {
        let body = "event: message\r\n\
                    data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\",\"params\":{}}\r\n\
                    \r\n\
                    event: message\r\n\
                    data: {\"jsonrpc\":\"2.0\",\"id\":\"req-7\",\r\n\
                    data: \"result\":{\"answer\":42}}\r\n\
                    \r\n";
        let reply = parse_http_reply(body, &json!("req-7")).unwrap();
        assert_eq!(reply.into_result().unwrap()["answer"], 42);
    }

    #[test]
    fn test_parse_garbage_is_protocol_error() {
        assert!(matches!(
            parse_http_reply("<html>bad gateway</html>", &json!(1)),
            Err(McpError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_request_echoes_id_and_keeps_session() {
        let server = MockServer::start().await;
        // Mounted first so it wins once the session header is present.
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(header("mcp-session-id", "sess-1"))
            .respond_with(|req: &Request| {
                let body: Value = serde_json::from_slice(&req.body).unwrap();
                ResponseTemplate::new(200)
                    .set_body_json(json!({"jsonrpc": "2.0", "id": body["id"], "result": {"resumed": true}}))
            })
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .respond_with(|req: &Request| {
                let body: Value = serde_json::from_slice(&req.body).unwrap();
                let reply = json!({"jsonrpc": "2.0", "id": body["id"], "result": {"method": body["method"]}});
                ResponseTemplate::new(200)
                    .insert_header("Mcp-Session-Id", "sess-1")
                    .insert_header("Content-Type", "text/event-stream")
                    .set_body_string(format!("event: message\ndata: {}\n\n", reply))
            })
            .mount(&server)
            .await;

        let transport = HttpTransport::new(HttpClient::new().unwrap(), format!("{}/mcp", server.uri()));
        let result = transport.request("tools/list", None).await.unwrap();
        assert_eq!(result["method"], "tools/list");

        let resumed = transport.request("ping", None).await.unwrap();
        assert_eq!(resumed["resumed"], true);
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(HttpClient::new().unwrap(), server.uri());
        match transport.request("initialize", None).await {
            Err(McpError::Http { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
