//! Transports carrying JSON-RPC envelopes to an MCP server

mod http;
mod stdio;

pub use http::{parse_http_reply, HttpTransport, ACCEPT};
pub use stdio::StdioTransport;

use super::error::McpResult;
use async_trait::async_trait;
use serde_json::Value;

/// A connection to one MCP server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for its result
    async fn request(&self, method: &str, params: Option<Value>) -> McpResult<Value>;

    /// Send a notification; nothing is awaited back
    async fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()>;

    /// Release the connection
    async fn close(&self) -> McpResult<()>;

    /// Where this transport points, for logs
    fn describe(&self) -> String;
}
