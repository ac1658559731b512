//! MCP client for the Elasticsearch MCP server
//!
//! Speaks JSON-RPC 2.0 to an external server, either a subprocess launched
//! through a package runner (`npx` by default) or an HTTP route. The server
//! itself is not part of this crate.

mod client;
pub mod error;
pub mod protocol;
pub mod transport;

pub use client::{
    connect_with_fallback, render_invoke_reply, send_raw_invoke, ElasticsearchMcpClient, McpSession,
};
pub use error::{McpError, McpResult};
pub use protocol::{CallToolResult, McpToolDefinition};
pub use transport::Transport;
