use crate::elastic::UrlError;
use thiserror::Error;

pub type McpResult<T> = std::result::Result<T, McpError>;

#[derive(Debug, Error)]
pub enum McpError {
    #[error(transparent)]
    Url(#[from] UrlError),

    #[error("MCP route URL is not configured")]
    MissingRoute,

    #[error("failed to spawn MCP server '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("MCP server closed the connection")]
    Closed,

    #[error("MCP request '{0}' timed out")]
    Timeout(String),

    #[error("MCP server returned error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("MCP route answered HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("MCP transport error: {0}")]
    Transport(#[from] anyhow::Error),
}
