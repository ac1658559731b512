//! Elasticsearch access over plain REST
//!
//! Builds the log search body, renders hits for the model, and validates
//! cluster URLs (also used by the MCP client).

mod client;
pub mod query;
pub mod url;

pub use client::ElasticsearchClient;
pub use query::{build_search_body, format_hits, SearchLogsInput};
pub use url::{http_fallback, is_private_host, normalize_url, UrlError};
