//! HTTP networking module
//!
//! Provides the HTTP client used for Elasticsearch, the model endpoint and MCP routes.

mod client;
mod request;

pub use client::HttpClient;
pub use request::{HttpMethod, HttpRequest, HttpResponse};
