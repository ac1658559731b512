//! es-log-agent: natural-language questions over Elasticsearch logs
//!
//! A locally hosted model, reached through an OpenAI-compatible endpoint,
//! drives a ReAct agent whose tools query Elasticsearch either directly over
//! REST or through an MCP server. The agent is served over HTTP or used from
//! a console.

pub mod agent;
pub mod config;
pub mod elastic;
pub mod llm;
pub mod mcp;
pub mod network;
pub mod repl;
pub mod web;

pub use agent::{build_agent, ReactAgent};
pub use config::Settings;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
