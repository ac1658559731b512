//! Agent loop and the tools it can call
//!
//! The model drives a ReAct loop: it reasons in text, names a tool and its
//! input, reads the observation and repeats until it gives a final answer.
//! Tools come from direct REST calls or from an MCP server.

mod builder;
mod metrics;
mod parser;
mod react;
mod tool;
mod tools;

pub use builder::{build_agent, mcp_tools, rest_tools};
pub use metrics::{AgentMetrics, AgentStats, ToolStats};
pub use parser::{parse_action_input, parse_output, AgentStep};
pub use react::{ReactAgent, ITERATION_LIMIT_MESSAGE};
pub use tool::{Tool, ToolRegistry};
pub use tools::{ClusterHealthTool, ListIndicesTool, McpTool, SearchLogsTool};
