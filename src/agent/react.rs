//! Zero-shot ReAct loop over a chat model

use super::metrics::AgentMetrics;
use super::parser::{parse_action_input, parse_output, AgentStep};
use super::tool::ToolRegistry;
use crate::llm::{ChatClient, ChatMessage};
use crate::mcp::McpSession;
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Returned when the model never produces a final answer
pub const ITERATION_LIMIT_MESSAGE: &str = "Agent stopped due to iteration limit.";

const STOP_SEQUENCE: &str = "\nObservation:";

const DEFAULT_PREFIX: &str =
    "Answer the following questions about Elasticsearch logs as best you can. \
     You have access to the following tools:";

const FORMAT_INSTRUCTIONS: &str = "Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action, as a JSON object
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question";

/// Language model plus tools, driven by the ReAct text format
pub struct ReactAgent {
    llm: ChatClient,
    tools: ToolRegistry,
    max_iterations: usize,
    system_prompt: Option<String>,
    metrics: Arc<AgentMetrics>,
    session: Option<Arc<McpSession>>,
}

impl ReactAgent {
    pub fn new(llm: ChatClient, tools: ToolRegistry, max_iterations: usize) -> Self {
        Self {
            llm,
            tools,
            max_iterations: max_iterations.max(1),
            system_prompt: None,
            metrics: Arc::new(AgentMetrics::new()),
            session: None,
        }
    }

    /// Text placed before the tool list
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }

    /// Keep the MCP session alive for as long as the agent
    pub fn with_session(mut self, session: Arc<McpSession>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn metrics(&self) -> &Arc<AgentMetrics> {
        &self.metrics
    }

    fn header(&self) -> String {
        let prefix = self.system_prompt.as_deref().unwrap_or(DEFAULT_PREFIX);
        format!(
            "{}\n\n{}\n\n{}\n\nBegin!",
            prefix,
            self.tools.describe(),
            FORMAT_INSTRUCTIONS.replace("{tool_names}", &self.tools.names().join(", "))
        )
    }

    /// Answer a question, calling tools as the model asks.
    ///
    /// Only model endpoint failures are errors; tool failures are fed back
    /// to the model as observations.
    pub async fn run(&self, question: &str) -> Result<String> {
        let start = Instant::now();
        let result = self.run_inner(question).await;
        self.metrics
            .record_query(start.elapsed().as_millis() as u64, result.is_ok());
        result
    }

    async fn run_inner(&self, question: &str) -> Result<String> {
        info!("Agent question: {}", question);
        let header = self.header();
        let mut scratchpad = String::new();

        for iteration in 1..=self.max_iterations {
            let messages = [
                ChatMessage::system(header.clone()),
                ChatMessage::user(format!("Question: {}\nThought:{}", question, scratchpad)),
            ];
            let output = self
                .llm
                .chat(&messages, Some(vec![STOP_SEQUENCE.to_string()]))
                .await?;
            debug!("Model output (turn {}): {}", iteration, output);

            match parse_output(&output) {
                AgentStep::Finish(answer) => {
                    info!("Agent finished after {} turn(s)", iteration);
                    return Ok(answer);
                }
                AgentStep::Unparsed(text) => {
                    warn!("Could not parse model output, returning it as the answer");
                    return Ok(text);
                }
                AgentStep::Action { tool, input } => {
                    let observation = self.observe(&tool, &input).await;
                    scratchpad.push(' ');
                    scratchpad.push_str(output.trim());
                    scratchpad.push_str("\nObservation: ");
                    scratchpad.push_str(&observation);
                    scratchpad.push_str("\nThought:");
                }
            }
        }

        warn!("Agent hit the iteration limit ({})", self.max_iterations);
        Ok(ITERATION_LIMIT_MESSAGE.to_string())
    }

    /// Run a tool and render the outcome as an observation
    async fn observe(&self, name: &str, raw_input: &str) -> String {
        let tool = match self.tools.get(name) {
            Some(tool) => tool.clone(),
            None => {
                return format!(
                    "Error: {} is not a valid tool, try one of [{}].",
                    name,
                    self.tools.names().join(", ")
                )
            }
        };

        let input = parse_action_input(raw_input);
        info!("Calling tool {} with {}", name, input);
        let start = Instant::now();
        let result = tool.call(input).await;
        let elapsed = start.elapsed().as_millis() as u64;
        self.metrics.record_tool_call(name, elapsed, result.is_ok());

        match result {
            Ok(text) => text,
            Err(e) => {
                warn!("Tool {} failed: {:#}", name, e);
                format!("Error: {:#}", e)
            }
        }
    }

    /// Release the MCP session, if any
    pub async fn shutdown(&self) {
        if let Some(session) = &self.session {
            if let Err(e) = session.close().await {
                warn!("Failed to close MCP session: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tool::Tool;
    use crate::config::ModelSettings;
    use crate::network::HttpClient;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records its inputs; fails when asked about "boom"
    struct Recorder {
        seen: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl Tool for Recorder {
        fn name(&self) -> &str {
            "search_logs"
        }

        fn description(&self) -> &str {
            "Search logs"
        }

        fn args_schema(&self) -> Value {
            json!({"type": "object", "properties": {"query": {"type": "string"}}})
        }

        async fn call(&self, input: Value) -> anyhow::Result<String> {
            self.seen.lock().unwrap().push(input.clone());
            if input["query"] == "boom" {
                anyhow::bail!("connection refused");
            }
            Ok("2024-05-01T10:00:00Z: disk full on node-1".to_string())
        }
    }

    fn reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }

    fn agent(server: &MockServer, tool: Arc<Recorder>, max_iterations: usize) -> ReactAgent {
        let model = ModelSettings {
            endpoint: format!("{}/v1/chat/completions", server.uri()),
            ..Default::default()
        };
        let mut tools = ToolRegistry::new();
        tools.register(tool);
        ReactAgent::new(ChatClient::new(HttpClient::new().unwrap(), &model), tools, max_iterations)
    }

    fn recorder() -> Arc<Recorder> {
        Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_action_then_final_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(reply(
                "I should search.\nAction: search_logs\nAction Input: disk full",
            ))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("Observation: 2024-05-01T10:00:00Z: disk full on node-1"))
            .respond_with(reply("I now know the final answer\nFinal Answer: node-1 ran out of disk."))
            .mount(&server)
            .await;

        let tool = recorder();
        let agent = agent(&server, tool.clone(), 6);
        let answer = agent.run("Why did node-1 fail?").await.unwrap();

        assert_eq!(answer, "node-1 ran out of disk.");
        assert_eq!(tool.seen.lock().unwrap().as_slice(), &[json!({"query": "disk full"})]);

        let stats = agent.metrics().snapshot();
        assert_eq!(stats.total_queries, 1);
        assert_eq!(stats.tools["search_logs"].calls, 1);
    }

    #[tokio::test]
    async fn test_tool_error_becomes_observation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(reply("Action: search_logs\nAction Input: {\"query\": \"boom\"}"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("Observation: Error: connection refused"))
            .respond_with(reply("Final Answer: Elasticsearch is unreachable."))
            .mount(&server)
            .await;

        let agent = agent(&server, recorder(), 6);
        assert_eq!(agent.run("any errors?").await.unwrap(), "Elasticsearch is unreachable.");
        assert_eq!(agent.metrics().get_reliability("search_logs"), 0.0);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(reply("Action: delete_index\nAction Input: {}"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("Error: delete_index is not a valid tool, try one of [search_logs]."))
            .respond_with(reply("Final Answer: I cannot do that."))
            .mount(&server)
            .await;

        let agent = agent(&server, recorder(), 6);
        assert_eq!(agent.run("drop everything").await.unwrap(), "I cannot do that.");
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(reply("Action: search_logs\nAction Input: again"))
            .expect(2)
            .mount(&server)
            .await;

        let tool = recorder();
        let agent = agent(&server, tool.clone(), 2);
        assert_eq!(agent.run("loop forever").await.unwrap(), ITERATION_LIMIT_MESSAGE);
        assert_eq!(tool.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unparsed_output_is_the_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply("Hello! Ask me about your logs."))
            .mount(&server)
            .await;

        let agent = agent(&server, recorder(), 6);
        assert_eq!(agent.run("hi").await.unwrap(), "Hello! Ask me about your logs.");
    }

    #[tokio::test]
    async fn test_model_failure_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let agent = agent(&server, recorder(), 6);
        assert!(agent.run("hi").await.is_err());
        assert_eq!(agent.metrics().snapshot().failed_queries, 1);
    }
}
