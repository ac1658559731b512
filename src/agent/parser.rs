//! Parsing of ReAct-formatted model output

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

const FINAL_ANSWER: &str = "Final Answer:";

static ACTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
        .expect("valid action regex")
});

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").expect("valid fence regex"));

/// What the model asked for in one turn
#[derive(Debug, Clone, PartialEq)]
pub enum AgentStep {
    /// Call `tool` with `input`
    Action { tool: String, input: String },
    /// Done; the answer for the user
    Finish(String),
    /// Neither format matched; the raw text
    Unparsed(String),
}

/// Classify one model reply.
///
/// A `Final Answer:` wins over an action in the same reply.
pub fn parse_output(text: &str) -> AgentStep {
    if let Some(pos) = text.find(FINAL_ANSWER) {
        return AgentStep::Finish(text[pos + FINAL_ANSWER.len()..].trim().to_string());
    }

    if let Some(caps) = ACTION_RE.captures(text) {
        let tool = caps
            .get(1)
            .map(|m| m.as_str())
            .unwrap_or_default()
            .trim()
            .trim_matches(|c| c == '`' || c == '"' || c == '\'' || c == '*')
            .to_string();
        let input = caps
            .get(2)
            .map(|m| m.as_str())
            .unwrap_or_default()
            .split("\nObservation")
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        if !tool.is_empty() {
            return AgentStep::Action { tool, input };
        }
    }

    AgentStep::Unparsed(text.trim().to_string())
}

/// Turn `Action Input` text into tool arguments.
///
/// JSON objects pass through; anything else becomes `{"query": <text>}`.
pub fn parse_action_input(raw: &str) -> Value {
    let trimmed = raw.trim();
    let unfenced = FENCE_RE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    match serde_json::from_str::<Value>(unfenced) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(Value::String(s)) => json!({ "query": s }),
        Ok(Value::Null) => json!({}),
        _ => json!({ "query": unfenced.trim_matches('"') }),
    }
}
