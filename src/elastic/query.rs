//! Search body construction and hit formatting for the log search tool

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Field matched against the question text
pub const MESSAGE_FIELD: &str = "message";
/// Field used for the optional date range
pub const TIMESTAMP_FIELD: &str = "@timestamp";
/// Rendered when a search returns zero hits
pub const NO_LOGS_FOUND: &str = "No logs found.";

/// Arguments of the `search_logs` tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchLogsInput {
    /// Free text matched against the message field
    pub query: String,
    /// Range start, any format Elasticsearch accepts for `@timestamp`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// Range end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl SearchLogsInput {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            start_date: None,
            end_date: None,
        }
    }

    pub fn with_range(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_date = Some(start.into());
        self.end_date = Some(end.into());
        self
    }

    /// JSON schema advertised to the model
    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Text to match in the log message"},
                "start_date": {"type": "string", "description": "Optional range start, e.g. 2024-01-01T00:00:00Z"},
                "end_date": {"type": "string", "description": "Optional range end"}
            },
            "required": ["query"]
        })
    }
}

/// Build the `_search` request body.
///
/// The range clause is only added when both ends of the range are given.
pub fn build_search_body(input: &SearchLogsInput, size: usize) -> Value {
    let mut must = vec![json!({ "match": { MESSAGE_FIELD: input.query } })];

    if let (Some(start), Some(end)) = (
        input.start_date.as_deref().filter(|s| !s.is_empty()),
        input.end_date.as_deref().filter(|s| !s.is_empty()),
    ) {
        must.push(json!({
            "range": {
                TIMESTAMP_FIELD: {
                    "gte": start,
                    "lte": end
                }
            }
        }));
    }

    json!({
        "query": {
            "bool": {
                "must": must
            }
        },
        "size": size
    })
}

/// Render hits as `timestamp: message` lines
pub fn format_hits(response: &Value) -> String {
    let hits = response
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(|h| h.as_array())
        .cloned()
        .unwrap_or_default();

    let lines: Vec<String> = hits
        .iter()
        .map(|hit| {
            let source = hit.get("_source");
            let message = source
                .and_then(|s| s.get(MESSAGE_FIELD))
                .map(display_value)
                .unwrap_or_else(|| "No message".to_string());
            let timestamp = source
                .and_then(|s| s.get(TIMESTAMP_FIELD))
                .map(display_value)
                .unwrap_or_else(|| "No timestamp".to_string());
            format!("{}: {}", timestamp, message)
        })
        .collect();

    if lines.is_empty() {
        NO_LOGS_FOUND.to_string()
    } else {
        lines.join("\n")
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
