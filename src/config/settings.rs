//! Settings structures for es-log-agent configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure matching settings.yml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub elasticsearch: ElasticsearchSettings,
    pub model: ModelSettings,
    pub mcp: McpSettings,
    pub agent: AgentSettings,
    pub outgoing: OutgoingSettings,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Merge with environment variables.
    ///
    /// Both the `ES_*` names of the REST variant and the `ELASTIC_*` names of
    /// the MCP variant are honored; `ES_*` wins when both are set.
    pub fn merge_env(&mut self) {
        self.merge_vars(|key| std::env::var(key).ok());
    }

    fn merge_vars<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|k| var(k).filter(|v| !v.is_empty()));

        if let Some(val) = var("MODEL_ENDPOINT") {
            self.model.endpoint = val;
        }
        if let Some(val) = var("MODEL_NAME") {
            self.model.model = val;
        }
        if let Some(val) = var("MODEL_API_KEY") {
            self.model.api_key = Some(val);
        }
        if let Some(val) = first(&["ES_URL", "ELASTIC_URL"]) {
            self.elasticsearch.url = val;
        }
        if let Some(val) = first(&["ES_USERNAME", "ELASTIC_USERNAME"]) {
            self.elasticsearch.username = Some(val);
        }
        if let Some(val) = first(&["ES_PASSWORD", "ELASTIC_PASSWORD"]) {
            self.elasticsearch.password = Some(val);
        }
        if let Some(val) = var("ES_INDEX") {
            self.elasticsearch.index = val;
        }
        if let Some(val) = var("MCP_ROUTE_URL") {
            self.mcp.route_url = Some(val);
        }
        if let Some(val) = var("ES_AGENT_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = var("ES_AGENT_BIND_ADDRESS") {
            self.server.bind_address = val;
        }
        if let Some(val) = var("ES_AGENT_BACKEND") {
            if let Ok(backend) = val.parse() {
                self.agent.backend = backend;
            }
        }
    }
}

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server port
    pub port: u16,
    /// Bind address
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_address: "0.0.0.0".to_string(),
        }
    }
}

/// Elasticsearch connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticsearchSettings {
    /// Cluster URL
    pub url: String,
    /// Basic auth user
    pub username: Option<String>,
    /// Basic auth password
    pub password: Option<String>,
    /// Index pattern searched by the REST tools
    pub index: String,
    /// Number of hits returned per search
    pub result_size: usize,
    /// Verify TLS certificates of the cluster
    pub verify_ssl: bool,
}

impl ElasticsearchSettings {
    /// Username and password, only when both are configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }
}

impl Default for ElasticsearchSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            index: "logs-*".to_string(),
            result_size: 5,
            verify_ssl: false,
        }
    }
}

/// OpenAI-compatible model endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Chat completions endpoint, or the API base URL
    pub endpoint: String,
    /// Model name sent with every request
    pub model: String,
    /// Bearer token, if the endpoint wants one
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ModelSettings {
    /// API base URL with any `/chat/completions` or `/completions` suffix removed.
    ///
    /// `http://host/v1/chat/completions` and `http://host/v1` both yield
    /// `http://host`; requests then append `/v1/...` themselves.
    pub fn base_url(&self) -> String {
        let mut base = self.endpoint.trim().trim_end_matches('/');
        for suffix in ["/chat/completions", "/completions"] {
            if let Some(stripped) = base.strip_suffix(suffix) {
                base = stripped;
                break;
            }
        }
        base.trim_end_matches('/')
            .trim_end_matches("/v1")
            .trim_end_matches('/')
            .to_string()
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/v1/chat/completions".to_string(),
            model: "gemma-tool-agent".to_string(),
            api_key: None,
            temperature: 0.0,
            max_tokens: 2048,
        }
    }
}

/// How the MCP server is reached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpTransportKind {
    /// Spawn the server as a subprocess and talk over stdin/stdout
    #[default]
    Stdio,
    /// POST JSON-RPC envelopes to an HTTP route
    Http,
}

impl std::str::FromStr for McpTransportKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            other => Err(anyhow::anyhow!("Unknown MCP transport: {}", other)),
        }
    }
}

/// MCP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpSettings {
    pub transport: McpTransportKind,
    /// Package runner used to launch the server
    pub command: String,
    /// Server package handed to the runner
    pub package: String,
    /// Extra arguments appended after the generated ones
    pub extra_args: Vec<String>,
    /// MCP route for the HTTP transport
    pub route_url: Option<String>,
    /// Verify TLS certificates of the MCP route
    pub verify_ssl: bool,
}

impl Default for McpSettings {
    fn default() -> Self {
        Self {
            transport: McpTransportKind::Stdio,
            command: "npx".to_string(),
            package: "@elastic/mcp-server-elasticsearch".to_string(),
            extra_args: Vec::new(),
            route_url: None,
            verify_ssl: false,
        }
    }
}

/// Where the agent's tools come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Direct REST calls to the cluster
    #[default]
    Rest,
    /// Tools advertised by an MCP server
    Mcp,
}

impl std::str::FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rest" => Ok(Self::Rest),
            "mcp" => Ok(Self::Mcp),
            other => Err(anyhow::anyhow!("Unknown backend: {}", other)),
        }
    }
}

/// Agent loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub backend: Backend,
    /// Maximum reasoning turns before giving up
    pub max_iterations: usize,
    /// Text placed before the tool list in the prompt
    pub system_prompt: Option<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Rest,
            max_iterations: 6,
            system_prompt: None,
        }
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Default request timeout in seconds
    pub request_timeout: f64,
    /// Verify SSL certificates
    pub verify_ssl: bool,
}

impl OutgoingSettings {
    /// Request timeout as a [`Duration`]; zero, negative and non-finite values are rejected
    pub fn timeout(&self) -> Result<std::time::Duration> {
        let secs = self.request_timeout;
        if !secs.is_finite() || secs <= 0.0 {
            anyhow::bail!("outgoing.request_timeout must be a positive number of seconds, got {}", secs);
        }
        Ok(std::time::Duration::from_secs_f64(secs))
    }
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: 60.0,
            verify_ssl: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.elasticsearch.result_size, 5);
        assert_eq!(settings.model.model, "gemma-tool-agent");
        assert_eq!(settings.agent.backend, Backend::Rest);
        assert_eq!(settings.mcp.command, "npx");
    }

    #[test]
    fn test_base_url_strips_completion_paths() {
        let mut model = ModelSettings::default();
        model.endpoint = "http://gpu:8080/v1/chat/completions".to_string();
        assert_eq!(model.base_url(), "http://gpu:8080");

        model.endpoint = "https://gpu.example/v1/".to_string();
        assert_eq!(model.base_url(), "https://gpu.example");

        model.endpoint = "http://gpu:8080/v1/completions".to_string();
        assert_eq!(model.base_url(), "http://gpu:8080");

        model.endpoint = "http://gpu:8080".to_string();
        assert_eq!(model.base_url(), "http://gpu:8080");
    }

    #[test]
    fn test_env_overlay_prefers_es_names() {
        let vars: HashMap<&str, &str> = [
            ("ES_URL", "https://10.0.0.5:9200"),
            ("ELASTIC_URL", "http://ignored:9200"),
            ("ELASTIC_USERNAME", "elastic"),
            ("ES_PASSWORD", "changeme"),
            ("ES_INDEX", "app-*"),
            ("ES_AGENT_PORT", "9001"),
            ("ES_AGENT_BACKEND", "mcp"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.merge_vars(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(settings.elasticsearch.url, "https://10.0.0.5:9200");
        assert_eq!(settings.elasticsearch.credentials(), Some(("elastic", "changeme")));
        assert_eq!(settings.elasticsearch.index, "app-*");
        assert_eq!(settings.server.port, 9001);
        assert_eq!(settings.agent.backend, Backend::Mcp);
    }

    #[test]
    fn test_request_timeout_validation() {
        let mut outgoing = OutgoingSettings::default();
        assert_eq!(outgoing.timeout().unwrap(), std::time::Duration::from_secs(60));

        for bad in [-1.0, 0.0, f64::NAN, f64::INFINITY] {
            outgoing.request_timeout = bad;
            assert!(outgoing.timeout().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_yaml_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yml");
        std::fs::write(
            &path,
            "elasticsearch:\n  index: \"nginx-*\"\nmcp:\n  transport: http\n  route_url: \"https://mcp.local/mcp\"\n",
        )
        .unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.elasticsearch.index, "nginx-*");
        assert_eq!(settings.elasticsearch.result_size, 5);
        assert_eq!(settings.mcp.transport, McpTransportKind::Http);
        assert_eq!(settings.mcp.route_url.as_deref(), Some("https://mcp.local/mcp"));
    }
}
