//! Chat and completion calls against a self-hosted model

use super::types::*;
use crate::config::ModelSettings;
use crate::network::{HttpClient, HttpRequest};
use anyhow::{anyhow, Context, Result};
use tracing::debug;

/// Client for an OpenAI-compatible API
#[derive(Clone)]
pub struct ChatClient {
    http: HttpClient,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

impl ChatClient {
    pub fn new(http: HttpClient, settings: &ModelSettings) -> Self {
        Self {
            http,
            base_url: settings.base_url(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<crate::network::HttpResponse> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = HttpRequest::post(&url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer(key.clone());
        }

        self.http
            .execute(request)
            .await
            .with_context(|| format!("model request to {} failed", url))?
            .error_for_status()
    }

    /// Send a conversation and return the first choice's content
    pub async fn chat(&self, messages: &[ChatMessage], stop: Option<Vec<String>>) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stop,
        };
        let response: ChatResponse = self
            .post("/v1/chat/completions", serde_json::to_value(&request)?)
            .await?
            .json()?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("model returned no choices"))?;
        debug!("Model finished: {:?}", choice.finish_reason);
        Ok(choice.message.content.unwrap_or_default())
    }

    /// Plain text completion
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let response: CompletionResponse = self
            .post("/v1/completions", serde_json::to_value(&request)?)
            .await?
            .json()?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| anyhow!("model returned no choices"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer) -> ModelSettings {
        ModelSettings {
            endpoint: format!("{}/v1/chat/completions", server.uri()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_chat_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_json(json!({
                "model": "gemma-tool-agent",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ],
                "temperature": 0.0,
                "max_tokens": 2048,
                "stop": ["\nObservation:"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}]
            })))
            .mount(&server)
            .await;

        let client = ChatClient::new(HttpClient::new().unwrap(), &settings(&server));
        let reply = client
            .chat(
                &[ChatMessage::system("be brief"), ChatMessage::user("hi")],
                Some(vec!["\nObservation:".to_string()]),
            )
            .await
            .unwrap();
        assert_eq!(reply, "hello");
    }

    #[tokio::test]
    async fn test_complete_with_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .and(header("authorization", "Bearer sk-local"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"text": "green"}]
            })))
            .mount(&server)
            .await;

        let mut model = settings(&server);
        model.api_key = Some("sk-local".to_string());
        let client = ChatClient::new(HttpClient::new().unwrap(), &model);
        assert_eq!(client.complete("cluster status?").await.unwrap(), "green");
    }

    #[tokio::test]
    async fn test_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let client = ChatClient::new(HttpClient::new().unwrap(), &settings(&server));
        let err = client.chat(&[ChatMessage::user("hi")], None).await.unwrap_err();
        assert!(err.to_string().contains("no choices"));

        let err = client.complete("hi").await.unwrap_err();
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("model not loaded"));
    }
}
