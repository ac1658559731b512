//! Direct REST access to the cluster

use super::query::{build_search_body, format_hits, SearchLogsInput};
use super::url::normalize_url;
use crate::config::ElasticsearchSettings;
use crate::network::{HttpClient, HttpRequest, HttpResponse};
use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};

/// REST client for log search and a few read-only cluster endpoints
#[derive(Clone)]
pub struct ElasticsearchClient {
    http: HttpClient,
    base_url: String,
    index: String,
    result_size: usize,
    credentials: Option<(String, String)>,
}

impl ElasticsearchClient {
    /// Create a client, validating the cluster URL.
    ///
    /// TLS verification follows `settings.verify_ssl`, independent of the
    /// shared client's own setting.
    pub fn new(http: HttpClient, settings: &ElasticsearchSettings) -> Result<Self> {
        let base_url = normalize_url(&settings.url)?;
        let http = if settings.verify_ssl {
            http
        } else {
            http.insecure()?
        };

        info!("Elasticsearch REST client for {} (index {})", base_url, settings.index);

        Ok(Self {
            http,
            base_url,
            index: settings.index.clone(),
            result_size: settings.result_size,
            credentials: settings
                .credentials()
                .map(|(u, p)| (u.to_string(), p.to_string())),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    fn authorize(&self, request: HttpRequest) -> HttpRequest {
        match &self.credentials {
            Some((user, pass)) => request.basic_auth(user.clone(), pass.clone()),
            None => request,
        }
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let request = self.authorize(request);
        let url = request.url.clone();
        self.http
            .execute(request)
            .await
            .with_context(|| format!("request to {} failed", url))?
            .error_for_status()
    }

    /// Raw `_search` against the configured index
    pub async fn search(&self, body: Value) -> Result<Value> {
        let url = format!("{}/{}/_search", self.base_url, self.index);
        debug!("Search body: {}", body);
        let request = HttpRequest::get(url)
            .header("Content-Type", "application/json")
            .json(body);
        self.send(request).await?.json()
    }

    /// Match the question against log messages and render the top hits
    pub async fn search_logs(&self, input: &SearchLogsInput) -> Result<String> {
        let body = build_search_body(input, self.result_size);
        let response = self.search(body).await?;
        Ok(format_hits(&response))
    }

    /// `GET /_cluster/health`
    pub async fn cluster_health(&self) -> Result<Value> {
        let request = HttpRequest::get(format!("{}/_cluster/health", self.base_url));
        self.send(request).await?.json()
    }

    /// `GET /_cat/indices?format=json`
    pub async fn list_indices(&self, pattern: Option<&str>) -> Result<Vec<Value>> {
        let url = match pattern.filter(|p| !p.trim().is_empty()) {
            Some(p) => format!("{}/_cat/indices/{}", self.base_url, p.trim()),
            None => format!("{}/_cat/indices", self.base_url),
        };
        let request = HttpRequest::get(url)
            .param("format", "json")
            .param("h", "index,health,status,docs.count");
        self.send(request).await?.json()
    }
}
