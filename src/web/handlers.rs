//! HTTP request handlers

use super::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Body of `GET /`
pub const ROOT_MESSAGE: &str = "Elasticsearch log agent is running.";
/// Error for a `/query` body without a question
pub const MISSING_QUESTION: &str = "Missing 'question' in body";

/// `POST /query` body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Liveness message
pub async fn index() -> impl IntoResponse {
    Json(serde_json::json!({ "message": ROOT_MESSAGE }))
}

/// Ask the agent a question.
///
/// The body is parsed by hand so a missing `Content-Type` is not a 415.
pub async fn query(State(state): State<AppState>, body: Bytes) -> Response {
    let request: QueryRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {}", e)),
    };

    let question = match request.question.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => q.to_string(),
        _ => return error_response(StatusCode::BAD_REQUEST, MISSING_QUESTION),
    };

    info!("Received query: {}", question);
    match state.agent.run(&question).await {
        Ok(response) => Json(QueryResponse { response }).into_response(),
        Err(e) => {
            error!("Agent failed: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {:#}", e))
        }
    }
}

/// Agent statistics
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.stats())
}

/// Health check handler
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION
    }))
}
