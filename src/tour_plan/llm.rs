use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::LlmConfig;

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("API Error: {0}")]
    Api(String),
    #[error("completion request failed: {0}")]
    Transport(String),
    #[error("{0}")]
    MalformedBody(String),
}

/// One JSON-mode chat completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f64,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the raw `message.content` of the first choice.
    async fn complete_json(&self, req: &CompletionRequest) -> Result<String, CompletionError>;
}

#[derive(Clone)]
pub struct GroqClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GroqClient {
    pub fn new(http: Client, cfg: &LlmConfig) -> Self {
        Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn payload(&self, req: &CompletionRequest) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": req.system },
                { "role": "user", "content": req.prompt }
            ],
            "temperature": req.temperature,
            "response_format": { "type": "json_object" }
        })
    }
}

/// Message for a non-2xx completion response.
fn api_error_message(body: &str, reason: Option<&str>) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| reason.unwrap_or("unknown error").to_string())
}

fn first_choice_content(body: &Value) -> Result<String, CompletionError> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            CompletionError::MalformedBody(
                "completion response is missing choices[0].message.content".into(),
            )
        })
}

#[async_trait]
impl CompletionClient for GroqClient {
    async fn complete_json(&self, req: &CompletionRequest) -> Result<String, CompletionError> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.payload(req))
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api(api_error_message(
                &body,
                status.canonical_reason(),
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| CompletionError::MalformedBody(e.to_string()))?;
        debug!(model = %self.model, "completion received");
        first_choice_content(&body)
    }
}
