//! Groq (OpenAI-compatible chat completions) backend.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::{http_client, request_error, ChatBackend, MessagePayload};
use crate::config::BackendConfig;
use crate::error::ClassifierError;

pub const DEFAULT_GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_GROQ_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_GROQ_KEY_ENV: &str = "GROQ_API_KEY";

#[derive(Clone)]
pub struct GroqBackend {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl GroqBackend {
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClassifierError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ClassifierError::Config(format!("invalid Groq URL '{endpoint}': {e}")))?;
        Ok(Self {
            client: http_client(timeout)?,
            endpoint,
            model: model.into(),
            api_key: api_key.into(),
            timeout,
        })
    }

    pub fn from_config(cfg: &BackendConfig) -> Result<Self, ClassifierError> {
        Self::new(
            cfg.url.as_deref().unwrap_or(DEFAULT_GROQ_URL),
            cfg.model.as_deref().unwrap_or(DEFAULT_GROQ_MODEL),
            cfg.resolve_api_key(DEFAULT_GROQ_KEY_ENV).unwrap_or_default(),
            cfg.timeout(DEFAULT_GROQ_TIMEOUT_SECS),
        )
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [MessagePayload<'a>; 1],
}

#[async_trait]
impl ChatBackend for GroqBackend {
    fn name(&self) -> &'static str {
        "groq"
    }

    async fn chat(&self, prompt: &str) -> Result<String, ClassifierError> {
        let payload = ChatRequest {
            model: &self.model,
            messages: [MessagePayload {
                role: "user",
                content: prompt,
            }],
        };
        let resp = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;
        if !resp.status().is_success() {
            return Err(ClassifierError::Status(resp.status()));
        }
        let value: Value = resp
            .json()
            .await
            .map_err(|e| request_error(e, self.timeout))?;
        extract_message(&value)
    }
}

/// Pulls `choices[0].message.content` out of a completion.
fn extract_message(value: &Value) -> Result<String, ClassifierError> {
    let choices = value
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| ClassifierError::Malformed("completion missing choices array".into()))?;
    let first = choices
        .first()
        .ok_or_else(|| ClassifierError::Malformed("no choices in groq response".into()))?;
    first
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| ClassifierError::Malformed("completion missing message content".into()))
}
