//! Ollama `/api/chat` backend, usually a local model.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{http_client, request_error, ChatBackend, MessagePayload};
use crate::config::BackendConfig;
use crate::error::ClassifierError;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/api/chat";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:1b";
pub const DEFAULT_OLLAMA_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_OLLAMA_KEY_ENV: &str = "OLLAMA_API_KEY";

#[derive(Clone)]
pub struct OllamaBackend {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl OllamaBackend {
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClassifierError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            ClassifierError::Config(format!("invalid Ollama URL '{endpoint}': {e}"))
        })?;
        Ok(Self {
            client: http_client(timeout)?,
            endpoint,
            model: model.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout,
        })
    }

    pub fn from_config(cfg: &BackendConfig) -> Result<Self, ClassifierError> {
        Self::new(
            cfg.url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL),
            cfg.model.as_deref().unwrap_or(DEFAULT_OLLAMA_MODEL),
            cfg.resolve_api_key(DEFAULT_OLLAMA_KEY_ENV),
            cfg.timeout(DEFAULT_OLLAMA_TIMEOUT_SECS),
        )
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [MessagePayload<'a>; 1],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn chat(&self, prompt: &str) -> Result<String, ClassifierError> {
        let payload = ChatRequest {
            model: &self.model,
            messages: [MessagePayload {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };
        let mut request = self.client.post(self.endpoint.clone()).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;
        if !resp.status().is_success() {
            return Err(ClassifierError::Status(resp.status()));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| request_error(e, self.timeout))?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| ClassifierError::Malformed(e.to_string()))?;
        Ok(parsed.message.content)
    }
}
