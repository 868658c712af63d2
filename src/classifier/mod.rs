//! Risk assessment of processes through an external language model.
//!
//! A `Classifier` turns process attributes into a `Verdict`. The bundled
//! implementation, `LlmClassifier`, renders a prompt, sends it through a
//! `ChatBackend` (Groq or Ollama) and parses the JSON reply.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ClassifierBackend, ClassifierConfig};
use crate::error::ClassifierError;
use crate::process::ProcessSnapshot;

pub mod groq;
pub mod ollama;

pub use groq::GroqBackend;
pub use ollama::OllamaBackend;

/// Attributes sent to the classifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessDetails {
    pub pid: u32,
    pub name: String,
    pub status: String,
    pub cpu_percent: f64,
    pub memory_percent: f32,
    pub command: String,
}

impl From<&ProcessSnapshot> for ProcessDetails {
    fn from(p: &ProcessSnapshot) -> Self {
        Self {
            pid: p.pid,
            name: p.name.clone(),
            status: p.status.clone(),
            cpu_percent: p.cpu_percent,
            memory_percent: p.memory_percent,
            command: p.command.clone(),
        }
    }
}

/// Parsed classifier answer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Verdict {
    pub description: String,
    pub malicious: bool,
}

#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn classify(&self, details: &ProcessDetails) -> Result<Verdict, ClassifierError>;
}

/// A chat-completion endpoint that answers one user prompt.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn chat(&self, prompt: &str) -> Result<String, ClassifierError>;
}

/// Classifier backed by a chat model.
pub struct LlmClassifier<B> {
    backend: B,
}

impl<B: ChatBackend> LlmClassifier<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl<B: ChatBackend> Classifier for LlmClassifier<B> {
    fn name(&self) -> &'static str {
        self.backend.name()
    }

    async fn classify(&self, details: &ProcessDetails) -> Result<Verdict, ClassifierError> {
        let reply = self.backend.chat(&build_prompt(details)).await?;
        parse_verdict(&reply)
    }
}

/// Used when no backend is configured; every call fails.
pub struct DisabledClassifier;

#[async_trait]
impl Classifier for DisabledClassifier {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn classify(&self, _details: &ProcessDetails) -> Result<Verdict, ClassifierError> {
        Err(ClassifierError::Disabled)
    }
}

pub fn build_prompt(d: &ProcessDetails) -> String {
    format!(
        "Analyze the following process details and provide a brief explanation of its purpose. \
         Then, determine if the process might be malicious. Respond in JSON format with two keys: \
         'description' (a brief explanation) and 'malicious' (true or false). \
         Process details: PID: {}, Name: {}, Status: {}, CPU: {:.2}%, Memory: {:.2}%, Command: {}.",
        d.pid, d.name, d.status, d.cpu_percent, d.memory_percent, d.command
    )
}

/// Parses `{"description": .., "malicious": ..}`. A leading "```json" (or
/// bare "```") fence and a trailing "```" are stripped independently, so a
/// reply cut off after its opening fence still parses.
pub fn parse_verdict(raw: &str) -> Result<Verdict, ClassifierError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let body = body.strip_suffix("```").unwrap_or(body).trim();

    serde_json::from_str(body).map_err(|e| ClassifierError::Malformed(e.to_string()))
}

/// Builds the classifier selected in the configuration.
pub fn build_classifier(cfg: &ClassifierConfig) -> Result<Arc<dyn Classifier>, ClassifierError> {
    let classifier: Arc<dyn Classifier> = match cfg.backend {
        ClassifierBackend::Groq => Arc::new(LlmClassifier::new(GroqBackend::from_config(&cfg.groq)?)),
        ClassifierBackend::Ollama => {
            Arc::new(LlmClassifier::new(OllamaBackend::from_config(&cfg.ollama)?))
        }
        ClassifierBackend::None => Arc::new(DisabledClassifier),
    };
    Ok(classifier)
}

/// Builds the shared reqwest client with the per-request timeout.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ClassifierError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(ClassifierError::Http)
}

/// Maps transport errors, reporting timeouts separately.
pub(crate) fn request_error(e: reqwest::Error, timeout: Duration) -> ClassifierError {
    if e.is_timeout() {
        ClassifierError::Timeout(timeout)
    } else {
        ClassifierError::Http(e)
    }
}

#[derive(Serialize)]
pub(crate) struct MessagePayload<'a> {
    pub role: &'a str,
    pub content: &'a str,
}
