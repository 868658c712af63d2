//! Configuration management for herakles-process-watch.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use crate::classifier::groq::{DEFAULT_GROQ_KEY_ENV, DEFAULT_GROQ_MODEL, DEFAULT_GROQ_TIMEOUT_SECS, DEFAULT_GROQ_URL};
use crate::classifier::ollama::{
    DEFAULT_OLLAMA_KEY_ENV, DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_TIMEOUT_SECS, DEFAULT_OLLAMA_URL,
};
use crate::events::DEFAULT_EVENT_BUFFER;
use crate::process::DEFAULT_SAMPLE_CONCURRENCY;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 500;
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Which classifier answers for newly started processes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierBackend {
    #[default]
    Groq,
    Ollama,
    None,
}

/// Endpoint settings for one chat backend. Unset values fall back to the
/// backend's defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub model: Option<String>,
    /// Inline key; prefer `api_key_env` outside of testing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the key.
    #[serde(alias = "api-key-env")]
    pub api_key_env: Option<String>,
    #[serde(alias = "timeout-secs")]
    pub timeout_secs: Option<u64>,
}

impl BackendConfig {
    fn with_defaults(url: &str, model: &str, key_env: &str, timeout_secs: u64) -> Self {
        Self {
            url: Some(url.to_string()),
            model: Some(model.to_string()),
            api_key: None,
            api_key_env: Some(key_env.to_string()),
            timeout_secs: Some(timeout_secs),
        }
    }

    pub fn groq_defaults() -> Self {
        Self::with_defaults(
            DEFAULT_GROQ_URL,
            DEFAULT_GROQ_MODEL,
            DEFAULT_GROQ_KEY_ENV,
            DEFAULT_GROQ_TIMEOUT_SECS,
        )
    }

    pub fn ollama_defaults() -> Self {
        Self::with_defaults(
            DEFAULT_OLLAMA_URL,
            DEFAULT_OLLAMA_MODEL,
            DEFAULT_OLLAMA_KEY_ENV,
            DEFAULT_OLLAMA_TIMEOUT_SECS,
        )
    }

    /// Inline key if set, otherwise the named environment variable.
    pub fn resolve_api_key(&self, default_env: &str) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| {
                let var = self.api_key_env.as_deref().unwrap_or(default_env);
                std::env::var(var).ok().filter(|k| !k.is_empty())
            })
    }

    pub fn timeout(&self, default_secs: u64) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(default_secs))
    }
}

/// Classifier selection and backend endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub backend: ClassifierBackend,
    #[serde(default = "BackendConfig::groq_defaults")]
    pub groq: BackendConfig,
    #[serde(default = "BackendConfig::ollama_defaults")]
    pub ollama: BackendConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: ClassifierBackend::default(),
            groq: BackendConfig::groq_defaults(),
            ollama: BackendConfig::ollama_defaults(),
        }
    }
}

impl ClassifierConfig {
    /// Settings of the selected backend, if it has any.
    pub fn selected_mut(&mut self) -> Option<&mut BackendConfig> {
        match self.backend {
            ClassifierBackend::Groq => Some(&mut self.groq),
            ClassifierBackend::Ollama => Some(&mut self.ollama),
            ClassifierBackend::None => None,
        }
    }

    /// Request timeout of the selected backend.
    pub fn timeout(&self) -> Option<Duration> {
        match self.backend {
            ClassifierBackend::Groq => Some(self.groq.timeout(DEFAULT_GROQ_TIMEOUT_SECS)),
            ClassifierBackend::Ollama => Some(self.ollama.timeout(DEFAULT_OLLAMA_TIMEOUT_SECS)),
            ClassifierBackend::None => None,
        }
    }
}

/// Monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Polling
    #[serde(alias = "poll-interval-ms")]
    pub poll_interval_ms: Option<u64>,
    #[serde(alias = "sample-concurrency")]
    pub sample_concurrency: Option<usize>,
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,

    // Event delivery
    #[serde(alias = "event-buffer")]
    pub event_buffer: Option<usize>,

    // Enrichment
    /// 0 = no cap
    #[serde(alias = "max-enrichments-in-flight")]
    pub max_enrichments_in_flight: Option<usize>,
    #[serde(alias = "shutdown-grace-ms")]
    pub shutdown_grace_ms: Option<u64>,

    // Logging
    pub log_level: Option<String>,

    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: Some(DEFAULT_POLL_INTERVAL_MS),
            sample_concurrency: Some(DEFAULT_SAMPLE_CONCURRENCY),
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            event_buffer: Some(DEFAULT_EVENT_BUFFER),
            max_enrichments_in_flight: Some(0),
            shutdown_grace_ms: Some(DEFAULT_SHUTDOWN_GRACE_MS),
            log_level: Some("info".into()),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS))
    }

    pub fn sample_concurrency(&self) -> usize {
        self.sample_concurrency.unwrap_or(DEFAULT_SAMPLE_CONCURRENCY)
    }

    pub fn proc_root(&self) -> PathBuf {
        self.proc_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT))
    }

    pub fn event_buffer(&self) -> usize {
        self.event_buffer.unwrap_or(DEFAULT_EVENT_BUFFER)
    }

    /// `None` when enrichment concurrency is uncapped.
    pub fn enrichment_limit(&self) -> Option<usize> {
        self.max_enrichments_in_flight.filter(|n| *n > 0)
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(LogLevel::from_name)
            .unwrap_or_default()
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms.unwrap_or(DEFAULT_SHUTDOWN_GRACE_MS))
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.poll_interval_ms == Some(0) {
        return Err("poll_interval_ms must be greater than 0".into());
    }
    if cfg.sample_concurrency == Some(0) {
        return Err("sample_concurrency must be greater than 0".into());
    }
    if cfg.event_buffer == Some(0) {
        return Err("event_buffer must be greater than 0".into());
    }
    if let Some(level) = cfg.log_level.as_deref() {
        if LogLevel::from_name(level).is_none() {
            return Err(format!("log_level '{level}' is not one of off, error, warn, info, debug, trace").into());
        }
    }

    let (name, backend) = match cfg.classifier.backend {
        ClassifierBackend::Groq => ("groq", &cfg.classifier.groq),
        ClassifierBackend::Ollama => ("ollama", &cfg.classifier.ollama),
        ClassifierBackend::None => return Ok(()),
    };

    if backend.timeout_secs == Some(0) {
        return Err(format!("classifier.{name}.timeout_secs must be greater than 0").into());
    }
    if let Some(url) = backend.url.as_deref() {
        if url.trim().is_empty() {
            return Err(format!("classifier.{name}.url is empty").into());
        }
        if let Err(e) = reqwest::Url::parse(url) {
            return Err(format!("classifier.{name}.url '{url}' is invalid: {e}").into());
        }
    }
    if backend.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
        return Err(format!("classifier.{name}.model is empty").into());
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
/// Environment variables that override the classifier section of the file.
pub const ENV_AI_SERVICE: &str = "AI_SERVICE";
pub const ENV_GROQ_API_URL: &str = "GROQ_API_URL";
pub const ENV_GROQ_MODEL: &str = "GROQ_MODEL";
pub const ENV_OLLAMA_API_URL: &str = "OLLAMA_API_URL";
pub const ENV_OLLAMA_MODEL: &str = "OLLAMA_MODEL";

/// Merges file, environment and CLI values. Precedence: CLI > env > file > defaults.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    resolve_config_with_env(args, |key| std::env::var(key).ok())
}

fn resolve_config_with_env(
    args: &Args,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };
    apply_env_overrides(&mut config, lookup)?;

    if let Some(ms) = args.poll_interval_ms {
        config.poll_interval_ms = Some(ms);
    }
    if let Some(n) = args.concurrency {
        config.sample_concurrency = Some(n);
    }
    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }
    if let Some(n) = args.event_buffer {
        config.event_buffer = Some(n);
    }
    if let Some(n) = args.max_enrichments {
        config.max_enrichments_in_flight = Some(n);
    }
    if let Some(level) = args.log_level.and_then(|l| l.to_possible_value()) {
        config.log_level = Some(level.get_name().to_string());
    }

    // Classifier: backend first so model/endpoint land on the right section
    if let Some(backend) = args.classifier {
        config.classifier.backend = backend;
    }
    if let Some(selected) = config.classifier.selected_mut() {
        if let Some(model) = &args.model {
            selected.model = Some(model.clone());
        }
        if let Some(url) = &args.endpoint {
            selected.url = Some(url.clone());
        }
        if let Some(secs) = args.classifier_timeout_secs {
            selected.timeout_secs = Some(secs);
        }
    }

    Ok(config)
}

/// Applies `AI_SERVICE`, `GROQ_API_URL`, `GROQ_MODEL`, `OLLAMA_API_URL` and
/// `OLLAMA_MODEL`. Empty values are ignored.
pub fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), String> {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(service) = get(ENV_AI_SERVICE) {
        config.classifier.backend = ClassifierBackend::from_str(service.trim(), true)
            .map_err(|_| format!("{ENV_AI_SERVICE}={service:?} is not one of groq, ollama, none"))?;
    }
    if let Some(url) = get(ENV_GROQ_API_URL) {
        config.classifier.groq.url = Some(url);
    }
    if let Some(model) = get(ENV_GROQ_MODEL) {
        config.classifier.groq.model = Some(model);
    }
    if let Some(url) = get(ENV_OLLAMA_API_URL) {
        config.classifier.ollama.url = Some(url);
    }
    if let Some(model) = get(ENV_OLLAMA_MODEL) {
        config.classifier.ollama.model = Some(model);
    }
    Ok(())
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/herakles/process-watch.yaml",
            "/etc/herakles/process-watch.yml",
            "/etc/herakles/process-watch.json",
            "/etc/herakles/process-watch.toml",
            "./herakles-process-watch.yaml",
            "./herakles-process-watch.yml",
            "./herakles-process-watch.json",
            "./herakles-process-watch.toml",
        ];

        defaults
            .iter()
            .find(|p| Path::new(p).exists())
            .map(PathBuf::from)
            .unwrap_or_default()
    };

    if path.as_os_str().is_empty() || !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;
    let config = parse_config(&content, path.extension().and_then(|s| s.to_str()))?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Parses config text; the extension picks the format, YAML by default.
pub fn parse_config(
    content: &str,
    extension: Option<&str>,
) -> Result<Config, Box<dyn std::error::Error>> {
    Ok(match extension {
        Some("json") => serde_json::from_str(content)?,
        Some("toml") => toml::from_str(content)?,
        _ => serde_yaml::from_str(content)?,
    })
}

/// Renders configuration in the requested format.
pub fn render_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}
