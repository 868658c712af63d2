//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from(match format {
            ConfigFormat::Yaml => "herakles-process-watch.yaml",
            ConfigFormat::Json => "herakles-process-watch.json",
            ConfigFormat::Toml => "herakles-process-watch.toml",
        }),
    };

    let mut content = render_config(&config, format)?;
    if matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Process Watch Configuration
# ====================================
#
# Polling
# -------
# poll_interval_ms: 2000        # Time between polling cycles
# sample_concurrency: 10        # Parallel per-process reads while sampling
# proc_root: /proc              # procfs mount point
#
# Event Delivery
# --------------
# event_buffer: 100             # Capacity of the event channel
#
# Enrichment
# ----------
# max_enrichments_in_flight: 0  # Cap on concurrent classifier calls (0 = no cap)
# shutdown_grace_ms: 500        # Wait for running assessments on shutdown
#
# Logging
# -------
# log_level: "info"             # off, error, warn, info, debug, trace
#
# Classifier
# ----------
# classifier:
#   backend: groq               # groq, ollama or none
#   groq:
#     url: https://api.groq.com/openai/v1/chat/completions
#     model: llama-3.3-70b-versatile
#     api_key_env: GROQ_API_KEY # Environment variable holding the key
#     timeout_secs: 30
#   ollama:
#     url: http://localhost:11434/api/chat
#     model: llama3.2:1b
#     timeout_secs: 120
"#;

    format!("{comments}\n{yaml}")
}
