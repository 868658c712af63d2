//! CLI arguments and subcommands for herakles-process-watch.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::ClassifierBackend;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Parses the config file's `log_level` string.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "off" => Some(Self::Off),
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Json,
    Toml,
}

/// How events are written to stdout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One human-readable line per event
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Main CLI arguments structure
#[derive(Parser, Debug, Default)]
#[command(
    name = "herakles-process-watch",
    about = "Live process lifecycle monitor with AI risk assessment of new processes",
    long_about = "Live process lifecycle monitor with AI risk assessment of new processes.\n\n\
                  Polls /proc, reports processes that start, stop or change state, and asks \
                  a language model (Groq or a local Ollama) whether each new process looks \
                  malicious. Assessments run in the background and never delay polling.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "Project: https://github.com/cansp-dev/herakles-process-watch - More info: https://www.herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (overrides log_level from the config file)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Event output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Milliseconds between polling cycles
    #[arg(short = 'i', long)]
    pub poll_interval_ms: Option<u64>,

    /// Maximum concurrent per-process reads while sampling
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// procfs mount point
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Capacity of the event channel
    #[arg(long)]
    pub event_buffer: Option<usize>,

    /// Maximum classifier calls in flight (0 = no cap)
    #[arg(long)]
    pub max_enrichments: Option<usize>,

    /// Classifier backend
    #[arg(long, value_enum)]
    pub classifier: Option<ClassifierBackend>,

    /// Model name for the selected classifier backend
    #[arg(long)]
    pub model: Option<String>,

    /// Endpoint URL for the selected classifier backend
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Request timeout in seconds for the selected classifier backend
    #[arg(long)]
    pub classifier_timeout_secs: Option<u64>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Take one sample of /proc and print it
    Sample {
        /// Show at most N processes (sorted by CPU)
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Show status, memory and command line too
        #[arg(long)]
        verbose: bool,
    },

    /// Sample one process and ask the configured classifier about it
    Classify {
        /// Process ID to assess
        pid: u32,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,
    },

    /// Check runtime requirements and permissions
    CheckRequirements,
}
