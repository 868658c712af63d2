//! CLI command implementations for herakles-process-watch.
//!
//! This module provides implementations for all CLI subcommands:
//! - `sample`: One-shot process table listing
//! - `classify`: Assess a single running process
//! - `config`: Configuration file generation

pub mod classify;
pub mod config;
pub mod sample;

// Re-export command functions
pub use classify::command_classify;
pub use config::command_config;
pub use sample::command_sample;
