//! Startup requirement validation for herakles-process-watch.
//!
//! This module validates that the monitor can see the processes it is meant
//! to watch before the polling loop starts.

use nix::unistd::geteuid;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{error, info, warn};

use crate::config::{ClassifierBackend, Config};
use crate::process::scanner::collect_proc_entries;

/// Validate all runtime requirements
pub fn validate_requirements(config: &Config) -> Result<(), ValidationError> {
    info!("🔍 Validating runtime requirements...");

    check_user_privileges();
    check_proc_access(&config.proc_root())?;
    check_classifier_credentials(config);

    info!("✅ All runtime requirements validated");
    Ok(())
}

/// Check if running with sufficient privileges
fn check_user_privileges() {
    if !geteuid().is_root() {
        warn!("⚠️  Not running as root - command lines of other users' processes may be hidden");
    } else {
        info!("✅ Running as root (uid=0)");
    }
}

/// Check that the proc root can be listed and init's status can be read
fn check_proc_access(root: &Path) -> Result<(), ValidationError> {
    let entries = match collect_proc_entries(root) {
        Ok(entries) => entries,
        Err(e) => {
            error!("❌ Cannot list {}: {}", root.display(), e);
            return Err(ValidationError::ProcUnavailable(format!(
                "{}: {}",
                root.display(),
                e
            )));
        }
    };
    if entries.is_empty() {
        error!("❌ {} contains no process directories", root.display());
        return Err(ValidationError::ProcUnavailable(format!(
            "{}: no process directories",
            root.display()
        )));
    }
    info!("✅ {} lists {} processes", root.display(), entries.len());

    let test_file = root.join("1").join("cmdline");
    match fs::read(&test_file) {
        Ok(_) => {
            info!("✅ Can read {}", test_file.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            error!("❌ Cannot read {} - insufficient permissions", test_file.display());
            error!("   Command lines of foreign processes will be reported as empty.");
            error!("   Run as root or grant cap_sys_ptrace.");
            Err(ValidationError::InsufficientPermissions(e.to_string()))
        }
        Err(e) => {
            warn!("⚠️  Could not test {}: {}", test_file.display(), e);
            Ok(())
        }
    }
}

/// Warn when the selected backend will be unable to authenticate
fn check_classifier_credentials(config: &Config) {
    let classifier = &config.classifier;
    match classifier.backend {
        ClassifierBackend::Groq => {
            if classifier
                .groq
                .resolve_api_key(crate::classifier::groq::DEFAULT_GROQ_KEY_ENV)
                .is_none()
            {
                warn!("⚠️  No Groq API key configured - every assessment will be unavailable");
            } else {
                info!("✅ Groq API key present");
            }
        }
        ClassifierBackend::Ollama => {
            info!(
                "✅ Using Ollama at {}",
                classifier
                    .ollama
                    .url
                    .as_deref()
                    .unwrap_or(crate::classifier::ollama::DEFAULT_OLLAMA_URL)
            );
        }
        ClassifierBackend::None => {
            info!("ℹ️  Classifier disabled - new processes are reported without assessment");
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("proc filesystem unavailable: {0}")]
    ProcUnavailable(String),
}
