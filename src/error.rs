//! Error types for the sampling and classification pipeline.
//!
//! Neither error is fatal to the monitor: sampling errors surface as a single
//! event per failed cycle, classifier errors degrade one enrichment event.

use std::path::PathBuf;
use std::time::Duration;

/// The OS-level process enumeration failed.
#[derive(Debug, thiserror::Error)]
pub enum SamplingError {
    #[error("cannot enumerate processes in {}: {source}", root.display())]
    Enumerate {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A classifier call failed or returned something unusable.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("classifier returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("classifier did not answer within {0:?}")]
    Timeout(Duration),

    #[error("malformed classifier reply: {0}")]
    Malformed(String),

    #[error("classifier disabled")]
    Disabled,

    #[error("invalid classifier configuration: {0}")]
    Config(String),
}
