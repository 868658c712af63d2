//! Lifecycle events and the sink they are delivered to.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;

use crate::process::ProcessSnapshot;

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 100;

/// Description used when the classifier could not be consulted.
pub const ANALYSIS_UNAVAILABLE: &str = "AI analysis unavailable";
pub const SUSPICIOUS_MARKER: &str = " [WARNING: Potentially Malicious]";
pub const SAFE_MARKER: &str = " [Safe]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Started,
    StatusChanged,
    Stopped,
    SamplingError,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Started => "started",
            ChangeKind::StatusChanged => "status_changed",
            ChangeKind::Stopped => "stopped",
            ChangeKind::SamplingError => "sampling_error",
        };
        f.write_str(s)
    }
}

/// Result of asking the classifier about a newly started process.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnrichmentOutcome {
    Assessed { description: String, suspicious: bool },
    Unavailable,
}

impl EnrichmentOutcome {
    /// Text shown for the Started event.
    pub fn event_description(&self) -> String {
        match self {
            EnrichmentOutcome::Assessed {
                description,
                suspicious: true,
            } => format!("{description}{SUSPICIOUS_MARKER}"),
            EnrichmentOutcome::Assessed {
                description,
                suspicious: false,
            } => format!("{description}{SAFE_MARKER}"),
            EnrichmentOutcome::Unavailable => ANALYSIS_UNAVAILABLE.to_string(),
        }
    }
}

/// One detected transition.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub timestamp: DateTime<Utc>,
    /// Absent only for sampling errors.
    pub process: Option<ProcessSnapshot>,
    pub description: String,
    /// Present only on started events.
    pub enrichment: Option<EnrichmentOutcome>,
}

impl ChangeEvent {
    pub fn started(process: ProcessSnapshot, outcome: EnrichmentOutcome) -> Self {
        Self {
            kind: ChangeKind::Started,
            timestamp: Utc::now(),
            description: outcome.event_description(),
            process: Some(process),
            enrichment: Some(outcome),
        }
    }

    pub fn status_changed(previous: &ProcessSnapshot, current: ProcessSnapshot) -> Self {
        let description = format!(
            "Process {} (PID: {}) changed status: {} → {}",
            current.name, current.pid, previous.status, current.status
        );
        Self {
            kind: ChangeKind::StatusChanged,
            timestamp: Utc::now(),
            process: Some(current),
            description,
            enrichment: None,
        }
    }

    pub fn stopped(process: ProcessSnapshot) -> Self {
        let description = format!("Process stopped: {} (PID: {})", process.name, process.pid);
        Self {
            kind: ChangeKind::Stopped,
            timestamp: Utc::now(),
            process: Some(process),
            description,
            enrichment: None,
        }
    }

    pub fn sampling_error(detail: impl fmt::Display) -> Self {
        Self {
            kind: ChangeKind::SamplingError,
            timestamp: Utc::now(),
            process: None,
            description: format!("Error retrieving processes: {detail}"),
            enrichment: None,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(|p| p.pid)
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.kind,
            self.description
        )
    }
}

/// Producer side of the bounded event channel.
///
/// `emit` waits for capacity; once the consumer is gone events are dropped
/// quietly instead of failing the producer.
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::Sender<ChangeEvent>,
}

impl EventSink {
    /// Creates a sink and the receiver an external consumer drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ChangeEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Returns false if the consumer has gone away.
    pub async fn emit(&self, event: ChangeEvent) -> bool {
        match self.tx.send(event).await {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                debug!(kind = %event.kind, pid = ?event.pid(), "event sink closed, dropping event");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
