//! Herakles Process Watch Library
//!
//! Live process lifecycle monitoring for Linux. Each polling cycle samples
//! `/proc`, diffs the result against the previous cycle and emits started,
//! status-changed and stopped events. Newly started processes are handed to a
//! pluggable classifier (Groq, Ollama, or none) in the background; their
//! `Started` event is emitted once the assessment settles.
//!
//! # Features
//!
//! - **Bounded Sampling**: per-process reads fan out under a semaphore
//! - **Pure Change Detection**: `detect` works on two sample sets, no I/O
//! - **Non-blocking Enrichment**: classifier calls never delay the next cycle
//! - **Cancellable Loop**: `MonitorHandle::cancel` stops the loop between cycles
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use herakles_process_watch::{
//!     DisabledClassifier, EventSink, Monitor, MonitorSettings, ProcSampler,
//! };
//!
//! # async fn run() {
//! let sampler = Arc::new(ProcSampler::new("/proc", 10));
//! let (sink, mut events) = EventSink::channel(100);
//! let monitor = Monitor::new(
//!     sampler,
//!     Arc::new(DisabledClassifier),
//!     sink,
//!     MonitorSettings::default(),
//! );
//! let handle = monitor.start();
//!
//! while let Some(event) = events.recv().await {
//!     println!("{}", event);
//! #   break;
//! }
//!
//! handle.cancel();
//! let report = handle.stopped().await;
//! println!("{} cycles", report.stats.cycles);
//! # }
//! ```

pub mod classifier;
pub mod cli;
pub mod commands;
pub mod config;
pub mod detector;
pub mod enrichment;
pub mod error;
pub mod events;
pub mod monitor;
pub mod process;
pub mod startup_checks;
pub mod stats;

// Re-export main types for convenience
pub use classifier::{build_classifier, Classifier, DisabledClassifier, ProcessDetails, Verdict};
pub use config::Config;
pub use detector::{detect, Detection};
pub use enrichment::EnrichmentDispatcher;
pub use error::{ClassifierError, SamplingError};
pub use events::{ChangeEvent, ChangeKind, EnrichmentOutcome, EventSink};
pub use monitor::{Monitor, MonitorHandle, MonitorReport, MonitorSettings, MonitorState};
pub use process::{ProcSampler, ProcessSnapshot, SampleSet, Sampler};
pub use stats::{MonitorStats, StatsSnapshot};
