//! Process-table sampling.
//!
//! This module provides:
//! - `snapshot`: per-process observations and the sample set
//! - `scanner`: /proc enumeration plus name, state and cmdline readers
//! - `cpu`: CPU time parsing and delta tracking
//! - `memory`: resident memory as a share of total RAM
//! - `sampler`: the bounded-concurrency `Sampler`

pub mod cpu;
pub mod memory;
pub mod sampler;
pub mod scanner;
pub mod snapshot;

pub use sampler::{ProcSampler, Sampler, DEFAULT_SAMPLE_CONCURRENCY};
pub use snapshot::{ProcessSnapshot, SampleSet, SnapshotBuilder, UNKNOWN};
