//! Per-process observations and the sample set built from them.

use ahash::AHashMap as HashMap;
use serde::{Deserialize, Serialize};

/// Fallback for name and status when the attribute cannot be read.
pub const UNKNOWN: &str = "Unknown";

/// One process's attributes at a sampling instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub name: String,
    pub status: String,
    pub cpu_percent: f64,
    pub memory_percent: f32,
    pub command: String,
}

impl ProcessSnapshot {
    /// Snapshot with every attribute at its documented default.
    pub fn degraded(pid: u32) -> Self {
        SnapshotBuilder::new(pid).build()
    }
}

/// All live processes at one instant, keyed by pid.
pub type SampleSet = HashMap<u32, ProcessSnapshot>;

/// Collects independently fallible attribute reads.
///
/// Every setter takes the raw read result; a failed read leaves the field at
/// its default, so `build()` always yields a snapshot.
#[derive(Debug)]
pub struct SnapshotBuilder {
    pid: u32,
    name: Option<String>,
    status: Option<String>,
    cpu_percent: Option<f64>,
    memory_percent: Option<f32>,
    command: Option<String>,
}

impl SnapshotBuilder {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            name: None,
            status: None,
            cpu_percent: None,
            memory_percent: None,
            command: None,
        }
    }

    pub fn name<E>(mut self, read: Result<String, E>) -> Self {
        self.name = read.ok().filter(|s| !s.is_empty());
        self
    }

    pub fn status<E>(mut self, read: Result<String, E>) -> Self {
        self.status = read.ok().filter(|s| !s.is_empty());
        self
    }

    pub fn cpu_percent<E>(mut self, read: Result<f64, E>) -> Self {
        self.cpu_percent = read.ok().filter(|v| v.is_finite());
        self
    }

    pub fn memory_percent<E>(mut self, read: Result<f32, E>) -> Self {
        self.memory_percent = read.ok().filter(|v| v.is_finite());
        self
    }

    pub fn command<E>(mut self, read: Result<String, E>) -> Self {
        self.command = read.ok();
        self
    }

    pub fn build(self) -> ProcessSnapshot {
        ProcessSnapshot {
            pid: self.pid,
            name: self.name.unwrap_or_else(|| UNKNOWN.to_string()),
            status: self.status.unwrap_or_else(|| UNKNOWN.to_string()),
            cpu_percent: self.cpu_percent.unwrap_or(0.0),
            memory_percent: self.memory_percent.unwrap_or(0.0),
            command: self.command.unwrap_or_default(),
        }
    }
}
