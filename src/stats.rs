//! Run statistics for the monitor.
//!
//! Counters are updated from the loop and from enrichment tasks, so they are
//! plain atomics; `snapshot()` gives a consistent-enough copy for logging.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default, Debug)]
pub struct MonitorStats {
    pub cycles: AtomicU64,
    pub sampling_failures: AtomicU64,
    pub last_sample_size: AtomicU64,
    pub started: AtomicU64,
    pub status_changes: AtomicU64,
    pub stopped: AtomicU64,
    pub enrichments_assessed: AtomicU64,
    pub enrichments_unavailable: AtomicU64,
    pub suspicious: AtomicU64,
    pub events_dropped: AtomicU64,
}

/// Plain copy of `MonitorStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub cycles: u64,
    pub sampling_failures: u64,
    pub last_sample_size: u64,
    pub started: u64,
    pub status_changes: u64,
    pub stopped: u64,
    pub enrichments_assessed: u64,
    pub enrichments_unavailable: u64,
    pub suspicious: u64,
    pub events_dropped: u64,
}

impl MonitorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sampling_failure(&self) {
        self.sampling_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cycle(&self, sample_size: usize) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.last_sample_size
            .store(sample_size as u64, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            cycles: get(&self.cycles),
            sampling_failures: get(&self.sampling_failures),
            last_sample_size: get(&self.last_sample_size),
            started: get(&self.started),
            status_changes: get(&self.status_changes),
            stopped: get(&self.stopped),
            enrichments_assessed: get(&self.enrichments_assessed),
            enrichments_unavailable: get(&self.enrichments_unavailable),
            suspicious: get(&self.suspicious),
            events_dropped: get(&self.events_dropped),
        }
    }
}
