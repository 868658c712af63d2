//! Change detection between two consecutive samples.

use crate::events::ChangeEvent;
use crate::process::SampleSet;

/// Outcome of comparing two samples.
#[derive(Debug, Default)]
pub struct Detection {
    /// Processes present now but not before; each is enriched once.
    pub started: SampleSet,
    /// Status changes and stops, ready to emit.
    pub events: Vec<ChangeEvent>,
}

impl Detection {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.events.is_empty()
    }
}

/// Compares `previous` against `current`.
///
/// Pure: no I/O, neither input is modified. Each pid lands in at most one
/// bucket, and unchanged processes cost one lookup.
pub fn detect(previous: &SampleSet, current: &SampleSet) -> Detection {
    let mut detection = Detection::default();

    for (pid, proc) in current {
        match previous.get(pid) {
            None => {
                detection.started.insert(*pid, proc.clone());
            }
            Some(old) if old.status != proc.status => {
                detection
                    .events
                    .push(ChangeEvent::status_changed(old, proc.clone()));
            }
            Some(_) => {}
        }
    }

    for (pid, proc) in previous {
        if !current.contains_key(pid) {
            detection.events.push(ChangeEvent::stopped(proc.clone()));
        }
    }

    detection
}
