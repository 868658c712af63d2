//! CPU statistics parsing for process metrics.
//!
//! This module provides functions to parse CPU time information from
//! `/proc/<pid>/stat` and manage CPU usage caching for delta calculations.

use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::RwLock as StdRwLock;
use std::time::Instant;

use crate::process::scanner::stat_fields_after_comm;

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> f64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_CLK_TCK
        // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
        unsafe {
            let tck = libc::sysconf(libc::_SC_CLK_TCK);
            if tck > 0 {
                return tck as f64;
            }
        }
    }
    100.0
}

/// System clock ticks per second (for CPU time calculation).
pub static CLK_TCK: Lazy<f64> = Lazy::new(get_clk_tck);

// Indexes into the fields following comm: state is field 3 of stat(5).
const UTIME_IDX: usize = 11;
const STIME_IDX: usize = 12;
const STARTTIME_IDX: usize = 19;

/// CPU times read from one /proc/<pid>/stat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuTimes {
    /// user + system time in seconds
    pub cpu_time_seconds: f64,
    /// process start, seconds since boot
    pub start_time_seconds: f64,
}

/// Parse total CPU time and start time from /proc/<pid>/stat.
pub fn parse_cpu_times(proc_path: &Path) -> io::Result<CpuTimes> {
    let content = fs::read_to_string(proc_path.join("stat"))?;
    let parts = stat_fields_after_comm(&content)
        .filter(|p| p.len() > STARTTIME_IDX)
        .ok_or_else(|| io::Error::other("Invalid stat format"))?;

    let field = |idx: usize| -> io::Result<f64> {
        parts[idx]
            .parse::<u64>()
            .map(|v| v as f64)
            .map_err(|_| io::Error::other("Invalid stat field"))
    };

    Ok(CpuTimes {
        cpu_time_seconds: (field(UTIME_IDX)? + field(STIME_IDX)?) / *CLK_TCK,
        start_time_seconds: field(STARTTIME_IDX)? / *CLK_TCK,
    })
}

/// Reads system uptime in seconds from `<root>/uptime`.
pub fn read_uptime(root: &Path) -> io::Result<f64> {
    let content = fs::read_to_string(root.join("uptime"))?;
    content
        .split_whitespace()
        .next()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| io::Error::other("Invalid uptime format"))
}

/// Cache entry with timestamp for delta-based CPU calculation.
#[derive(Debug, Clone, Copy)]
struct CpuEntry {
    times: CpuTimes,
    last_updated: Instant,
}

/// Per-pid CPU time history shared across sampling cycles.
#[derive(Default)]
pub struct CpuTracker {
    cache: StdRwLock<HashMap<u32, CpuEntry>>,
}

impl CpuTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns CPU percent for a pid.
    ///
    /// A pid with history uses the delta since its last sample. A pid seen for
    /// the first time (or reused by a new process) gets its lifetime average,
    /// which needs `uptime`; without it the first reading is 0.
    pub fn cpu_percent(&self, pid: u32, proc_path: &Path, uptime: Option<f64>) -> io::Result<f64> {
        let now = Instant::now();
        let times = parse_cpu_times(proc_path)?;

        let previous = self
            .cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&pid)
            .copied()
            .filter(|e| e.times.start_time_seconds == times.start_time_seconds);

        let percent = match previous {
            Some(entry) => {
                let dt = now.duration_since(entry.last_updated).as_secs_f64();
                let delta_cpu = times.cpu_time_seconds - entry.times.cpu_time_seconds;
                if dt > 0.0 && delta_cpu > 0.0 {
                    (delta_cpu / dt) * 100.0
                } else {
                    0.0
                }
            }
            None => lifetime_percent(times, uptime),
        };

        self.cache.write().unwrap_or_else(|e| e.into_inner()).insert(
            pid,
            CpuEntry {
                times,
                last_updated: now,
            },
        );

        Ok(percent)
    }

    /// Drops history for pids not in `live`.
    pub fn retain_pids<F: Fn(u32) -> bool>(&self, live: F) {
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|pid, _| live(*pid));
    }

    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lifetime_percent(times: CpuTimes, uptime: Option<f64>) -> f64 {
    match uptime {
        Some(up) => {
            let elapsed = up - times.start_time_seconds;
            if elapsed > 0.0 {
                (times.cpu_time_seconds / elapsed) * 100.0
            } else {
                0.0
            }
        }
        None => 0.0,
    }
}
