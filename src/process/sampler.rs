//! Bounded-concurrency sampling of the process table.
//!
//! One `sample()` call enumerates the proc root, reads every process's
//! attributes on the blocking pool with at most `concurrency` reads in flight,
//! and joins all of them before returning a complete `SampleSet`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::error::SamplingError;
use crate::process::cpu::{read_uptime, CpuTracker};
use crate::process::memory::{memory_percent, read_mem_total_bytes};
use crate::process::scanner::{
    collect_proc_entries, read_cmdline, read_process_name, read_status, ProcEntry,
};
use crate::process::snapshot::{ProcessSnapshot, SampleSet, SnapshotBuilder};

/// Default number of processes read in parallel.
pub const DEFAULT_SAMPLE_CONCURRENCY: usize = 10;

/// Source of process table samples.
#[async_trait]
pub trait Sampler: Send + Sync {
    /// Returns every live process, or an error if enumeration itself failed.
    async fn sample(&self) -> Result<SampleSet, SamplingError>;
}

/// Samples a Linux procfs mount.
pub struct ProcSampler {
    root: PathBuf,
    limit: Arc<Semaphore>,
    concurrency: usize,
    cpu: Arc<CpuTracker>,
}

/// Host-wide values read once per sample.
#[derive(Debug, Clone, Copy)]
struct HostInfo {
    uptime: Option<f64>,
    mem_total_bytes: Option<u64>,
}

impl ProcSampler {
    pub fn new(root: impl Into<PathBuf>, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            root: root.into(),
            limit: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            cpu: Arc::new(CpuTracker::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn enumerate(root: PathBuf) -> Result<(Vec<ProcEntry>, HostInfo), SamplingError> {
        let entries = collect_proc_entries(&root).map_err(|source| SamplingError::Enumerate {
            root: root.clone(),
            source,
        })?;

        let uptime = read_uptime(&root)
            .map_err(|e| debug!("uptime unavailable under {}: {}", root.display(), e))
            .ok();
        let mem_total_bytes = read_mem_total_bytes(&root)
            .map_err(|e| debug!("meminfo unavailable under {}: {}", root.display(), e))
            .ok();

        Ok((
            entries,
            HostInfo {
                uptime,
                mem_total_bytes,
            },
        ))
    }
}

/// Reads one process; every field degrades on its own.
fn read_snapshot(entry: &ProcEntry, cpu: &CpuTracker, host: HostInfo) -> ProcessSnapshot {
    let path = entry.proc_path.as_path();
    SnapshotBuilder::new(entry.pid)
        .name(read_process_name(path))
        .status(read_status(path))
        .cpu_percent(cpu.cpu_percent(entry.pid, path, host.uptime))
        .memory_percent(memory_percent(path, host.mem_total_bytes))
        .command(read_cmdline(path))
        .build()
}

/// Runs `read` for every entry on the blocking pool, holding a permit from
/// `limit` for each call, and collects the results once all reads finish.
async fn fan_out<F>(entries: Vec<ProcEntry>, limit: &Arc<Semaphore>, read: F) -> SampleSet
where
    F: Fn(&ProcEntry) -> ProcessSnapshot + Send + Sync + 'static,
{
    let results = Arc::new(Mutex::new(SampleSet::with_capacity(entries.len())));
    let read = Arc::new(read);
    let mut tasks = JoinSet::new();

    for entry in entries {
        // The semaphore is never closed, so acquire only fails on shutdown.
        let Ok(permit) = Arc::clone(limit).acquire_owned().await else {
            break;
        };
        let results = Arc::clone(&results);
        let read = Arc::clone(&read);
        tasks.spawn_blocking(move || {
            let _permit = permit;
            let snapshot = read(&entry);
            results
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(entry.pid, snapshot);
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!("process read task failed: {}", e);
        }
    }

    match Arc::try_unwrap(results) {
        Ok(mutex) => mutex.into_inner().unwrap_or_else(|e| e.into_inner()),
        Err(shared) => shared.lock().unwrap_or_else(|e| e.into_inner()).clone(),
    }
}

#[async_trait]
impl Sampler for ProcSampler {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn sample(&self) -> Result<SampleSet, SamplingError> {
        let start = Instant::now();
        let root = self.root.clone();
        let (entries, host) = tokio::task::spawn_blocking(move || Self::enumerate(root))
            .await
            .map_err(|e| SamplingError::Enumerate {
                root: self.root.clone(),
                source: std::io::Error::other(e.to_string()),
            })??;

        let cpu = Arc::clone(&self.cpu);
        let set = fan_out(entries, &self.limit, move |entry| read_snapshot(entry, &cpu, host)).await;

        self.cpu.retain_pids(|pid| set.contains_key(&pid));

        debug!(
            processes = set.len(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "sample complete"
        );
        Ok(set)
    }
}
