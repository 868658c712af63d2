//! The polling loop: sample, diff, emit, dispatch enrichment, sleep.
//!
//! The previous cycle's sample is the loop's only state. It is threaded
//! through `run_cycle` by value and replaced only by a successful sample, so
//! a failed cycle leaves the diff baseline untouched.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::classifier::Classifier;
use crate::config::Config;
use crate::detector::{detect, Detection};
use crate::enrichment::{EnrichmentDispatcher, DEFAULT_CLASSIFY_TIMEOUT};
use crate::events::{ChangeEvent, ChangeKind, EventSink};
use crate::process::{SampleSet, Sampler};
use crate::stats::{MonitorStats, StatsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Sampling,
    Diffing,
    Dispatching,
    Sleeping,
    Cancelled,
}

/// Timing and fan-out knobs for the loop.
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub classify_timeout: Duration,
    /// `None` = uncapped
    pub max_enrichments_in_flight: Option<usize>,
    pub shutdown_grace: Duration,
}

impl MonitorSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            poll_interval: cfg.poll_interval(),
            classify_timeout: cfg.classifier.timeout().unwrap_or(DEFAULT_CLASSIFY_TIMEOUT),
            max_enrichments_in_flight: cfg.enrichment_limit(),
            shutdown_grace: cfg.shutdown_grace(),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Final figures returned when the loop stops.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonitorReport {
    pub stats: StatsSnapshot,
    pub abandoned_enrichments: usize,
}

pub struct Monitor {
    sampler: Arc<dyn Sampler>,
    dispatcher: EnrichmentDispatcher,
    sink: EventSink,
    settings: MonitorSettings,
    stats: Arc<MonitorStats>,
    state: MonitorState,
}

impl Monitor {
    pub fn new(
        sampler: Arc<dyn Sampler>,
        classifier: Arc<dyn Classifier>,
        sink: EventSink,
        settings: MonitorSettings,
    ) -> Self {
        let stats = Arc::new(MonitorStats::new());
        let dispatcher = EnrichmentDispatcher::new(
            classifier,
            sink.clone(),
            settings.classify_timeout,
            settings.max_enrichments_in_flight,
            Arc::clone(&stats),
        );
        Self {
            sampler,
            dispatcher,
            sink,
            settings,
            stats,
            state: MonitorState::Idle,
        }
    }

    pub fn stats(&self) -> Arc<MonitorStats> {
        Arc::clone(&self.stats)
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Number of enrichment tasks still running.
    pub fn enrichments_in_flight(&mut self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Spawns the loop on the current runtime.
    pub fn start(self) -> MonitorHandle {
        let (cancel, cancelled) = watch::channel(false);
        let task = tokio::spawn(self.run(cancelled));
        MonitorHandle { cancel, task }
    }

    /// Runs until `cancel` flips to true or its sender is dropped.
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) -> MonitorReport {
        info!(
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            "process monitor started"
        );
        let mut previous = SampleSet::default();

        loop {
            if *cancel.borrow() {
                break;
            }
            previous = self.run_cycle(previous).await;

            self.transition(MonitorState::Sleeping);
            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {
                    self.transition(MonitorState::Idle);
                }
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
            }
        }

        self.transition(MonitorState::Cancelled);
        let abandoned_enrichments = self.dispatcher.shutdown(self.settings.shutdown_grace).await;
        let stats = self.stats.snapshot();
        info!(
            cycles = stats.cycles,
            sampling_failures = stats.sampling_failures,
            started = stats.started,
            stopped = stats.stopped,
            status_changes = stats.status_changes,
            suspicious = stats.suspicious,
            abandoned_enrichments,
            "process monitor stopped"
        );
        MonitorReport {
            stats,
            abandoned_enrichments,
        }
    }

    /// One pass through sampling, diffing and dispatch.
    ///
    /// Returns the baseline for the next cycle: the new sample, or `previous`
    /// unchanged if sampling failed.
    pub async fn run_cycle(&mut self, previous: SampleSet) -> SampleSet {
        let start = Instant::now();

        self.transition(MonitorState::Sampling);
        let current = match self.sampler.sample().await {
            Ok(set) => set,
            Err(e) => {
                warn!("sampling failed, keeping previous baseline: {}", e);
                self.stats.record_sampling_failure();
                self.emit(ChangeEvent::sampling_error(&e)).await;
                return previous;
            }
        };

        self.transition(MonitorState::Diffing);
        let Detection { started, events } = detect(&previous, &current);
        drop(previous);

        self.transition(MonitorState::Dispatching);
        let changes = events.len();
        for event in events {
            match event.kind {
                ChangeKind::StatusChanged => {
                    self.stats.status_changes.fetch_add(1, Ordering::Relaxed);
                }
                ChangeKind::Stopped => {
                    self.stats.stopped.fetch_add(1, Ordering::Relaxed);
                }
                _ => {}
            }
            self.emit(event).await;
        }
        let dispatched = self.dispatcher.dispatch(started);

        self.stats.record_cycle(current.len());
        debug!(
            processes = current.len(),
            changes,
            dispatched,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "cycle complete"
        );
        current
    }

    async fn emit(&self, event: ChangeEvent) {
        if !self.sink.emit(event).await {
            self.stats.record_dropped();
        }
    }

    fn transition(&mut self, next: MonitorState) {
        trace!(from = ?self.state, to = ?next, "monitor state");
        self.state = next;
    }
}

/// Controls a spawned monitor.
pub struct MonitorHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<MonitorReport>,
}

impl MonitorHandle {
    /// Stops the loop before its next cycle. Idempotent.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the loop to stop and enrichment to drain.
    pub async fn stopped(self) -> MonitorReport {
        match self.task.await {
            Ok(report) => report,
            Err(e) => {
                error!("monitor task failed: {}", e);
                MonitorReport::default()
            }
        }
    }
}
