//! Asynchronous enrichment of newly started processes.
//!
//! Every started process gets its own task that asks the classifier and emits
//! exactly one `Started` event, whatever the classifier does. Dispatch never
//! waits on the classifier, so a slow backend cannot hold up the polling loop.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::classifier::{Classifier, ProcessDetails};
use crate::events::{ChangeEvent, EnrichmentOutcome, EventSink};
use crate::process::{ProcessSnapshot, SampleSet};
use crate::stats::MonitorStats;

/// Timeout applied when the classifier does not report one.
pub const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Fans out classifier calls and tracks the tasks doing them.
///
/// Tasks are never aborted: dropping the dispatcher detaches whatever is
/// still running.
pub struct EnrichmentDispatcher {
    classifier: Arc<dyn Classifier>,
    sink: EventSink,
    limit: Option<Arc<Semaphore>>,
    timeout: Duration,
    stats: Arc<MonitorStats>,
    tasks: JoinSet<()>,
}

impl EnrichmentDispatcher {
    /// `max_in_flight = None` leaves classifier calls uncapped.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        sink: EventSink,
        timeout: Duration,
        max_in_flight: Option<usize>,
        stats: Arc<MonitorStats>,
    ) -> Self {
        Self {
            classifier,
            sink,
            limit: max_in_flight.map(|n| Arc::new(Semaphore::new(n.max(1)))),
            timeout,
            stats,
            tasks: JoinSet::new(),
        }
    }

    /// Launches one enrichment per started process and returns immediately.
    pub fn dispatch(&mut self, started: SampleSet) -> usize {
        self.reap();
        let count = started.len();
        for (_, process) in started {
            let job = EnrichmentJob {
                process,
                classifier: Arc::clone(&self.classifier),
                sink: self.sink.clone(),
                limit: self.limit.clone(),
                timeout: self.timeout,
                stats: Arc::clone(&self.stats),
            };
            self.tasks.spawn(job.run());
        }
        if count > 0 {
            debug!(
                dispatched = count,
                in_flight = self.tasks.len(),
                "enrichment dispatched"
            );
        }
        count
    }

    /// Number of enrichment tasks not yet collected.
    pub fn in_flight(&mut self) -> usize {
        self.reap();
        self.tasks.len()
    }

    /// Waits up to `grace` for running enrichments, then abandons the rest.
    /// Returns how many were abandoned.
    pub async fn shutdown(&mut self, grace: Duration) -> usize {
        let tasks = &mut self.tasks;
        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    warn!("enrichment task failed: {}", e);
                }
            }
        })
        .await;

        if drained.is_ok() {
            return 0;
        }
        let abandoned = self.tasks.len();
        self.tasks.detach_all();
        info!(abandoned, "shutdown grace elapsed, abandoning enrichments");
        abandoned
    }

    fn reap(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            if let Err(e) = joined {
                warn!("enrichment task failed: {}", e);
            }
        }
    }
}

impl Drop for EnrichmentDispatcher {
    fn drop(&mut self) {
        self.tasks.detach_all();
    }
}

struct EnrichmentJob {
    process: ProcessSnapshot,
    classifier: Arc<dyn Classifier>,
    sink: EventSink,
    limit: Option<Arc<Semaphore>>,
    timeout: Duration,
    stats: Arc<MonitorStats>,
}

impl EnrichmentJob {
    async fn run(self) {
        let outcome = {
            let _permit = match &self.limit {
                Some(limit) => Arc::clone(limit).acquire_owned().await.ok(),
                None => None,
            };
            self.assess().await
        };

        match &outcome {
            EnrichmentOutcome::Assessed { suspicious, .. } => {
                self.stats
                    .enrichments_assessed
                    .fetch_add(1, Ordering::Relaxed);
                if *suspicious {
                    self.stats.suspicious.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        pid = self.process.pid,
                        name = %self.process.name,
                        "process flagged as potentially malicious"
                    );
                }
            }
            EnrichmentOutcome::Unavailable => {
                self.stats
                    .enrichments_unavailable
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
        self.stats.started.fetch_add(1, Ordering::Relaxed);

        if !self.sink.emit(ChangeEvent::started(self.process, outcome)).await {
            self.stats.record_dropped();
        }
    }

    async fn assess(&self) -> EnrichmentOutcome {
        let details = ProcessDetails::from(&self.process);
        match tokio::time::timeout(self.timeout, self.classifier.classify(&details)).await {
            Ok(Ok(verdict)) => EnrichmentOutcome::Assessed {
                description: verdict.description,
                suspicious: verdict.malicious,
            },
            Ok(Err(e)) => {
                warn!(
                    pid = details.pid,
                    name = %details.name,
                    classifier = self.classifier.name(),
                    "classifier unavailable: {}",
                    e
                );
                EnrichmentOutcome::Unavailable
            }
            Err(_) => {
                warn!(
                    pid = details.pid,
                    name = %details.name,
                    classifier = self.classifier.name(),
                    "classifier did not answer within {:?}",
                    self.timeout
                );
                EnrichmentOutcome::Unavailable
            }
        }
    }
}
