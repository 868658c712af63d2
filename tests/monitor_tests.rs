//! Integration tests for the polling loop and background enrichment.
//!
//! The sampler and classifier are scripted fakes, so every test controls
//! exactly what each cycle sees and how the classifier behaves.

use async_trait::async_trait;
use herakles_process_watch::{
    ChangeEvent, ChangeKind, Classifier, ClassifierError, EnrichmentOutcome, EventSink, Monitor,
    MonitorSettings, ProcessDetails, ProcessSnapshot, SampleSet, Sampler, SamplingError, Verdict,
};
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

fn snap(pid: u32, name: &str, status: &str) -> ProcessSnapshot {
    ProcessSnapshot {
        pid,
        name: name.to_string(),
        status: status.to_string(),
        cpu_percent: 1.0,
        memory_percent: 0.5,
        command: name.to_string(),
    }
}

fn set(procs: &[ProcessSnapshot]) -> SampleSet {
    procs.iter().map(|p| (p.pid, p.clone())).collect()
}

fn enumerate_failure() -> SamplingError {
    SamplingError::Enumerate {
        root: PathBuf::from("/proc"),
        source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
    }
}

/// Returns scripted results in order, then repeats the last good sample.
struct ScriptedSampler {
    script: Mutex<VecDeque<Result<SampleSet, SamplingError>>>,
    last: Mutex<SampleSet>,
    calls: AtomicUsize,
}

impl ScriptedSampler {
    fn new(script: Vec<Result<SampleSet, SamplingError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(SampleSet::default()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Sampler for ScriptedSampler {
    async fn sample(&self) -> Result<SampleSet, SamplingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(s)) => {
                *self.last.lock().unwrap() = s.clone();
                Ok(s)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }
}

enum Behavior {
    Answer { malicious: bool },
    Fail,
    Sleep(Duration),
}

struct FakeClassifier {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl FakeClassifier {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Classifier for FakeClassifier {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn classify(&self, details: &ProcessDetails) -> Result<Verdict, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Answer { malicious } => Ok(Verdict {
                description: format!("{} process", details.name),
                malicious,
            }),
            Behavior::Fail => Err(ClassifierError::Malformed("not json".into())),
            Behavior::Sleep(d) => {
                tokio::time::sleep(d).await;
                Ok(Verdict {
                    description: "late".into(),
                    malicious: false,
                })
            }
        }
    }
}

fn settings() -> MonitorSettings {
    MonitorSettings {
        poll_interval: Duration::from_millis(20),
        classify_timeout: Duration::from_secs(5),
        max_enrichments_in_flight: None,
        shutdown_grace: Duration::from_millis(500),
    }
}

async fn recv(rx: &mut mpsc::Receiver<ChangeEvent>) -> ChangeEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event within 2s")
        .expect("channel open")
}

async fn recv_n(rx: &mut mpsc::Receiver<ChangeEvent>, n: usize) -> Vec<ChangeEvent> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(recv(rx).await);
    }
    out
}

#[tokio::test]
async fn test_started_event_carries_verdict() {
    let sampler = ScriptedSampler::new(vec![Ok(set(&[snap(10, "bash", "sleeping")]))]);
    let classifier = FakeClassifier::new(Behavior::Answer { malicious: false });
    let (sink, mut rx) = EventSink::channel(16);
    let mut monitor = Monitor::new(sampler, classifier, sink, settings());

    let baseline = monitor.run_cycle(SampleSet::default()).await;
    assert_eq!(baseline.len(), 1);

    let event = recv(&mut rx).await;
    assert_eq!(event.kind, ChangeKind::Started);
    assert_eq!(event.pid(), Some(10));
    assert_eq!(event.description, "bash process [Safe]");
    assert_eq!(
        event.enrichment,
        Some(EnrichmentOutcome::Assessed {
            description: "bash process".into(),
            suspicious: false,
        })
    );
}

#[tokio::test]
async fn test_malicious_verdict_is_flagged() {
    let sampler = ScriptedSampler::new(vec![Ok(set(&[snap(66, "xmrig", "running")]))]);
    let classifier = FakeClassifier::new(Behavior::Answer { malicious: true });
    let (sink, mut rx) = EventSink::channel(16);
    let mut monitor = Monitor::new(sampler, classifier, sink, settings());
    let stats = monitor.stats();

    monitor.run_cycle(SampleSet::default()).await;
    let event = recv(&mut rx).await;
    assert_eq!(
        event.description,
        "xmrig process [WARNING: Potentially Malicious]"
    );
    assert_eq!(stats.snapshot().suspicious, 1);
}

#[tokio::test]
async fn test_failed_classification_still_emits_once() {
    let sampler = ScriptedSampler::new(vec![Ok(set(&[
        snap(1, "init", "sleeping"),
        snap(2, "sshd", "sleeping"),
    ]))]);
    let classifier = FakeClassifier::new(Behavior::Fail);
    let (sink, mut rx) = EventSink::channel(16);
    let mut monitor = Monitor::new(sampler, classifier.clone(), sink, settings());
    let stats = monitor.stats();

    monitor.run_cycle(SampleSet::default()).await;
    let events = recv_n(&mut rx, 2).await;
    for event in &events {
        assert_eq!(event.kind, ChangeKind::Started);
        assert_eq!(event.description, "AI analysis unavailable");
        assert_eq!(event.enrichment, Some(EnrichmentOutcome::Unavailable));
    }
    let mut pids: Vec<_> = events.iter().filter_map(|e| e.pid()).collect();
    pids.sort_unstable();
    assert_eq!(pids, vec![1, 2]);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    assert_eq!(stats.snapshot().enrichments_unavailable, 2);
}

#[tokio::test]
async fn test_slow_classifier_does_not_delay_cycle() {
    let sampler = ScriptedSampler::new(vec![Ok(set(&[snap(5, "make", "running")]))]);
    let classifier = FakeClassifier::new(Behavior::Sleep(Duration::from_millis(600)));
    let (sink, mut rx) = EventSink::channel(16);
    let mut monitor = Monitor::new(sampler, classifier, sink, settings());

    let start = Instant::now();
    let baseline = monitor.run_cycle(SampleSet::default()).await;
    assert!(start.elapsed() < Duration::from_millis(300));
    assert_eq!(monitor.enrichments_in_flight(), 1);

    // A second cycle runs while the first assessment is still pending.
    monitor.run_cycle(baseline).await;
    assert!(rx.try_recv().is_err());

    let event = recv(&mut rx).await;
    assert_eq!(event.description, "late [Safe]");
}

#[tokio::test]
async fn test_classifier_timeout_degrades_enrichment() {
    let sampler = ScriptedSampler::new(vec![Ok(set(&[snap(5, "make", "running")]))]);
    let classifier = FakeClassifier::new(Behavior::Sleep(Duration::from_secs(10)));
    let (sink, mut rx) = EventSink::channel(16);
    let settings = MonitorSettings {
        classify_timeout: Duration::from_millis(50),
        ..settings()
    };
    let mut monitor = Monitor::new(sampler, classifier, sink, settings);

    monitor.run_cycle(SampleSet::default()).await;
    let event = recv(&mut rx).await;
    assert_eq!(event.description, "AI analysis unavailable");
}

#[tokio::test]
async fn test_sampling_error_keeps_baseline() {
    let a = snap(1, "init", "sleeping");
    let b = snap(2, "bash", "running");
    let sampler = ScriptedSampler::new(vec![
        Ok(set(&[a.clone(), b.clone()])),
        Err(enumerate_failure()),
        Ok(set(&[a.clone(), b.clone()])),
    ]);
    let classifier = FakeClassifier::new(Behavior::Answer { malicious: false });
    let (sink, mut rx) = EventSink::channel(16);
    let mut monitor = Monitor::new(sampler, classifier, sink, settings());
    let stats = monitor.stats();

    let baseline = monitor.run_cycle(SampleSet::default()).await;
    let started = recv_n(&mut rx, 2).await;
    assert!(started.iter().all(|e| e.kind == ChangeKind::Started));

    let baseline = monitor.run_cycle(baseline).await;
    assert_eq!(baseline.len(), 2);
    let error = recv(&mut rx).await;
    assert_eq!(error.kind, ChangeKind::SamplingError);
    assert!(error.process.is_none());
    assert!(error
        .description
        .starts_with("Error retrieving processes: "));

    // Same processes as before the failure: nothing to report.
    let baseline = monitor.run_cycle(baseline).await;
    assert_eq!(baseline.len(), 2);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());

    let s = stats.snapshot();
    assert_eq!(s.sampling_failures, 1);
    assert_eq!(s.cycles, 2);
    assert_eq!(s.started, 2);
}

#[tokio::test]
async fn test_status_change_and_stop_events() {
    let sampler = ScriptedSampler::new(vec![
        Ok(set(&[snap(1, "init", "sleeping"), snap(2, "bash", "sleeping")])),
        Ok(set(&[snap(1, "init", "sleeping"), snap(2, "bash", "running")])),
        Ok(set(&[snap(1, "init", "sleeping")])),
    ]);
    let classifier = FakeClassifier::new(Behavior::Answer { malicious: false });
    let (sink, mut rx) = EventSink::channel(16);
    let mut monitor = Monitor::new(sampler, classifier, sink, settings());

    let baseline = monitor.run_cycle(SampleSet::default()).await;
    recv_n(&mut rx, 2).await;

    let baseline = monitor.run_cycle(baseline).await;
    let changed = recv(&mut rx).await;
    assert_eq!(changed.kind, ChangeKind::StatusChanged);
    assert_eq!(
        changed.description,
        "Process bash (PID: 2) changed status: sleeping → running"
    );

    monitor.run_cycle(baseline).await;
    let stopped = recv(&mut rx).await;
    assert_eq!(stopped.kind, ChangeKind::Stopped);
    assert_eq!(stopped.description, "Process stopped: bash (PID: 2)");
}

#[tokio::test]
async fn test_each_process_enriched_exactly_once() {
    let sampler = ScriptedSampler::new(vec![
        Ok(set(&[snap(1, "init", "sleeping")])),
        Ok(set(&[snap(1, "init", "sleeping"), snap(3, "vim", "sleeping")])),
        Ok(set(&[snap(1, "init", "running"), snap(3, "vim", "sleeping")])),
    ]);
    let classifier = FakeClassifier::new(Behavior::Answer { malicious: false });
    let (sink, mut rx) = EventSink::channel(64);
    let mut monitor = Monitor::new(sampler, classifier.clone(), sink, settings());

    let mut baseline = SampleSet::default();
    for _ in 0..5 {
        baseline = monitor.run_cycle(baseline).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut started = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if event.kind == ChangeKind::Started {
            started.extend(event.pid());
        }
    }
    started.sort_unstable();
    assert_eq!(started, vec![1, 3]);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_enrichment_cap_limits_concurrent_calls() {
    let procs: Vec<_> = (1..=6).map(|pid| snap(pid, "worker", "running")).collect();
    let sampler = ScriptedSampler::new(vec![Ok(set(&procs))]);
    let classifier = FakeClassifier::new(Behavior::Sleep(Duration::from_millis(100)));
    let (sink, mut rx) = EventSink::channel(16);
    let settings = MonitorSettings {
        max_enrichments_in_flight: Some(2),
        ..settings()
    };
    let mut monitor = Monitor::new(sampler, classifier.clone(), sink, settings);

    monitor.run_cycle(SampleSet::default()).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(classifier.calls.load(Ordering::SeqCst) <= 2);

    let events = recv_n(&mut rx, 6).await;
    assert!(events.iter().all(|e| e.kind == ChangeKind::Started));
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_closed_sink_does_not_stop_the_loop() {
    let sampler = ScriptedSampler::new(vec![
        Ok(set(&[snap(1, "init", "sleeping")])),
        Ok(SampleSet::default()),
    ]);
    let classifier = FakeClassifier::new(Behavior::Answer { malicious: false });
    let (sink, rx) = EventSink::channel(4);
    drop(rx);
    let mut monitor = Monitor::new(sampler, classifier, sink, settings());
    let stats = monitor.stats();

    let baseline = monitor.run_cycle(SampleSet::default()).await;
    let baseline = monitor.run_cycle(baseline).await;
    assert!(baseline.is_empty());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let s = stats.snapshot();
    assert_eq!(s.cycles, 2);
    // One started event from enrichment, one stopped event from the loop.
    assert_eq!(s.events_dropped, 2);
}

#[tokio::test]
async fn test_cancel_stops_the_loop() {
    let sampler = ScriptedSampler::new(vec![Ok(set(&[snap(1, "init", "sleeping")]))]);
    let classifier = FakeClassifier::new(Behavior::Answer { malicious: false });
    let (sink, mut rx) = EventSink::channel(16);
    let monitor = Monitor::new(sampler.clone(), classifier, sink, settings());
    let handle = monitor.start();

    let first = recv(&mut rx).await;
    assert_eq!(first.kind, ChangeKind::Started);

    handle.cancel();
    handle.cancel();
    let report = tokio::time::timeout(Duration::from_secs(2), handle.stopped())
        .await
        .expect("monitor stops promptly");
    assert!(report.stats.cycles >= 1);
    assert_eq!(report.abandoned_enrichments, 0);

    let calls = sampler.calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sampler.calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn test_shutdown_abandons_stuck_enrichment() {
    let sampler = ScriptedSampler::new(vec![Ok(set(&[
        snap(1, "init", "sleeping"),
        snap(2, "bash", "sleeping"),
    ]))]);
    let classifier = FakeClassifier::new(Behavior::Sleep(Duration::from_secs(30)));
    let (sink, _rx) = EventSink::channel(16);
    let settings = MonitorSettings {
        shutdown_grace: Duration::from_millis(50),
        ..settings()
    };
    let monitor = Monitor::new(sampler, classifier, sink, settings);
    let stats = monitor.stats();
    let handle = monitor.start();

    while stats.snapshot().cycles == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    handle.cancel();
    let report = tokio::time::timeout(Duration::from_secs(2), handle.stopped())
        .await
        .expect("grace period bounds shutdown");
    assert_eq!(report.abandoned_enrichments, 2);
    assert_eq!(report.stats.started, 0);
}
