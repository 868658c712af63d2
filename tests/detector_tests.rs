//! Integration tests for change detection between samples.

use herakles_process_watch::{detect, ChangeKind, ProcessSnapshot, SampleSet};

fn snap(pid: u32, name: &str, status: &str) -> ProcessSnapshot {
    ProcessSnapshot {
        pid,
        name: name.to_string(),
        status: status.to_string(),
        cpu_percent: 0.5,
        memory_percent: 0.1,
        command: format!("/usr/bin/{name}"),
    }
}

fn set(procs: &[ProcessSnapshot]) -> SampleSet {
    procs.iter().map(|p| (p.pid, p.clone())).collect()
}

#[test]
fn test_first_cycle_reports_everything_started() {
    let current = set(&[snap(1, "init", "sleeping"), snap(2, "bash", "running")]);
    let d = detect(&SampleSet::default(), &current);

    assert_eq!(d.started.len(), 2);
    assert!(d.events.is_empty());
}

#[test]
fn test_started_stopped_and_status_changed() {
    let previous = set(&[
        snap(1, "init", "sleeping"),
        snap(2, "bash", "sleeping"),
        snap(3, "cron", "sleeping"),
    ]);
    let current = set(&[
        snap(1, "init", "sleeping"),
        snap(2, "bash", "running"),
        snap(4, "curl", "running"),
    ]);

    let d = detect(&previous, &current);

    assert_eq!(d.started.len(), 1);
    assert_eq!(d.started[&4].name, "curl");

    let changed: Vec<_> = d
        .events
        .iter()
        .filter(|e| e.kind == ChangeKind::StatusChanged)
        .collect();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].pid(), Some(2));
    assert_eq!(
        changed[0].description,
        "Process bash (PID: 2) changed status: sleeping → running"
    );

    let stopped: Vec<_> = d
        .events
        .iter()
        .filter(|e| e.kind == ChangeKind::Stopped)
        .collect();
    assert_eq!(stopped.len(), 1);
    assert_eq!(stopped[0].description, "Process stopped: cron (PID: 3)");
    // Stopped events carry the last-seen snapshot.
    assert_eq!(stopped[0].process.as_ref().unwrap().command, "/usr/bin/cron");
}

#[test]
fn test_identical_samples_produce_nothing() {
    let s = set(&[snap(1, "init", "sleeping"), snap(2, "bash", "running")]);
    let d = detect(&s, &s);
    assert!(d.is_empty());
}

#[test]
fn test_only_status_counts_as_change() {
    let previous = set(&[snap(5, "java", "sleeping")]);
    let mut busier = snap(5, "java", "sleeping");
    busier.cpu_percent = 95.0;
    busier.memory_percent = 40.0;
    busier.command = "java -Xmx8g -jar app.jar".into();
    let current = set(&[busier]);

    assert!(detect(&previous, &current).is_empty());
}

#[test]
fn test_pid_in_at_most_one_bucket() {
    let previous = set(&[snap(1, "a", "sleeping"), snap(2, "b", "sleeping")]);
    let current = set(&[snap(2, "b", "zombie"), snap(3, "c", "running")]);

    let d = detect(&previous, &current);
    let mut pids: Vec<u32> = d.started.keys().copied().collect();
    pids.extend(d.events.iter().filter_map(|e| e.pid()));
    pids.sort_unstable();
    assert_eq!(pids, vec![1, 2, 3]);
}

#[test]
fn test_inputs_are_not_modified() {
    let previous = set(&[snap(1, "a", "sleeping")]);
    let current = set(&[snap(2, "b", "running")]);
    let (p_before, c_before) = (previous.clone(), current.clone());

    let _ = detect(&previous, &current);
    assert_eq!(*previous, *p_before);
    assert_eq!(*current, *c_before);
}

#[test]
fn test_everything_stopped() {
    let previous = set(&[snap(1, "a", "sleeping"), snap(2, "b", "running")]);
    let d = detect(&previous, &SampleSet::default());
    assert!(d.started.is_empty());
    assert_eq!(d.events.len(), 2);
    assert!(d.events.iter().all(|e| e.kind == ChangeKind::Stopped));
}

#[test]
fn test_disjoint_samples_full_replacement() {
    let previous = set(&[
        snap(10, "nginx", "sleeping"),
        snap(11, "redis", "sleeping"),
        snap(12, "cron", "sleeping"),
    ]);
    let current = set(&[snap(20, "python3", "running"), snap(21, "node", "sleeping")]);
    let d = detect(&previous, &current);

    let mut started: Vec<u32> = d.started.keys().copied().collect();
    started.sort_unstable();
    assert_eq!(started, vec![20, 21]);

    assert!(d.events.iter().all(|e| e.kind == ChangeKind::Stopped));
    let mut stopped: Vec<u32> = d.events.iter().filter_map(|e| e.pid()).collect();
    stopped.sort_unstable();
    assert_eq!(stopped, vec![10, 11, 12]);
}
