//! # Capture Pipeline Tests
//!
//! Raw records are injected into the mock backend and delivered from the
//! pump thread, through the decoder and the log drain, into the event log.

mod common;

use std::{sync::Arc, time::Duration};

use agent::FileMonitor;
use agent::comms::events::FileEventKind;
use agent::etw::{EventDecoder, ProcessNameResolver, RecordSink, event_log::{EventLog, spawn_drain}};
use agent::summary::FileRisk;
use common::{MockBackend, TableNames, name_payload, offline_decoder, options, wait_for};
use shared::constants::*;

const DROPPER: &str = r"C:\Users\me\AppData\Roaming\drop.exe";
const NOTES: &str = r"C:\Users\me\Documents\notes.txt";

fn named_monitor(mock: &Arc<MockBackend>) -> FileMonitor {
    let names = TableNames(vec![(1234, r"C:\Tools\dropper.exe")]);
    let decoder = EventDecoder::new(ProcessNameResolver::new(Box::new(names)));
    FileMonitor::with_decoder(mock.clone(), decoder, options())
}

fn inject_sample(mock: &MockBackend) {
    mock.inject(EVENT_ID_NAMECREATE, 1234, name_payload(DROPPER));
    mock.inject(EVENT_ID_WRITE, 1234, name_payload(NOTES));
    mock.inject(EVENT_ID_CLOSE, 1234, name_payload(NOTES));
    mock.inject(EVENT_ID_NAMECREATE, 2000, name_payload(r"C:\$Extend\$UsnJrnl"));
    mock.inject(EVENT_ID_NAMECREATE, 4, name_payload(r"C:\Windows\System32\x.dll"));
}

#[test]
fn records_flow_into_the_log_and_summary() {
    let mock = MockBackend::new();
    let mut m = named_monitor(&mock);
    assert!(m.start());

    inject_sample(&mock);
    assert!(wait_for(Duration::from_secs(5), || mock.delivered() == 5));
    m.stop();

    let events = m.snapshot_events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, FileEventKind::NameCreate);
    assert_eq!(events[0].path, DROPPER);
    assert_eq!(events[0].process_name, "dropper.exe");
    assert_eq!(events[1].kind, FileEventKind::Write);
    assert_eq!(events[1].path, NOTES);

    let stats = m.stats();
    assert_eq!((stats.seen, stats.accepted, stats.dropped), (5, 2, 0));

    let summary = m.summarize_changes();
    assert!(summary.created.contains_key(DROPPER));
    assert_eq!(summary.modified[NOTES].write_count, 1);
    assert_eq!(summary.len(), 2);
    assert_eq!(summary.risky_paths(FileRisk::High), vec![DROPPER]);
}

#[test]
fn clear_events_resets_log_and_counters() {
    let mock = MockBackend::new();
    let mut m = FileMonitor::with_decoder(mock.clone(), offline_decoder(), options());
    assert!(m.start());
    inject_sample(&mock);
    assert!(wait_for(Duration::from_secs(5), || mock.delivered() == 5));
    assert!(wait_for(Duration::from_secs(5), || m.snapshot_events().len() == 2));

    m.clear_events();
    assert!(m.snapshot_events().is_empty());
    assert_eq!(m.stats().seen, 0);

    // Capture keeps going after a clear.
    mock.inject(EVENT_ID_DELETE, 5555, name_payload(NOTES));
    assert!(wait_for(Duration::from_secs(5), || mock.delivered() == 6));
    m.stop();
    let events = m.snapshot_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].process_name, "PID:5555");
    assert!(!m.summarize_changes().deleted[NOTES].was_temporary);
}

#[test]
fn nothing_is_captured_once_stopped() {
    let mock = MockBackend::new();
    let mut m = FileMonitor::with_decoder(mock.clone(), offline_decoder(), options());
    assert!(m.start());
    m.stop();
    mock.inject(EVENT_ID_NAMECREATE, 1234, name_payload(DROPPER));
    assert!(m.snapshot_events().is_empty());
    assert_eq!(m.stats().seen, 0);
}

#[test]
fn inactive_sink_ignores_records() {
    let log = Arc::new(EventLog::new());
    let (sender, drain) = spawn_drain(log.clone(), 8).unwrap();
    let sink = RecordSink::new(Arc::new(offline_decoder()), sender);

    sink.on_record(EVENT_ID_NAMECREATE, 1234, &name_payload(DROPPER));
    assert_eq!(log.total_seen(), 0);

    sink.activate();
    sink.on_record(EVENT_ID_NAMECREATE, 1234, &name_payload(DROPPER));
    sink.deactivate();
    sink.on_record(EVENT_ID_NAMECREATE, 1234, &name_payload(NOTES));

    drop(sink);
    assert!(drain.join_timeout(Duration::from_secs(5)));
    assert_eq!(log.total_seen(), 1);
    assert_eq!(log.snapshot().len(), 1);
    assert_eq!(log.snapshot()[0].path, DROPPER);
}

#[test]
fn resolver_is_consulted_once_per_pid() {
    let mock = MockBackend::new();
    let mut m = named_monitor(&mock);
    assert!(m.start());
    for _ in 0..3 {
        mock.inject(EVENT_ID_WRITE, 1234, name_payload(NOTES));
    }
    assert!(wait_for(Duration::from_secs(5), || mock.delivered() == 3));
    assert_eq!(m.controller().decoder().resolver().cached(), 1);
    m.stop();
    assert!(m.snapshot_events().iter().all(|e| e.process_name == "dropper.exe"));
}
