use scadamon::event_log::*;
use std::sync::{Arc, Mutex};

#[test]
fn test_keyword_priority() {
    let cases = [
        ("ERR: Port Fail", LogLevel::Alarm),
        ("ALARM: E-STOP HALTED", LogLevel::Alarm),
        ("STATUS: EMERGENCY STOP", LogLevel::Alarm),
        ("STATUS: DANGER", LogLevel::Alarm),
        ("STATUS: FAN STOPPED", LogLevel::Alarm),
        ("STATUS: HIGH TEMPERATURE", LogLevel::Warning),
        ("attention: filter due", LogLevel::Warning),
        ("SYS: Port Open (127.0.0.1:7000 @ 9600 baud)", LogLevel::Success),
        ("OP: E-STOP RESUMED", LogLevel::Success),
        ("STATUS: NORMAL", LogLevel::Success),
        ("SYS: Sim Mode Active", LogLevel::Info),
        ("OP: shift handover", LogLevel::Info),
        ("Init complete", LogLevel::Info),
        ("heartbeat", LogLevel::Debug),
    ];
    for (message, expected) in cases {
        assert_eq!(classify(message), expected, "message: {}", message);
    }
}

#[test]
fn test_alarm_outranks_success_keywords() {
    // Contains both "FAIL" and "SUCCESS"; the alarm row is checked first
    assert_eq!(classify("SUCCESS path FAILED"), LogLevel::Alarm);
    assert_eq!(classify("sys: high load"), LogLevel::Warning);
}

#[test]
fn test_fifo_eviction() {
    let mut log = EventLog::new(3);
    for i in 0..5 {
        log.record(format!("OP: event {}", i));
    }

    assert_eq!(log.len(), 3);
    assert_eq!(log.total_appended(), 5);
    let messages: Vec<_> = log.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["OP: event 2", "OP: event 3", "OP: event 4"]);
    let sequences: Vec<_> = log.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![2, 3, 4]);
}

#[test]
fn test_explicit_level_kept() {
    let mut log = EventLog::new(10);
    let entry = log.append("SYS: Switching to Sim (Fail)", LogLevel::Warning);
    assert_eq!(entry.level, LogLevel::Warning);
    assert_eq!(entry.sequence, 0);
}

#[test]
fn test_capacity_clamped() {
    assert_eq!(EventLog::new(0).capacity(), 1);
    assert_eq!(EventLog::new(10_000).capacity(), scadamon::config::LOG_CAPACITY_LIMIT);
    assert!(EventLog::new(5).is_empty());
}

#[test]
fn test_recent_returns_tail_oldest_first() {
    let mut log = EventLog::new(50);
    for i in 0..10 {
        log.record(format!("OP: {}", i));
    }
    let recent = log.recent(3);
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].message, "OP: 7");
    assert_eq!(recent[2].message, "OP: 9");
    assert_eq!(log.recent(100).len(), 10);
    assert!(log.recent(0).is_empty());
}

#[test]
fn test_timestamps_monotonic_and_display_format() {
    let mut log = EventLog::new(10);
    log.record("SYS: first");
    log.record("SYS: second");

    let entries: Vec<_> = log.iter().collect();
    assert!(entries[0].timestamp <= entries[1].timestamp);

    let line = entries[0].display_line();
    // "[HH:MM:SS] SYS: first"
    assert_eq!(line.len(), "[00:00:00] SYS: first".len());
    assert!(line.starts_with('['));
    assert_eq!(&line[9..], "] SYS: first");
}

#[test]
fn test_subscribers_notified_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut log = EventLog::new(2);

    let sink = Arc::clone(&seen);
    log.subscribe(move |entry| sink.lock().unwrap().push((entry.sequence, entry.level)));

    log.record("OP: E-STOP RESUMED");
    log.record("ERR: Connection Lost");
    log.record("debug chatter");

    // Subscribers see every append, including ones later evicted
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(0, LogLevel::Success), (1, LogLevel::Alarm), (2, LogLevel::Debug)]
    );
    assert_eq!(log.len(), 2);
}

#[test]
fn test_entry_serializes_for_clients() {
    let mut log = EventLog::new(4);
    let entry = log.record("ALARM: E-STOP HALTED");
    let json = serde_json::to_string(&entry).unwrap();
    assert!(json.contains(r#""level":"Alarm""#));
    let back: LogEntry = serde_json::from_str(&json).unwrap();
    assert_eq!(back.message, entry.message);
    assert_eq!(back.sequence, entry.sequence);
}

#[test]
fn test_record_returns_the_stored_entry() {
    let mut log = EventLog::new(1);
    log.record("OP: first");
    let entry = log.record("ERR: Connection Lost");

    // The first entry was evicted; the returned copy matches what is kept
    assert_eq!(entry.sequence, 1);
    assert_eq!(entry.level, LogLevel::Alarm);
    let kept: Vec<_> = log.iter().cloned().collect();
    assert_eq!(kept, vec![entry]);
}
