//! Bounded, timestamped operator event log.
//!
//! Entries are immutable once appended and leave only through FIFO eviction.
//! Each append is mirrored to `tracing` and pushed to every subscriber.

use crate::config::LOG_CAPACITY_LIMIT;
use chrono::{DateTime, Local};
use heapless::Deque;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Success,
    Warning,
    Alarm,
}

/// Keyword table for messages appended without an explicit level.
/// Evaluated top to bottom against the upper-cased message; first match wins.
pub const CLASSIFICATION_TABLE: &[(LogLevel, &[&str])] = &[
    (
        LogLevel::Alarm,
        &["ERR", "FAIL", "CRITICAL", "ALARM", "STOPPED", "HALTED", "EMERGENCY", "DANGER"],
    ),
    (LogLevel::Warning, &["WARN", "HIGH", "ATTENTION"]),
    (
        LogLevel::Success,
        &["SYS: PORT OPEN", "RESUMED", "NORMAL", "READY", "SUCCESS"],
    ),
    (LogLevel::Info, &["OP:", "SYS:", "INIT"]),
];

pub fn classify(message: &str) -> LogLevel {
    let upper = message.to_uppercase();
    CLASSIFICATION_TABLE
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| upper.contains(k)))
        .map_or(LogLevel::Debug, |(level, _)| *level)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Insertion order, monotonically increasing across evictions.
    pub sequence: u64,
    pub timestamp: DateTime<Local>,
    pub message: String,
    pub level: LogLevel,
}

impl LogEntry {
    /// `[HH:MM:SS] message`, as shown to operators.
    pub fn display_line(&self) -> String {
        format!("[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

pub type LogSubscriber = Box<dyn FnMut(&LogEntry) + Send>;

pub struct EventLog {
    entries: Deque<LogEntry, LOG_CAPACITY_LIMIT>,
    capacity: usize,
    next_sequence: u64,
    subscribers: Vec<LogSubscriber>,
}

impl EventLog {
    /// `capacity` is clamped to `1..=LOG_CAPACITY_LIMIT`.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Deque::new(),
            capacity: capacity.clamp(1, LOG_CAPACITY_LIMIT),
            next_sequence: 0,
            subscribers: Vec::new(),
        }
    }

    /// Append with the level derived from the keyword table.
    pub fn record(&mut self, message: impl Into<String>) -> LogEntry {
        let message = message.into();
        let level = classify(&message);
        self.append(message, level)
    }

    /// Returns a copy of the stored entry.
    pub fn append(&mut self, message: impl Into<String>, level: LogLevel) -> LogEntry {
        let entry = LogEntry {
            sequence: self.next_sequence,
            timestamp: Local::now(),
            message: message.into(),
            level,
        };
        self.next_sequence += 1;

        match entry.level {
            LogLevel::Alarm => error!(target: "event_log", "{}", entry.message),
            LogLevel::Warning => warn!(target: "event_log", "{}", entry.message),
            LogLevel::Success | LogLevel::Info => info!(target: "event_log", "{}", entry.message),
            LogLevel::Debug => debug!(target: "event_log", "{}", entry.message),
        }

        for subscriber in &mut self.subscribers {
            subscriber(&entry);
        }

        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        let stored = entry.clone();
        // Cannot fail: capacity never exceeds the deque's fixed size
        let _ = self.entries.push_back(entry);

        debug_assert!(
            self.entries.len() <= self.capacity,
            "Event log length {} exceeds capacity {}",
            self.entries.len(),
            self.capacity
        );

        stored
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&LogEntry) + Send + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Up to `limit` most recent entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total_appended(&self) -> u64 {
        self.next_sequence
    }
}

impl core::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("next_sequence", &self.next_sequence)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
