//! Bounded, newest-first audit log.
//!
//! Appends are linearized by a mutex. Once the buffer is full the oldest
//! entry is evicted silently; there is no other way to remove an entry.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde::Serialize;

use crate::types::Timestamp;

/// Number of entries retained by [`LogBuffer::new`].
pub const LOG_CAPACITY: usize = 100;

/// Display format used by the presentation layer, e.g. `03/14/2025, 17:05:09`.
const DISPLAY_FORMAT: &str = "%m/%d/%Y, %H:%M:%S";

/// A single timestamped audit line. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    timestamp: Timestamp,
    message: String,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(message: impl Into<String>) -> Self {
        Self::at(Utc::now(), message)
    }

    pub fn at(timestamp: Timestamp, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Timestamp rendered as `MM/DD/YYYY, HH:MM:SS` (24-hour, UTC).
    pub fn display_timestamp(&self) -> String {
        self.timestamp.format(DISPLAY_FORMAT).to_string()
    }
}

#[derive(Debug)]
pub struct LogBuffer {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }

    /// A buffer retaining at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Stamp `message` with the current time and prepend it.
    pub fn append(&self, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry::new(message);
        self.push(entry.clone());
        entry
    }

    /// Prepend an existing entry, evicting the oldest one past capacity.
    pub fn push(&self, entry: LogEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push_front(entry);
        entries.truncate(self.capacity);
    }

    /// Snapshot of the retained entries, newest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<LogEntry> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.front().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}
