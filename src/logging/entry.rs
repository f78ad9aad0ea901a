/*!
 * Log Entries and Process Logs
 */

use super::level::LogLevel;
use crate::core::clock;
use crate::core::id::{ProcessId, ProcessIdentity};
use crate::core::limits::{LOG_CLOSED_MARKER, LOG_STARTED_MARKER};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: OffsetDateTime,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: clock::now(),
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    /// `MM/DD/YYYY hh:mm:ss; LEVEL; message`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}; {}; {}",
            clock::format_log_timestamp(self.timestamp),
            self.level,
            self.message
        )
    }
}

/// Ordered entries of one process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessLog {
    id: ProcessId,
    name: String,
    entries: Vec<LogEntry>,
    last_entry: Option<OffsetDateTime>,
}

impl ProcessLog {
    pub fn new(id: ProcessId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            entries: Vec::new(),
            last_entry: None,
        }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn last_entry(&self) -> Option<OffsetDateTime> {
        self.last_entry
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whole days since the last entry; 0 for an empty log
    pub fn age_days(&self, now: OffsetDateTime) -> i64 {
        self.last_entry
            .map(|last| (now - last).whole_days().max(0))
            .unwrap_or(0)
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.last_entry = Some(entry.timestamp);
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = LogEntry>) {
        for entry in entries {
            self.push(entry);
        }
    }
}

impl ProcessIdentity for ProcessLog {
    fn process_id(&self) -> &ProcessId {
        &self.id
    }

    fn process_name(&self) -> &str {
        &self.name
    }
}

/// Log of the current run; frozen once closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveProcessLog {
    log: ProcessLog,
    closed: bool,
}

impl ActiveProcessLog {
    pub fn open(id: ProcessId, name: impl Into<String>) -> Self {
        let mut log = ProcessLog::new(id, name);
        log.push(LogEntry::new(LogLevel::Info, LOG_STARTED_MARKER));
        Self { log, closed: false }
    }

    pub fn log(&self) -> &ProcessLog {
        &self.log
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Append unless closed; false when the entry was dropped
    pub fn append(&mut self, entry: LogEntry) -> bool {
        if self.closed {
            return false;
        }
        self.log.push(entry);
        true
    }

    /// Append the closing marker and freeze. Returns the entries to archive,
    /// or `None` if already closed.
    pub fn close(&mut self) -> Option<&[LogEntry]> {
        if self.closed {
            return None;
        }
        self.log.push(LogEntry::new(LogLevel::Info, LOG_CLOSED_MARKER));
        self.closed = true;
        Some(self.log.entries())
    }
}
