//! Bounded activity log.
//!
//! The simulation keeps a short, append-only trail of human-readable events
//! for its presentation collaborators. Entries are informational only: no
//! algorithm reads them back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How many entries the activity log retains.
pub const LOG_RETENTION: usize = 10;

/// One immutable activity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Human-readable event description.
    pub message: String,

    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Append-only log bounded to the [`LOG_RETENTION`] most recent entries,
/// newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityLog {
    entries: Vec<LogEntry>,
}

impl ActivityLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message, evicting the oldest entry when full.
    pub fn push(&mut self, message: impl Into<String>) {
        self.entries.insert(
            0,
            LogEntry {
                message: message.into(),
                timestamp: Utc::now(),
            },
        );
        self.entries.truncate(LOG_RETENTION);
    }

    /// Entries newest first.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first() {
        let mut log = ActivityLog::new();
        log.push("first");
        log.push("second");
        assert_eq!(log.entries()[0].message, "second");
        assert_eq!(log.entries()[1].message, "first");
    }

    #[test]
    fn test_retention_bound() {
        let mut log = ActivityLog::new();
        for i in 0..25 {
            log.push(format!("event {i}"));
        }
        assert_eq!(log.entries().len(), LOG_RETENTION);
        assert_eq!(log.entries()[0].message, "event 24");
        assert_eq!(log.entries()[LOG_RETENTION - 1].message, "event 15");
    }

    #[test]
    fn test_clear() {
        let mut log = ActivityLog::new();
        log.push("event");
        log.clear();
        assert!(log.entries().is_empty());
    }
}
