//! The user-visible activity log.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub message: String,
    pub logged_at: DateTime<Utc>,
}

/// Newest-first list of messages shown to the user.
///
/// A message is only added when it differs from the current newest entry.
/// Repeats are suppressed against that single entry, not the whole history:
/// `A, B, A` yields three entries. Entries are never evicted.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ActivityLog {
    entries: VecDeque<LogEntry>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend `message` unless it equals the newest entry.
    /// Returns whether the entry was added.
    pub fn push(&mut self, message: &str) -> bool {
        if self.head().is_some_and(|head| head.message == message) {
            return false;
        }
        tracing::debug!(message, "log entry added");
        self.entries.push_front(LogEntry {
            message: message.to_string(),
            logged_at: Utc::now(),
        });
        true
    }

    /// Newest entry.
    pub fn head(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    /// Entries newest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.message.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
