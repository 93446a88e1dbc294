// Action log - capped, most-recent-first history of control actions
use super::actuator::ControlSource;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionLogEntry {
    pub action: String,
    pub source: ControlSource,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

impl ActionLogEntry {
    pub fn new(action: impl Into<String>, source: ControlSource, reason: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            source,
            timestamp: Utc::now(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActionLog {
    entries: VecDeque<ActionLogEntry>,
    capacity: usize,
}

impl ActionLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, entry: ActionLogEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    /// Entries, most recent first.
    pub fn entries(&self) -> Vec<ActionLogEntry> {
        self.entries.iter().cloned().collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
