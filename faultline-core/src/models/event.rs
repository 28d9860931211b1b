//! Outage event model: the durable record of one inferred incident lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One observed state of an outage's detail payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub observed_at: DateTime<Utc>,
    pub details: Value,
}

/// The engine's durable record of one outage: when it was first seen, when it
/// left the active set, and every distinct detail payload observed while it
/// was tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutageEvent {
    /// Source-assigned stable identifier; primary key across the whole
    /// history, never changes, created at most once.
    pub id: String,
    /// Display title seeded from the first observation.
    pub title: String,
    /// Timestamp of the first snapshot that observed this outage. Immutable
    /// once set.
    pub start: DateTime<Utc>,
    /// Timestamp of the first snapshot where the outage was absent from the
    /// active set. `None` while ongoing.
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    /// Ordered, append-only sequence of distinct detail payloads. No two
    /// consecutive entries are structurally equal.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl OutageEvent {
    /// Create the event at first observation.
    pub fn open(id: impl Into<String>, title: impl Into<String>, start: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start,
            end: None,
            history: Vec::new(),
        }
    }

    pub fn is_ongoing(&self) -> bool {
        self.end.is_none()
    }

    /// Close the event at its first absence from the active set. A closed
    /// event stays closed: later reappearances of the same id never reopen
    /// it (one record per incident).
    pub fn close(&mut self, at: DateTime<Utc>) {
        if self.end.is_none() {
            self.end = Some(at);
        }
    }

    /// Append a detail payload iff it differs structurally from the latest
    /// recorded one. Returns whether an entry was appended.
    ///
    /// Equality is `serde_json::Value` equality: order-sensitive for arrays,
    /// key-based for objects. This bounds history growth to the number of
    /// distinct states observed, not the number of snapshots.
    pub fn record_details(&mut self, observed_at: DateTime<Utc>, details: &Value) -> bool {
        if self.history.last().map(|entry| &entry.details) == Some(details) {
            return false;
        }
        self.history.push(HistoryEntry {
            observed_at,
            details: details.clone(),
        });
        true
    }

    /// The most recently observed detail payload, if any.
    pub fn latest_details(&self) -> Option<&Value> {
        self.history.last().map(|entry| &entry.details)
    }
}

// ============================================================================
// TESTS
// ============================================================================
