//! The persisted output artifact: checkpoint plus the full event list.
//!
//! One JSON document serves as both the durable processing checkpoint and
//! the downstream-consumed timeline. It must round-trip losslessly back into
//! resume state, and its rendering must be deterministic so that a no-op run
//! rewrites it byte for byte.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::event::{HistoryEntry, OutageEvent};
use crate::models::snapshot::SnapshotKey;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    /// Key of the last snapshot folded into this artifact. Absent until the
    /// first snapshot is processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_processed_key: Option<SnapshotKey>,
}

/// One event as persisted. Identical to [`OutageEvent`] plus the derived
/// `summary`, which is recomputed on every write so that formatting changes
/// never require a reprocess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl EventRecord {
    fn from_event(event: &OutageEvent) -> Self {
        Self {
            id: event.id.clone(),
            title: event.title.clone(),
            summary: derive_summary(event),
            start: event.start,
            end: event.end,
            history: event.history.clone(),
        }
    }

    fn into_event(self) -> OutageEvent {
        OutageEvent {
            id: self.id,
            title: self.title,
            start: self.start,
            end: self.end,
            history: self.history,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(default)]
    pub metadata: ArtifactMetadata,
    #[serde(default)]
    pub events: Vec<EventRecord>,
}

impl Artifact {
    /// Render the event map and checkpoint into the persisted form. Events
    /// are ordered by `(start, id)` so output is deterministic.
    pub fn render(
        events: &BTreeMap<String, OutageEvent>,
        checkpoint: Option<&SnapshotKey>,
    ) -> Self {
        let mut records: Vec<EventRecord> = events.values().map(EventRecord::from_event).collect();
        records.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

        Self {
            metadata: ArtifactMetadata {
                last_processed_key: checkpoint.cloned(),
            },
            events: records,
        }
    }

    /// Decompose into resume state: the checkpoint and the events keyed by
    /// id for O(1) lookup during the fold. Derived fields are dropped.
    pub fn into_state(self) -> (Option<SnapshotKey>, BTreeMap<String, OutageEvent>) {
        let events = self
            .events
            .into_iter()
            .map(|record| (record.id.clone(), record.into_event()))
            .collect();
        (self.metadata.last_processed_key, events)
    }

    pub fn to_pretty_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

/// Display summary for one event, recomputed at serialize time from the
/// latest known detail payload (best-effort field extraction), falling back
/// to the seed title, then the id.
pub fn derive_summary(event: &OutageEvent) -> String {
    let latest = event.latest_details();

    let title = latest
        .and_then(|details| {
            details["title"]
                .as_str()
                .or_else(|| details["name"].as_str())
        })
        .unwrap_or(&event.title);
    let title = if title.is_empty() { event.id.as_str() } else { title };

    let affected = latest.and_then(|details| {
        details["customersAffected"]
            .as_u64()
            .or_else(|| details["customersOff"].as_u64())
    });
    let status = latest.and_then(|details| {
        details["statusName"]
            .as_str()
            .or_else(|| details["status"].as_str())
    });

    match (affected, status) {
        (Some(n), Some(status)) => format!("{title}: {n} customers affected ({status})"),
        (Some(n), None) => format!("{title}: {n} customers affected"),
        (None, Some(status)) => format!("{title} ({status})"),
        (None, None) => title.to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
