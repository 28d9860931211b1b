//! Snapshot model: one immutable, timestamped capture of the outage page.
//!
//! Upstream documents are whatever the capture job scraped; parsing is
//! best-effort field extraction, not schema validation. A document that is
//! not valid JSON (or whose root is not an object) is malformed and fatal to
//! the run. A document that is merely missing fields parses to an empty
//! observation set.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FaultlineError;
use crate::timestamp;

/// Lexicographically sortable snapshot identifier (the capture's file stem,
/// e.g. `2025-11-01T12-30-00Z`). The capture job guarantees lexicographic
/// order equals chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotKey(String);

impl SnapshotKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a snapshot document marks an outage as currently active.
///
/// Both source formats exist in the wild; the choice is configuration, not
/// format sniffing inside the fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivitySignal {
    /// Every outage record carries an explicit `isActive` boolean.
    ExplicitFlag,
    /// Records are split into `activeOutages` / `plannedOutages` sublists;
    /// membership in the active list is itself the signal.
    ActiveMembership,
}

/// One outage as observed in a single snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityObservation {
    /// Source-assigned stable identifier, unique within a snapshot.
    pub id: String,
    /// Display title seeded into the event on first observation.
    pub title: String,
    /// Whether this observation counts toward the active set. Planned
    /// outages are present but not active.
    pub active: bool,
}

/// Raw capture document plus its optional out-of-band detail document.
#[derive(Debug, Clone)]
pub struct SnapshotDocument {
    pub body: Value,
    /// Contents of `<key>.details.json` if the capture wrote one; a mapping
    /// from outage id to detail payload.
    pub sidecar: Option<Value>,
}

/// A parsed snapshot, ready for the fold.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub key: SnapshotKey,
    /// Logical capture time, normalized from the document's `timestamp`
    /// field (falls back to the key itself when the field is absent).
    pub observed_at: DateTime<Utc>,
    pub entities: Vec<EntityObservation>,
    /// Opaque detail payloads keyed by outage id. Compared only by
    /// structural equality, never interpreted.
    pub details: BTreeMap<String, Value>,
    /// Aggregate headcount the upstream page reports; informational only,
    /// never consulted by the fold.
    pub customers_off: Option<u64>,
}

impl Snapshot {
    /// Best-effort parse of a capture document.
    ///
    /// Fatal only when the root is not an object or no usable capture time
    /// can be recovered; every other missing field degrades to empty.
    pub fn parse(
        key: &SnapshotKey,
        document: SnapshotDocument,
        signal: ActivitySignal,
    ) -> Result<Self, FaultlineError> {
        let body = &document.body;
        if !body.is_object() {
            return Err(FaultlineError::MalformedSnapshot {
                key: key.to_string(),
                reason: "document root is not an object".to_string(),
            });
        }

        let observed_at = match body["timestamp"].as_str() {
            Some(stamp) => timestamp::parse(stamp),
            None => timestamp::parse(key.as_str()),
        }
        .map_err(|err| FaultlineError::MalformedSnapshot {
            key: key.to_string(),
            reason: err.to_string(),
        })?;

        let outage_list = &body["rawFrontendInitData"]["outageList"];
        let entities = match signal {
            ActivitySignal::ExplicitFlag => parse_records(&outage_list["outages"], None),
            ActivitySignal::ActiveMembership => {
                let mut entities = parse_records(&outage_list["activeOutages"], Some(true));
                entities.extend(parse_records(&outage_list["plannedOutages"], Some(false)));
                entities
            }
        };

        let mut details = parse_details(&body["rawFrontendInitData"]["outageDetails"]);
        if let Some(sidecar) = &document.sidecar {
            // Out-of-band payloads take precedence over inline ones.
            for (id, payload) in parse_details(sidecar) {
                details.insert(id, payload);
            }
        }

        Ok(Self {
            key: key.clone(),
            observed_at,
            entities,
            details,
            customers_off: body["customersCurrentlyOff"].as_u64(),
        })
    }

    /// Ids of the outages counted as active in this snapshot.
    pub fn active_ids(&self) -> impl Iterator<Item = &str> {
        self.entities
            .iter()
            .filter(|entity| entity.active)
            .map(|entity| entity.id.as_str())
    }
}

/// Extract observation records from one sublist. `active` overrides the
/// per-record flag when membership itself is the signal.
fn parse_records(list: &Value, active: Option<bool>) -> Vec<EntityObservation> {
    let Some(records) = list.as_array() else {
        return Vec::new();
    };

    records
        .iter()
        .filter_map(|record| {
            let id = match &record["id"] {
                Value::String(id) => id.clone(),
                Value::Number(id) => id.to_string(),
                _ => return None, // a record without an id cannot be tracked
            };
            let title = record["title"]
                .as_str()
                .or_else(|| record["name"].as_str())
                .unwrap_or_default()
                .to_string();
            let active = active.unwrap_or_else(|| record["isActive"].as_bool().unwrap_or(false));
            Some(EntityObservation { id, title, active })
        })
        .collect()
}

fn parse_details(value: &Value) -> BTreeMap<String, Value> {
    let Some(map) = value.as_object() else {
        return BTreeMap::new();
    };
    map.iter()
        .map(|(id, payload)| (id.clone(), payload.clone()))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key() -> SnapshotKey {
        SnapshotKey::new("2025-11-01T12-30-00Z")
    }

    fn doc(body: Value) -> SnapshotDocument {
        SnapshotDocument {
            body,
            sidecar: None,
        }
    }

    #[test]
    fn parses_active_membership_format() {
        let body = json!({
            "timestamp": "2025-11-01T12-30-00Z",
            "customersCurrentlyOff": 57,
            "rawFrontendInitData": {
                "outageList": {
                    "activeOutages": [
                        { "id": "INC-1", "title": "Kerikeri feeder" }
                    ],
                    "plannedOutages": [
                        { "id": "PLN-9", "name": "Moerewa maintenance" }
                    ]
                }
            }
        });

        let snapshot = Snapshot::parse(&key(), doc(body), ActivitySignal::ActiveMembership).unwrap();

        assert_eq!(snapshot.entities.len(), 2);
        assert_eq!(snapshot.entities[0].id, "INC-1");
        assert!(snapshot.entities[0].active);
        assert_eq!(snapshot.entities[1].id, "PLN-9");
        assert_eq!(snapshot.entities[1].title, "Moerewa maintenance");
        assert!(!snapshot.entities[1].active);
        assert_eq!(snapshot.customers_off, Some(57));
        assert_eq!(snapshot.active_ids().collect::<Vec<_>>(), vec!["INC-1"]);
    }

    #[test]
    fn parses_explicit_flag_format() {
        let body = json!({
            "timestamp": "2025-11-01T12:30:00Z",
            "rawFrontendInitData": {
                "outageList": {
                    "outages": [
                        { "id": 401, "title": "Awanui line", "isActive": true },
                        { "id": 402, "title": "Scheduled work" },
                        { "title": "no id, dropped" }
                    ]
                }
            }
        });

        let snapshot = Snapshot::parse(&key(), doc(body), ActivitySignal::ExplicitFlag).unwrap();

        assert_eq!(snapshot.entities.len(), 2);
        assert_eq!(snapshot.entities[0].id, "401");
        assert!(snapshot.entities[0].active);
        // Missing isActive is read as not active, not as an error.
        assert!(!snapshot.entities[1].active);
    }

    #[test]
    fn missing_container_parses_to_empty_observation_set() {
        let body = json!({ "timestamp": "2025-11-01T12-30-00Z" });
        let snapshot = Snapshot::parse(&key(), doc(body), ActivitySignal::ActiveMembership).unwrap();
        assert!(snapshot.entities.is_empty());
        assert!(snapshot.details.is_empty());
        assert_eq!(snapshot.customers_off, None);
    }

    #[test]
    fn missing_timestamp_falls_back_to_the_key() {
        let body = json!({ "rawFrontendInitData": {} });
        let snapshot = Snapshot::parse(&key(), doc(body), ActivitySignal::ActiveMembership).unwrap();
        assert_eq!(snapshot.observed_at, timestamp::parse("2025-11-01T12-30-00Z").unwrap());
    }

    #[test]
    fn non_object_root_is_malformed() {
        let err = Snapshot::parse(&key(), doc(json!([1, 2, 3])), ActivitySignal::ExplicitFlag)
            .unwrap_err();
        assert!(matches!(err, FaultlineError::MalformedSnapshot { .. }));
    }

    #[test]
    fn unparseable_timestamp_is_malformed() {
        let body = json!({ "timestamp": "whenever" });
        let err = Snapshot::parse(&key(), doc(body), ActivitySignal::ExplicitFlag).unwrap_err();
        assert!(matches!(err, FaultlineError::MalformedSnapshot { .. }));
    }

    #[test]
    fn sidecar_details_override_inline_ones() {
        let body = json!({
            "timestamp": "2025-11-01T12-30-00Z",
            "rawFrontendInitData": {
                "outageDetails": {
                    "INC-1": { "status": "Investigating" },
                    "INC-2": { "status": "Crew dispatched" }
                }
            }
        });
        let sidecar = json!({ "INC-1": { "status": "Restored" } });

        let snapshot = Snapshot::parse(
            &key(),
            SnapshotDocument {
                body,
                sidecar: Some(sidecar),
            },
            ActivitySignal::ActiveMembership,
        )
        .unwrap();

        assert_eq!(snapshot.details["INC-1"], json!({ "status": "Restored" }));
        assert_eq!(snapshot.details["INC-2"], json!({ "status": "Crew dispatched" }));
    }
}
