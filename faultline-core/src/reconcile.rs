//! The reconciliation engine: an ordered, checkpointed fold of snapshots
//! into the outage-event map.
//!
//! Lifecycle is inferred purely from presence and absence across consecutive
//! snapshots: first appearance opens an event, first absence from the active
//! set closes it. Snapshots are folded strictly in key order, one at a time;
//! an id that appears and disappears inside a single unprocessed batch still
//! gets both its start and its end, because no pair of snapshots is ever
//! diffed across a gap.
//!
//! Failure semantics are asymmetric on purpose:
//! - A checkpoint that no longer exists in the store downgrades to a full
//!   reprocess (availability over strictness; reprocessing is idempotent).
//! - A snapshot that fails to parse aborts the whole run. Skipping one would
//!   fabricate a spurious start/end pair for every outage it mentions.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::error::FaultlineError;
use crate::models::event::OutageEvent;
use crate::models::snapshot::{ActivitySignal, Snapshot, SnapshotKey};
use crate::store::snapshots::SnapshotStore;

/// Counters from one reconcile run, logged at completion.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub snapshots_processed: usize,
    pub events_opened: usize,
    pub events_closed: usize,
    pub history_appends: usize,
    pub elapsed_ms: u64,
}

/// Result of one reconcile run.
#[derive(Debug)]
pub struct ReconcileOutcome {
    /// The full event map after the fold, prior events included.
    pub events: BTreeMap<String, OutageEvent>,
    /// Key of the last snapshot folded; unchanged from the input checkpoint
    /// when the store held nothing new.
    pub checkpoint: Option<SnapshotKey>,
    pub report: ReconcileReport,
}

/// Fold every snapshot strictly after `checkpoint` into `prior_events`.
///
/// Reads snapshots in ascending key order and stops at the first malformed
/// one without returning partial state. Safe to re-invoke at any time; a run
/// over zero new snapshots returns the input unchanged.
pub fn reconcile(
    checkpoint: Option<&SnapshotKey>,
    prior_events: BTreeMap<String, OutageEvent>,
    store: &dyn SnapshotStore,
    signal: ActivitySignal,
) -> Result<ReconcileOutcome, FaultlineError> {
    let started = Instant::now();
    let all_keys = store.keys()?;
    let pending = unprocessed_range(&all_keys, checkpoint);

    let mut events = prior_events;
    // Every event we already track is considered active going into the first
    // unprocessed snapshot. Events that already ended are harmless here:
    // closing only ever touches an unset end.
    let mut previously_active: BTreeSet<String> = events.keys().cloned().collect();
    let mut report = ReconcileReport::default();
    let mut last_key = checkpoint.cloned();

    for key in pending {
        let document = store.load(key)?;
        let snapshot = Snapshot::parse(key, document, signal)?;
        tracing::debug!(
            "Folding {}: {} entities, {} active, customers off: {:?}",
            key,
            snapshot.entities.len(),
            snapshot.active_ids().count(),
            snapshot.customers_off
        );
        fold_snapshot(&mut events, &mut previously_active, &snapshot, &mut report);
        last_key = Some(key.clone());
        report.snapshots_processed += 1;
    }

    report.elapsed_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        "Reconcile complete: {} snapshots folded, {} events opened, {} closed, {} history entries in {}ms",
        report.snapshots_processed,
        report.events_opened,
        report.events_closed,
        report.history_appends,
        report.elapsed_ms
    );

    Ok(ReconcileOutcome {
        events,
        checkpoint: last_key,
        report,
    })
}

/// Slice of keys strictly after the checkpoint.
///
/// A set checkpoint that is no longer present in the store (the referenced
/// snapshot may have been deleted) downgrades to a full reprocess instead of
/// failing the run.
fn unprocessed_range<'a>(
    keys: &'a [SnapshotKey],
    checkpoint: Option<&SnapshotKey>,
) -> &'a [SnapshotKey] {
    let Some(checkpoint) = checkpoint else {
        return keys;
    };
    match keys.iter().position(|key| key == checkpoint) {
        Some(index) => &keys[index + 1..],
        None => {
            tracing::warn!(
                "Checkpoint {checkpoint} not found in the snapshot store; reprocessing all history"
            );
            keys
        }
    }
}

/// Fold one snapshot into the event map. Pure state-machine step, no I/O;
/// used by [`reconcile`] and exercised directly by tests.
pub fn fold_snapshot(
    events: &mut BTreeMap<String, OutageEvent>,
    previously_active: &mut BTreeSet<String>,
    snapshot: &Snapshot,
    report: &mut ReconcileReport,
) {
    let current_active: BTreeSet<String> =
        snapshot.active_ids().map(str::to_string).collect();

    // Every entity present in the snapshot warrants an event, active or not:
    // planned outages are tracked from the moment the source lists them.
    for observation in &snapshot.entities {
        let event = match events.entry(observation.id.clone()) {
            Entry::Vacant(slot) => {
                report.events_opened += 1;
                slot.insert(OutageEvent::open(
                    observation.id.clone(),
                    observation.title.clone(),
                    snapshot.observed_at,
                ))
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };

        if let Some(details) = snapshot.details.get(&observation.id) {
            if event.record_details(snapshot.observed_at, details) {
                report.history_appends += 1;
            }
        }
    }

    // Whatever was active before and is not active now has ended.
    for id in previously_active.iter() {
        if current_active.contains(id) {
            continue;
        }
        if let Some(event) = events.get_mut(id) {
            if event.is_ongoing() {
                event.close(snapshot.observed_at);
                report.events_closed += 1;
            }
        }
    }

    *previously_active = current_active;
}

// ============================================================================
// TESTS
// ============================================================================
