//! Durable checkpoint-and-event state.
//!
//! The engine owns exactly one durable document: the output artifact, which
//! doubles as the checkpoint. [`StateStore`] makes that storage explicit and
//! injectable instead of an ambient file path inside the fold, so the engine
//! can run against an in-memory store in tests.
//!
//! Loading degrades, saving does not: a missing or corrupt artifact must
//! never abort a run (the cost is only redundant reprocessing), but a failed
//! save is fatal and must leave the previous artifact untouched.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::artifact::Artifact;
use crate::error::FaultlineError;
use crate::models::event::OutageEvent;
use crate::models::snapshot::SnapshotKey;

/// Durable storage for the checkpoint and the full event state.
pub trait StateStore {
    /// Prior checkpoint and events, keyed by outage id. Returns empty state
    /// when nothing usable is stored; never fails.
    fn load(&self) -> (Option<SnapshotKey>, BTreeMap<String, OutageEvent>);

    /// Persist the full state. Readers of a previously valid artifact must
    /// never observe a torn one, even if the process dies mid-save.
    fn save(
        &self,
        checkpoint: Option<&SnapshotKey>,
        events: &BTreeMap<String, OutageEvent>,
    ) -> Result<(), FaultlineError>;
}

// ============================================================================
// JSON artifact on disk
// ============================================================================

/// State store backed by the JSON artifact file.
pub struct JsonArtifactStore {
    path: PathBuf,
}

impl JsonArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonArtifactStore {
    fn load(&self) -> (Option<SnapshotKey>, BTreeMap<String, OutageEvent>) {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(_) => {
                tracing::info!(
                    "No prior artifact at {}; processing all history",
                    self.path.display()
                );
                return (None, BTreeMap::new());
            }
        };

        match serde_json::from_slice::<Artifact>(&bytes) {
            Ok(artifact) => artifact.into_state(),
            Err(err) => {
                tracing::warn!(
                    "Could not parse prior artifact at {}: {}; processing all history",
                    self.path.display(),
                    err
                );
                (None, BTreeMap::new())
            }
        }
    }

    fn save(
        &self,
        checkpoint: Option<&SnapshotKey>,
        events: &BTreeMap<String, OutageEvent>,
    ) -> Result<(), FaultlineError> {
        let artifact = Artifact::render(events, checkpoint);
        let bytes = artifact
            .to_pretty_json()
            .map_err(|err| FaultlineError::ArtifactWrite(err.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write-to-temporary-then-rename so a crash mid-write cannot leave a
        // torn artifact where readers look. The rename stays on one
        // filesystem because the temporary lives next to the target.
        let tmp = self.path.with_file_name(match self.path.file_name() {
            Some(name) => format!("{}.tmp", name.to_string_lossy()),
            None => {
                return Err(FaultlineError::ArtifactWrite(format!(
                    "artifact path {} has no file name",
                    self.path.display()
                )))
            }
        });
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-memory state store for tests.
#[derive(Default)]
pub struct MemoryStateStore {
    state: RefCell<(Option<SnapshotKey>, BTreeMap<String, OutageEvent>)>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> (Option<SnapshotKey>, BTreeMap<String, OutageEvent>) {
        self.state.borrow().clone()
    }

    fn save(
        &self,
        checkpoint: Option<&SnapshotKey>,
        events: &BTreeMap<String, OutageEvent>,
    ) -> Result<(), FaultlineError> {
        *self.state.borrow_mut() = (checkpoint.cloned(), events.clone());
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
