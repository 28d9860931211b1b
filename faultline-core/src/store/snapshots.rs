//! Snapshot store: ordered, read-only access to capture documents.
//!
//! Captures live under a history directory, either flat or bucketed into
//! `YYYY-MM/` subdirectories; discovery is a recursive walk. The key space is
//! the set of `*.json` file stems, excluding `*.details.json` sidecars, and
//! key order (lexicographic) is chronological order by the capture contract.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::FaultlineError;
use crate::models::snapshot::{SnapshotDocument, SnapshotKey};

const SIDECAR_SUFFIX: &str = ".details.json";

/// Read-only source of capture documents, ordered by key.
pub trait SnapshotStore {
    /// All snapshot keys in ascending (chronological) order.
    fn keys(&self) -> Result<Vec<SnapshotKey>, FaultlineError>;

    /// The raw document for one key, with its sidecar if one exists.
    fn load(&self, key: &SnapshotKey) -> Result<SnapshotDocument, FaultlineError>;
}

// ============================================================================
// Filesystem store
// ============================================================================

/// Snapshot store over a history directory on disk.
pub struct FsSnapshotStore {
    index: BTreeMap<SnapshotKey, PathBuf>,
}

impl FsSnapshotStore {
    /// Scan `root` recursively. A missing root is an empty store, not an
    /// error; the capture job may simply not have run yet.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, FaultlineError> {
        let root = root.as_ref();
        let mut index = BTreeMap::new();
        if root.exists() {
            scan(root, &mut index)?;
        }
        Ok(Self { index })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl SnapshotStore for FsSnapshotStore {
    fn keys(&self) -> Result<Vec<SnapshotKey>, FaultlineError> {
        Ok(self.index.keys().cloned().collect())
    }

    fn load(&self, key: &SnapshotKey) -> Result<SnapshotDocument, FaultlineError> {
        let path = self
            .index
            .get(key)
            .ok_or_else(|| FaultlineError::MalformedSnapshot {
                key: key.to_string(),
                reason: "not present in the snapshot store".to_string(),
            })?;

        let body = read_document(path, key)?;
        let sidecar_path = path.with_file_name(format!("{key}{SIDECAR_SUFFIX}"));
        let sidecar = if sidecar_path.exists() {
            Some(read_document(&sidecar_path, key)?)
        } else {
            None
        };

        Ok(SnapshotDocument { body, sidecar })
    }
}

fn read_document(path: &Path, key: &SnapshotKey) -> Result<Value, FaultlineError> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|err| FaultlineError::MalformedSnapshot {
        key: key.to_string(),
        reason: err.to_string(),
    })
}

fn scan(dir: &Path, index: &mut BTreeMap<SnapshotKey, PathBuf>) -> Result<(), FaultlineError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            scan(&path, index)?;
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !name.ends_with(".json") || name.ends_with(SIDECAR_SUFFIX) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
            index.insert(SnapshotKey::new(stem), path.clone());
        }
    }
    Ok(())
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-memory snapshot store, used by tests and by callers that already hold
/// the documents.
#[derive(Default)]
pub struct MemorySnapshotStore {
    documents: BTreeMap<SnapshotKey, SnapshotDocument>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, body: Value) {
        self.insert_with_sidecar(key, body, None);
    }

    pub fn insert_with_sidecar(
        &mut self,
        key: impl Into<String>,
        body: Value,
        sidecar: Option<Value>,
    ) {
        self.documents
            .insert(SnapshotKey::new(key), SnapshotDocument { body, sidecar });
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn keys(&self) -> Result<Vec<SnapshotKey>, FaultlineError> {
        Ok(self.documents.keys().cloned().collect())
    }

    fn load(&self, key: &SnapshotKey) -> Result<SnapshotDocument, FaultlineError> {
        self.documents
            .get(key)
            .cloned()
            .ok_or_else(|| FaultlineError::MalformedSnapshot {
                key: key.to_string(),
                reason: "not present in the snapshot store".to_string(),
            })
    }
}

// ============================================================================
// TESTS
// ============================================================================
