pub mod artifact;
pub mod config;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod store;
pub mod timestamp;

pub use artifact::{derive_summary, Artifact, ArtifactMetadata, EventRecord};
pub use config::FaultlineConfig;
pub use error::FaultlineError;
pub use models::event::{HistoryEntry, OutageEvent};
pub use models::snapshot::{
    ActivitySignal, EntityObservation, Snapshot, SnapshotDocument, SnapshotKey,
};
pub use reconcile::{reconcile, ReconcileOutcome, ReconcileReport};
pub use store::snapshots::{FsSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use store::state::{JsonArtifactStore, MemoryStateStore, StateStore};
