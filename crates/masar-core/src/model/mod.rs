// ── Save/restore domain model ──
//
// Value objects built from service responses. None of them is mutated
// after construction; "update" operations return new instances.

pub mod base_level;
pub mod beamline_set;
pub mod endpoint;
pub mod query;
pub mod snapshot;

// ── Re-exports ──────────────────────────────────────────────────────

pub use base_level::BaseLevel;
pub use beamline_set::{BeamlineSet, BeamlineSetData};
pub use endpoint::ServiceEndpoint;
pub use query::SnapshotQuery;
pub use snapshot::{
    AlarmSeverity, CapturedValue, ProcessValue, Snapshot, SnapshotItems, ValueSnapshot,
};
