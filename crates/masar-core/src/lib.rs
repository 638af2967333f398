// masar-core: Save/restore client discipline on top of an asynchronous RPC transport.

pub mod client;
pub mod config;
pub mod connection;
pub mod correlator;
pub mod error;
pub mod mapper;
pub mod model;
pub mod registry;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::SaveRestoreClient;
pub use config::ClientConfig;
pub use correlator::ConnectionState;
pub use error::CoreError;
pub use registry::ServiceRegistry;

pub use model::{
    AlarmSeverity, BaseLevel, BeamlineSet, BeamlineSetData, CapturedValue, ProcessValue,
    ServiceEndpoint, Snapshot, SnapshotItems, SnapshotQuery, ValueSnapshot,
};
