//! Shared types for registry id synchronization.
//!
//! # Invariants
//! - A `Snapshot` is plain data: it has no identity beyond its content.
//! - Registry iteration order inside a snapshot is sorted by name.

pub mod config;
pub mod types;

pub use config::{BackupConfig, DEFAULT_MAX_PAYLOAD_BYTES, Exclusions, SyncConfig};
pub use types::{RawId, RegistryTable, RemapMode, SNAPSHOT_FORMAT_VERSION, Snapshot};
