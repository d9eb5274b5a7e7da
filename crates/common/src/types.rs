use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The only snapshot format this crate reads or writes.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Dense integer id assigned to a registry entry.
pub type RawId = u32;

/// Entry name to raw id, for a single registry.
///
/// Ids are unique within a table but need not be contiguous.
pub type RegistryTable = BTreeMap<String, RawId>;

/// Policy deciding whose ids win when a registry is reconciled against a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemapMode {
    /// The snapshot is ground truth (trusted save file). Live-only entries
    /// are kept and given fresh ids past the snapshot's maximum.
    Authoritative,
    /// The snapshot comes from the session's network peer. Live-only entries
    /// are reported as mismatches.
    Remote,
}

impl fmt::Display for RemapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authoritative => f.write_str("authoritative"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// A versioned capture of registry name-to-id tables at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format tag. Anything other than [`SNAPSHOT_FORMAT_VERSION`] is incompatible.
    pub version: u32,
    /// Registry name to its table. BTreeMap keeps encoding deterministic.
    pub registries: BTreeMap<String, RegistryTable>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshot {
    /// An empty snapshot at the current format version.
    pub fn new() -> Self {
        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            registries: BTreeMap::new(),
        }
    }

    /// Insert or replace the table for a registry.
    pub fn insert_table(&mut self, registry: impl Into<String>, table: RegistryTable) {
        self.registries.insert(registry.into(), table);
    }

    pub fn table(&self, registry: &str) -> Option<&RegistryTable> {
        self.registries.get(registry)
    }

    pub fn contains(&self, registry: &str) -> bool {
        self.registries.contains_key(registry)
    }

    pub fn registry_names(&self) -> impl Iterator<Item = &str> {
        self.registries.keys().map(String::as_str)
    }

    /// Total number of entries across all registries.
    pub fn entry_count(&self) -> usize {
        self.registries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }
}
