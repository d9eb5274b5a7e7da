use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Registry names left out of snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Exclusions {
    /// Never included in any snapshot (process-local ids).
    pub full: BTreeSet<String>,
    /// Written to disk but stripped from network snapshots (client-only registries).
    pub network: BTreeSet<String>,
}

impl Exclusions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn exclude(mut self, registry: impl Into<String>) -> Self {
        self.full.insert(registry.into());
        self
    }

    pub fn exclude_from_network(mut self, registry: impl Into<String>) -> Self {
        self.network.insert(registry.into());
        self
    }

    /// Whether `registry` is dropped from a snapshot built for the given audience.
    pub fn excludes(&self, registry: &str, for_network: bool) -> bool {
        self.full.contains(registry) || (for_network && self.network.contains(registry))
    }
}

/// On-disk backup chain settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Number of generations kept: slot 0 plus `depth - 1` older backups.
    pub depth: usize,
    /// Base file name for slot 0. Older slots append `.<index>`.
    pub file_name: String,
    /// Subdirectory of the world directory holding the chain.
    pub directory: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            depth: 4,
            file_name: "registry.dat".into(),
            directory: "data".into(),
        }
    }
}

/// Cap on a decompressed network snapshot (2 MiB).
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 2 * 1024 * 1024;

/// Top-level configuration for the synchronization subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub exclusions: Exclusions,
    pub backup: BackupConfig,
    /// How long a network receive waits for the simulation context, in seconds.
    pub sync_timeout_secs: u64,
    /// Largest decompressed snapshot accepted from a peer, in bytes.
    pub max_payload_bytes: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            exclusions: Exclusions::default(),
            backup: BackupConfig::default(),
            sync_timeout_secs: 30,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

impl SyncConfig {
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.backup.depth, 4);
        assert_eq!(cfg.backup.file_name, "registry.dat");
        assert_eq!(cfg.sync_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.max_payload_bytes, 2 * 1024 * 1024);
        assert!(cfg.exclusions.full.is_empty());
        assert!(cfg.exclusions.network.is_empty());
    }

    #[test]
    fn network_exclusion_only_applies_to_network() {
        let ex = Exclusions::none()
            .exclude("debug:local")
            .exclude_from_network("client:sounds");

        assert!(ex.excludes("debug:local", false));
        assert!(ex.excludes("debug:local", true));
        assert!(!ex.excludes("client:sounds", false));
        assert!(ex.excludes("client:sounds", true));
        assert!(!ex.excludes("block", true));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: SyncConfig =
            serde_json::from_str(r#"{ "exclusions": { "network": ["client:sounds"] } }"#).unwrap();
        assert!(cfg.exclusions.network.contains("client:sounds"));
        assert_eq!(cfg.backup, BackupConfig::default());
        assert_eq!(cfg.sync_timeout_secs, 30);
        assert_eq!(cfg.max_payload_bytes, DEFAULT_MAX_PAYLOAD_BYTES);
    }
}
