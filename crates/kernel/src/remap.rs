//! Remap engine: reconciles live registries against a snapshot.
//!
//! Not safe to call concurrently with the simulation context's own registry
//! access. Off-thread callers must marshal onto that context first.

use regsync_common::{RemapMode, Snapshot};

use crate::directory::RegistryDirectory;
use crate::error::RemapError;
use crate::registry::Mismatch;

/// Aggregated result of a successful `apply`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapOutcome {
    /// Registries that were remapped, in snapshot order.
    pub remapped: Vec<String>,
    /// Advisory mismatches from every registry, in snapshot order.
    pub mismatches: Vec<Mismatch>,
}

impl RemapOutcome {
    /// No mismatches were reported.
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Apply `snapshot` to every live, snapshot-eligible registry it names.
///
/// Registries are processed in snapshot order. Live registries absent from
/// the snapshot are left alone, as are snapshot tables with no live
/// counterpart. The first structural failure stops the call; registries
/// already remapped stay remapped.
pub fn apply(
    directory: &mut RegistryDirectory,
    snapshot: &Snapshot,
    mode: RemapMode,
) -> Result<RemapOutcome, RemapError> {
    let _span = tracing::info_span!("registry_remap", %mode).entered();
    let mut outcome = RemapOutcome::default();

    for (name, table) in &snapshot.registries {
        let Some(registry) = directory.eligible_mut(name) else {
            tracing::trace!(registry = %name, "no live remappable registry, skipping");
            continue;
        };

        let report = registry.remap(name, table, mode).inspect_err(|e| {
            tracing::error!(registry = %name, error = %e, "remap failed");
        })?;

        tracing::debug!(
            registry = %name,
            entries = table.len(),
            mismatches = report.mismatches.len(),
            "registry remapped"
        );
        for mismatch in &report.mismatches {
            tracing::warn!(%mismatch, "registry entry mismatch");
        }

        outcome.remapped.push(name.clone());
        outcome.mismatches.extend(report.mismatches);
    }

    Ok(outcome)
}

/// Reset every remap-capable registry to its default ids.
///
/// Returns how many registries were reset. Stops at the first failure.
pub fn unmap(directory: &mut RegistryDirectory) -> Result<usize, RemapError> {
    let _span = tracing::info_span!("registry_unmap").entered();
    let mut count = 0;
    for (name, registry) in directory.remappable_mut() {
        registry.unmap(name).inspect_err(|e| {
            tracing::error!(registry = name, error = %e, "unmap failed");
        })?;
        count += 1;
    }
    tracing::debug!(count, "registries unmapped");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MismatchKind, Registry, RemapReport, RemappableRegistry, SimpleRegistry};
    use regsync_common::{RawId, RegistryTable};

    fn simple(names: &[&str]) -> SimpleRegistry<()> {
        let mut reg = SimpleRegistry::new();
        for name in names {
            reg.register(*name, ()).unwrap();
        }
        reg
    }

    fn table(entries: &[(&str, RawId)]) -> RegistryTable {
        entries.iter().map(|(n, id)| (n.to_string(), *id)).collect()
    }

    /// Always rejects remaps; used to check that failures stop the batch.
    struct RejectingRegistry;

    impl Registry for RejectingRegistry {
        fn ids(&self) -> Vec<(String, RawId)> {
            Vec::new()
        }
    }

    impl RemappableRegistry for RejectingRegistry {
        fn remap(
            &mut self,
            scope: &str,
            _table: &RegistryTable,
            _mode: RemapMode,
        ) -> Result<RemapReport, RemapError> {
            Err(RemapError::Rejected {
                registry: scope.into(),
                reason: "read-only".into(),
            })
        }

        fn unmap(&mut self, scope: &str) -> Result<(), RemapError> {
            Err(RemapError::Rejected {
                registry: scope.into(),
                reason: "read-only".into(),
            })
        }
    }

    #[test]
    fn authoritative_convergence() {
        let mut dir = RegistryDirectory::new();
        dir.register_remappable("block", simple(&["A", "B", "C"]))
            .unwrap();

        let mut snap = Snapshot::new();
        snap.insert_table("block", table(&[("A", 5), ("B", 1)]));

        let outcome = apply(&mut dir, &snap, RemapMode::Authoritative).unwrap();
        assert!(outcome.is_clean());
        assert_eq!(outcome.remapped, vec!["block".to_string()]);
        assert_eq!(dir.raw_id("block", "A"), Some(5));
        assert_eq!(dir.raw_id("block", "B"), Some(1));
        assert!(dir.raw_id("block", "C").unwrap() > 5);
    }

    #[test]
    fn remote_mismatches_aggregate_across_registries() {
        let mut dir = RegistryDirectory::new();
        dir.register_remappable("block", simple(&["A", "B"])).unwrap();
        dir.register_remappable("item", simple(&["X", "Y"])).unwrap();

        let mut snap = Snapshot::new();
        snap.insert_table("block", table(&[("A", 5)]));
        snap.insert_table("item", table(&[("Y", 0)]));

        let outcome = apply(&mut dir, &snap, RemapMode::Remote).unwrap();
        assert_eq!(dir.raw_id("block", "A"), Some(5));
        assert_eq!(dir.raw_id("item", "Y"), Some(0));

        let entries: Vec<(&str, &str)> = outcome
            .mismatches
            .iter()
            .map(|m| (m.registry.as_str(), m.entry.as_str()))
            .collect();
        assert_eq!(entries, vec![("block", "B"), ("item", "X")]);
        assert!(
            outcome
                .mismatches
                .iter()
                .all(|m| m.kind == MismatchKind::MissingRemotely)
        );
    }

    #[test]
    fn registries_absent_from_snapshot_untouched() {
        let mut dir = RegistryDirectory::new();
        dir.register_remappable("block", simple(&["A", "B"])).unwrap();
        dir.register_remappable("item", simple(&["X", "Y"])).unwrap();

        let mut snap = Snapshot::new();
        snap.insert_table("block", table(&[("B", 0), ("A", 1)]));
        snap.insert_table("unknown", table(&[("Q", 0)]));

        let outcome = apply(&mut dir, &snap, RemapMode::Authoritative).unwrap();
        assert_eq!(outcome.remapped, vec!["block".to_string()]);
        assert_eq!(dir.raw_id("item", "X"), Some(0));
        assert_eq!(dir.raw_id("item", "Y"), Some(1));
    }

    #[test]
    fn frozen_registries_are_skipped() {
        let mut dir = RegistryDirectory::new();
        dir.register_remappable("dimension", simple(&["overworld"]).frozen())
            .unwrap();

        let mut snap = Snapshot::new();
        snap.insert_table("dimension", table(&[("overworld", 3)]));

        let outcome = apply(&mut dir, &snap, RemapMode::Authoritative).unwrap();
        assert!(outcome.remapped.is_empty());
        assert_eq!(dir.raw_id("dimension", "overworld"), Some(0));
    }

    #[test]
    fn structural_failure_stops_without_rollback() {
        let mut dir = RegistryDirectory::new();
        dir.register_remappable("a_block", simple(&["A", "B"])).unwrap();
        dir.register_remappable("b_broken", RejectingRegistry).unwrap();
        dir.register_remappable("c_item", simple(&["X", "Y"])).unwrap();

        let mut snap = Snapshot::new();
        snap.insert_table("a_block", table(&[("B", 0), ("A", 1)]));
        snap.insert_table("b_broken", table(&[]));
        snap.insert_table("c_item", table(&[("Y", 0), ("X", 1)]));

        let err = apply(&mut dir, &snap, RemapMode::Authoritative).unwrap_err();
        assert_eq!(err.registry(), "b_broken");
        // Earlier registry stays remapped, later one is never reached.
        assert_eq!(dir.raw_id("a_block", "B"), Some(0));
        assert_eq!(dir.raw_id("c_item", "X"), Some(0));
    }

    #[test]
    fn unmap_resets_every_remappable_registry() {
        let mut dir = RegistryDirectory::new();
        dir.register_remappable("block", simple(&["A", "B"])).unwrap();
        dir.register_remappable("dimension", simple(&["overworld", "nether"]).frozen())
            .unwrap();

        let mut snap = Snapshot::new();
        snap.insert_table("block", table(&[("B", 0), ("A", 1)]));
        apply(&mut dir, &snap, RemapMode::Remote).unwrap();
        assert_eq!(dir.raw_id("block", "A"), Some(1));

        assert_eq!(unmap(&mut dir).unwrap(), 2);
        assert_eq!(dir.raw_id("block", "A"), Some(0));
        assert_eq!(dir.raw_id("block", "B"), Some(1));
    }

    #[test]
    fn unmap_surfaces_failure() {
        let mut dir = RegistryDirectory::new();
        dir.register_remappable("broken", RejectingRegistry).unwrap();
        let err = unmap(&mut dir).unwrap_err();
        assert_eq!(err.registry(), "broken");
    }
}
