use regsync_common::{RawId, RegistryTable, RemapMode};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{RegisterError, RemapError};

/// A named registry that can report its name-to-id table.
pub trait Registry: Send {
    /// Current `(name, raw id)` pairs for every entry.
    fn ids(&self) -> Vec<(String, RawId)>;

    /// Raw id currently held by `name`.
    fn raw_id(&self, name: &str) -> Option<RawId> {
        self.ids()
            .into_iter()
            .find_map(|(n, id)| (n == name).then_some(id))
    }

    /// Whether entries can be added after construction. Frozen registries
    /// never take part in snapshots.
    fn is_extensible(&self) -> bool {
        true
    }
}

/// Capability for registries whose ids can be rewritten in place.
pub trait RemappableRegistry: Registry {
    /// Atomically reassign ids so that every live entry named in `table`
    /// takes the id given there. `scope` is the registry's directory name,
    /// used in errors and mismatches.
    fn remap(
        &mut self,
        scope: &str,
        table: &RegistryTable,
        mode: RemapMode,
    ) -> Result<RemapReport, RemapError>;

    /// Atomically restore the default (registration order) ids.
    fn unmap(&mut self, scope: &str) -> Result<(), RemapError>;
}

/// Why a name did not line up between the live registry and a remote table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MismatchKind {
    /// Live entry the peer does not know about.
    MissingRemotely,
    /// Peer entry this process does not have.
    MissingLocally,
}

/// Advisory mismatch found while applying a remote table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mismatch {
    pub registry: String,
    pub entry: String,
    pub kind: MismatchKind,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.kind {
            MismatchKind::MissingRemotely => "missing on remote",
            MismatchKind::MissingLocally => "missing locally",
        };
        write!(f, "{}/{} ({side})", self.registry, self.entry)
    }
}

/// Result of one registry's remap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapReport {
    pub mismatches: Vec<Mismatch>,
}

/// Reference registry: values keyed by name, ids assigned in registration order.
///
/// Uses BTreeMap for both directions so iteration is deterministic.
#[derive(Debug, Clone)]
pub struct SimpleRegistry<T> {
    values: BTreeMap<String, T>,
    ids: BTreeMap<String, RawId>,
    names: BTreeMap<RawId, String>,
    /// Registration order; defines the unmapped ids.
    order: Vec<String>,
    extensible: bool,
}

impl<T> Default for SimpleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SimpleRegistry<T> {
    /// Create an empty, extensible registry.
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
            ids: BTreeMap::new(),
            names: BTreeMap::new(),
            order: Vec::new(),
            extensible: true,
        }
    }

    /// Mark the registry as closed to extension.
    pub fn frozen(mut self) -> Self {
        self.extensible = false;
        self
    }

    /// Register an entry past the highest id in use. Re-registering a name
    /// replaces its value and keeps its id.
    ///
    /// Once `RawId::MAX` is taken (a remap can hand it out) the lowest unused
    /// id is chosen instead.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        value: T,
    ) -> Result<RawId, RegisterError> {
        let name = name.into();
        if let Some(&id) = self.ids.get(&name) {
            self.values.insert(name, value);
            return Ok(id);
        }
        let id = match self.names.keys().next_back() {
            None => 0,
            Some(max) => match max.checked_add(1).or_else(|| self.lowest_free_id()) {
                Some(id) => id,
                None => return Err(RegisterError::IdSpaceExhausted(name)),
            },
        };
        self.ids.insert(name.clone(), id);
        self.names.insert(id, name.clone());
        self.order.push(name.clone());
        self.values.insert(name, value);
        Ok(id)
    }

    fn lowest_free_id(&self) -> Option<RawId> {
        let mut expected: RawId = 0;
        for &id in self.names.keys() {
            if id != expected {
                return Some(expected);
            }
            expected = expected.checked_add(1)?;
        }
        Some(expected)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.values.get(name)
    }

    pub fn get_by_id(&self, id: RawId) -> Option<&T> {
        self.names.get(&id).and_then(|name| self.values.get(name))
    }

    pub fn name_of(&self, id: RawId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Entries in raw id order.
    pub fn iter(&self) -> impl Iterator<Item = (RawId, &str, &T)> {
        self.names
            .iter()
            .filter_map(|(id, name)| self.values.get(name).map(|v| (*id, name.as_str(), v)))
    }
}

impl<T: Send> Registry for SimpleRegistry<T> {
    fn ids(&self) -> Vec<(String, RawId)> {
        self.ids.iter().map(|(n, id)| (n.clone(), *id)).collect()
    }

    fn raw_id(&self, name: &str) -> Option<RawId> {
        self.ids.get(name).copied()
    }

    fn is_extensible(&self) -> bool {
        self.extensible
    }
}

impl<T: Send> RemappableRegistry for SimpleRegistry<T> {
    fn remap(
        &mut self,
        scope: &str,
        table: &RegistryTable,
        mode: RemapMode,
    ) -> Result<RemapReport, RemapError> {
        // Reject the whole table before touching any state.
        let mut claimed: BTreeMap<RawId, &str> = BTreeMap::new();
        for (name, &id) in table {
            if let Some(first) = claimed.insert(id, name.as_str()) {
                return Err(RemapError::DuplicateId {
                    registry: scope.to_string(),
                    id,
                    first: first.to_string(),
                    second: name.clone(),
                });
            }
        }

        let mut report = RemapReport::default();
        let mut ids = BTreeMap::new();
        let mut names = BTreeMap::new();

        for (name, &id) in table {
            if self.values.contains_key(name) {
                ids.insert(name.clone(), id);
                names.insert(id, name.clone());
            } else if mode == RemapMode::Remote {
                report.mismatches.push(Mismatch {
                    registry: scope.to_string(),
                    entry: name.clone(),
                    kind: MismatchKind::MissingLocally,
                });
            }
        }

        // Live-only entries go past the table's maximum, in registration order.
        let mut next = table.values().max().map(|max| max.checked_add(1));
        for name in &self.order {
            if ids.contains_key(name) {
                continue;
            }
            let id = match next {
                None => 0,
                Some(Some(id)) => id,
                Some(None) => {
                    return Err(RemapError::IdSpaceExhausted {
                        registry: scope.to_string(),
                        entry: name.clone(),
                    });
                }
            };
            next = Some(id.checked_add(1));
            ids.insert(name.clone(), id);
            names.insert(id, name.clone());
            if mode == RemapMode::Remote {
                report.mismatches.push(Mismatch {
                    registry: scope.to_string(),
                    entry: name.clone(),
                    kind: MismatchKind::MissingRemotely,
                });
            } else {
                tracing::debug!(registry = scope, entry = %name, id, "appended live-only entry");
            }
        }

        self.ids = ids;
        self.names = names;
        Ok(report)
    }

    fn unmap(&mut self, _scope: &str) -> Result<(), RemapError> {
        self.ids.clear();
        self.names.clear();
        for (id, name) in (0..).zip(&self.order) {
            self.ids.insert(name.clone(), id);
            self.names.insert(id, name.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(names: &[&str]) -> SimpleRegistry<()> {
        let mut reg = SimpleRegistry::new();
        for name in names {
            reg.register(*name, ()).unwrap();
        }
        reg
    }

    fn table(entries: &[(&str, RawId)]) -> RegistryTable {
        entries.iter().map(|(n, id)| (n.to_string(), *id)).collect()
    }

    #[test]
    fn register_assigns_sequential_ids() {
        let mut reg = SimpleRegistry::new();
        assert_eq!(reg.register("a", 1), Ok(0));
        assert_eq!(reg.register("b", 2), Ok(1));
        assert_eq!(reg.register("a", 3), Ok(0));
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.get("a"), Some(&3));
        assert_eq!(reg.name_of(1), Some("b"));
    }

    #[test]
    fn authoritative_convergence_appends_live_only_entries() {
        let mut reg = registry(&["A", "B", "C"]);
        let report = reg
            .remap("test", &table(&[("A", 5), ("B", 1)]), RemapMode::Authoritative)
            .unwrap();

        assert!(report.mismatches.is_empty());
        assert_eq!(reg.raw_id("A"), Some(5));
        assert_eq!(reg.raw_id("B"), Some(1));
        let c = reg.raw_id("C").unwrap();
        assert!(c > 5);
        assert_eq!(reg.name_of(c), Some("C"));
        assert_eq!(reg.name_of(0), None);
    }

    #[test]
    fn remote_reports_live_only_entry() {
        let mut reg = registry(&["A", "B"]);
        let report = reg
            .remap("test", &table(&[("A", 5)]), RemapMode::Remote)
            .unwrap();

        assert_eq!(reg.raw_id("A"), Some(5));
        assert_eq!(
            report.mismatches,
            vec![Mismatch {
                registry: "test".into(),
                entry: "B".into(),
                kind: MismatchKind::MissingRemotely,
            }]
        );
    }

    #[test]
    fn remote_reports_entries_unknown_locally() {
        let mut reg = registry(&["A"]);
        let report = reg
            .remap("test", &table(&[("A", 0), ("Z", 1)]), RemapMode::Remote)
            .unwrap();
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].kind, MismatchKind::MissingLocally);
        assert_eq!(report.mismatches[0].entry, "Z");
    }

    #[test]
    fn duplicate_target_id_leaves_registry_untouched() {
        let mut reg = registry(&["A", "B"]);
        let err = reg
            .remap("test", &table(&[("A", 3), ("B", 3)]), RemapMode::Authoritative)
            .unwrap_err();

        assert_eq!(
            err,
            RemapError::DuplicateId {
                registry: "test".into(),
                id: 3,
                first: "A".into(),
                second: "B".into(),
            }
        );
        assert_eq!(reg.raw_id("A"), Some(0));
        assert_eq!(reg.raw_id("B"), Some(1));
    }

    #[test]
    fn id_space_exhaustion_is_structural() {
        let mut reg = registry(&["A", "B"]);
        let err = reg
            .remap("test", &table(&[("A", RawId::MAX)]), RemapMode::Authoritative)
            .unwrap_err();
        assert!(matches!(err, RemapError::IdSpaceExhausted { .. }));
        assert_eq!(reg.raw_id("A"), Some(0));
    }

    #[test]
    fn unmap_restores_registration_order() {
        let mut reg = registry(&["A", "B", "C"]);
        reg.remap("test", &table(&[("C", 0), ("A", 7)]), RemapMode::Authoritative)
            .unwrap();
        reg.unmap("test").unwrap();

        assert_eq!(reg.raw_id("A"), Some(0));
        assert_eq!(reg.raw_id("B"), Some(1));
        assert_eq!(reg.raw_id("C"), Some(2));
    }

    #[test]
    fn ids_stay_bijective_after_remap() {
        let mut reg = registry(&["a", "b", "c", "d"]);
        reg.remap("test", &table(&[("d", 0), ("b", 2)]), RemapMode::Authoritative)
            .unwrap();

        let ids = reg.ids();
        let mut seen: Vec<RawId> = ids.iter().map(|(_, id)| *id).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 4);
        for (name, id) in ids {
            assert_eq!(reg.name_of(id), Some(name.as_str()));
        }
    }

    #[test]
    fn register_after_remap_uses_fresh_id() {
        let mut reg = registry(&["A"]);
        reg.remap("test", &table(&[("A", 9)]), RemapMode::Authoritative)
            .unwrap();
        assert_eq!(reg.register("B", ()), Ok(10));
    }

    #[test]
    fn register_after_max_id_takes_lowest_free_id() {
        let mut reg = registry(&["A", "C"]);
        reg.remap(
            "test",
            &table(&[("A", 0), ("C", RawId::MAX)]),
            RemapMode::Authoritative,
        )
        .unwrap();

        assert_eq!(reg.register("B", ()), Ok(1));
        assert_eq!(reg.register("D", ()), Ok(2));
        assert_eq!(reg.raw_id("A"), Some(0));
        assert_eq!(reg.name_of(0), Some("A"));
        assert_eq!(reg.name_of(1), Some("B"));
        assert_eq!(reg.name_of(RawId::MAX), Some("C"));
    }

    #[test]
    fn register_fills_gap_below_max_id() {
        let mut reg = registry(&["A", "B", "C"]);
        reg.remap(
            "test",
            &table(&[("A", 0), ("B", 2), ("C", RawId::MAX)]),
            RemapMode::Authoritative,
        )
        .unwrap();
        assert_eq!(reg.lowest_free_id(), Some(1));
        assert_eq!(reg.register("D", ()), Ok(1));
        assert_eq!(reg.lowest_free_id(), Some(3));
    }
}
