use regsync_common::RawId;

use crate::error::DirectoryError;
use crate::registry::{Registry, RemappableRegistry};

enum Slot {
    /// Registry without the remap capability. Never snapshotted or remapped.
    Plain(Box<dyn Registry>),
    /// Remap-capable registry. Only extensible ones are snapshot-eligible;
    /// every one of them is reset by `unmap`.
    Remappable {
        registry: Box<dyn RemappableRegistry>,
        extensible: bool,
    },
}

/// All live registries, keyed by name, in registration order.
///
/// Owned by the simulation context. Other components read through the
/// reporting interface or request mutation through the remap engine.
#[derive(Default)]
pub struct RegistryDirectory {
    entries: Vec<(String, Slot)>,
}

impl std::fmt::Debug for RegistryDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl RegistryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a registry that cannot be remapped.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        registry: impl Registry + 'static,
    ) -> Result<(), DirectoryError> {
        self.insert(name.into(), Slot::Plain(Box::new(registry)))
    }

    /// Register a remap-capable registry. Its snapshot eligibility is fixed here.
    pub fn register_remappable(
        &mut self,
        name: impl Into<String>,
        registry: impl RemappableRegistry + 'static,
    ) -> Result<(), DirectoryError> {
        let extensible = registry.is_extensible();
        let name = name.into();
        if !extensible {
            tracing::debug!(registry = %name, "frozen registry excluded from snapshots");
        }
        self.insert(
            name,
            Slot::Remappable {
                registry: Box::new(registry),
                extensible,
            },
        )
    }

    fn insert(&mut self, name: String, slot: Slot) -> Result<(), DirectoryError> {
        if self.contains(&name) {
            return Err(DirectoryError::Duplicate(name));
        }
        self.entries.push((name, slot));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Registry names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Current `(entry, id)` pairs of any registry, remappable or not.
    pub fn ids_of(&self, registry: &str) -> Option<Vec<(String, RawId)>> {
        self.slot(registry).map(|slot| match slot {
            Slot::Plain(r) => r.ids(),
            Slot::Remappable { registry, .. } => registry.ids(),
        })
    }

    /// Raw id of `entry` in `registry`.
    pub fn raw_id(&self, registry: &str, entry: &str) -> Option<RawId> {
        self.slot(registry).and_then(|slot| match slot {
            Slot::Plain(r) => r.raw_id(entry),
            Slot::Remappable { registry, .. } => registry.raw_id(entry),
        })
    }

    /// Snapshot-eligible registries (extensible and remappable), in registration order.
    pub fn eligible(&self) -> impl Iterator<Item = (&str, &dyn RemappableRegistry)> {
        self.entries.iter().filter_map(|(name, slot)| match slot {
            Slot::Remappable {
                registry,
                extensible: true,
            } => Some((name.as_str(), &**registry)),
            _ => None,
        })
    }

    /// Mutable access to a snapshot-eligible registry.
    pub fn eligible_mut(&mut self, name: &str) -> Option<&mut dyn RemappableRegistry> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .and_then(|(_, slot)| match slot {
                Slot::Remappable {
                    registry,
                    extensible: true,
                } => Some(&mut **registry as &mut dyn RemappableRegistry),
                _ => None,
            })
    }

    /// Every remap-capable registry, extensible or not.
    pub fn remappable_mut(
        &mut self,
    ) -> impl Iterator<Item = (&str, &mut dyn RemappableRegistry)> {
        self.entries.iter_mut().filter_map(|(name, slot)| match slot {
            Slot::Remappable { registry, .. } => {
                Some((name.as_str(), &mut **registry as &mut dyn RemappableRegistry))
            }
            Slot::Plain(_) => None,
        })
    }

    fn slot(&self, name: &str) -> Option<&Slot> {
        self.entries
            .iter()
            .find_map(|(n, slot)| (n == name).then_some(slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SimpleRegistry;

    struct FixedRegistry;

    impl Registry for FixedRegistry {
        fn ids(&self) -> Vec<(String, RawId)> {
            vec![("only".into(), 0)]
        }
    }

    fn simple(names: &[&str]) -> SimpleRegistry<()> {
        let mut reg = SimpleRegistry::new();
        for name in names {
            reg.register(*name, ()).unwrap();
        }
        reg
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut dir = RegistryDirectory::new();
        dir.register_remappable("block", simple(&["stone"])).unwrap();
        let err = dir.register("block", FixedRegistry).unwrap_err();
        assert_eq!(err, DirectoryError::Duplicate("block".into()));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn eligibility_requires_both_capabilities() {
        let mut dir = RegistryDirectory::new();
        dir.register_remappable("block", simple(&["stone"])).unwrap();
        dir.register_remappable("dimension", simple(&["overworld"]).frozen())
            .unwrap();
        dir.register("fixed", FixedRegistry).unwrap();

        let eligible: Vec<&str> = dir.eligible().map(|(n, _)| n).collect();
        assert_eq!(eligible, vec!["block"]);
        assert!(dir.eligible_mut("dimension").is_none());
        assert!(dir.eligible_mut("fixed").is_none());

        let remappable: Vec<&str> = dir.remappable_mut().map(|(n, _)| n).collect();
        assert_eq!(remappable, vec!["block", "dimension"]);
    }

    #[test]
    fn names_keep_registration_order() {
        let mut dir = RegistryDirectory::new();
        dir.register_remappable("item", simple(&[])).unwrap();
        dir.register_remappable("block", simple(&[])).unwrap();
        let names: Vec<&str> = dir.names().collect();
        assert_eq!(names, vec!["item", "block"]);
    }

    #[test]
    fn reads_through_any_slot() {
        let mut dir = RegistryDirectory::new();
        dir.register_remappable("block", simple(&["stone", "dirt"]))
            .unwrap();
        dir.register("fixed", FixedRegistry).unwrap();

        assert_eq!(dir.raw_id("block", "dirt"), Some(1));
        assert_eq!(dir.raw_id("fixed", "only"), Some(0));
        assert_eq!(dir.ids_of("block").map(|ids| ids.len()), Some(2));
        assert!(dir.ids_of("missing").is_none());
    }
}
