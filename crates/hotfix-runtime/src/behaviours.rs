//! Behaviour discovery
//!
//! A behaviour is a concrete class that transitively derives from the marker
//! type. The marker itself, abstract classes, interfaces, and unrelated types
//! are excluded.

use hotfix_engine::TypeTable;
use parking_lot::RwLock;
use std::collections::BTreeSet;

use crate::error::{HotfixError, HotfixResult};

/// Fully-qualified name of the behaviour marker type
pub const BEHAVIOUR_MARKER: &str = "Hotfix.Core.Behaviour";

/// Names of behaviour types in `table`, or `None` when the marker is absent
pub fn discover(table: &TypeTable, marker: &str) -> Option<BTreeSet<String>> {
    let marker_id = table.get_by_name(marker)?.id;
    Some(
        table
            .iter()
            .filter(|ty| ty.is_class() && !ty.is_abstract())
            .filter(|ty| table.is_subclass_of(ty.id, marker_id))
            .map(|ty| ty.full_name.clone())
            .collect(),
    )
}

/// Behaviour names discovered in the current domain
#[derive(Debug, Default)]
pub struct BehaviourRegistry {
    names: RwLock<BTreeSet<String>>,
}

impl BehaviourRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with the behaviours in `table`.
    ///
    /// On a missing marker the registry is left empty.
    pub fn scan(&self, table: &TypeTable) -> HotfixResult<usize> {
        match discover(table, BEHAVIOUR_MARKER) {
            Some(found) => {
                let count = found.len();
                *self.names.write() = found;
                Ok(count)
            }
            None => {
                self.clear();
                Err(HotfixError::MissingBehaviourMarker(
                    BEHAVIOUR_MARKER.to_string(),
                ))
            }
        }
    }

    /// Sorted behaviour names
    pub fn list(&self) -> Vec<String> {
        self.names.read().iter().cloned().collect()
    }

    /// Whether `name` is a registered behaviour
    pub fn contains(&self, name: &str) -> bool {
        self.names.read().contains(name)
    }

    /// Number of behaviours
    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    /// Whether no behaviours are registered
    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }

    /// Remove all entries
    pub fn clear(&self) {
        self.names.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotfix_engine::{ModuleImage, TypeDef};

    fn table(module: &ModuleImage) -> TypeTable {
        TypeTable::build(module).unwrap()
    }

    #[test]
    fn test_concrete_transitive_descendants_only() {
        let mut module = ModuleImage::new("m");
        let marker = module.add_type(TypeDef::abstract_class(BEHAVIOUR_MARKER));
        let a = module.add_type(TypeDef::class("A").extends(marker));
        module.add_type(TypeDef::class("B").extends(a));
        let abs = module.add_type(TypeDef::abstract_class("Abs").extends(marker));
        module.add_type(TypeDef::class("D").extends(abs));
        module.add_type(TypeDef::class("C"));
        module.add_type(TypeDef::value_type("V"));

        let registry = BehaviourRegistry::new();
        assert_eq!(registry.scan(&table(&module)).unwrap(), 3);
        assert_eq!(registry.list(), vec!["A", "B", "D"]);
        assert!(!registry.contains(BEHAVIOUR_MARKER));
        assert!(!registry.contains("Abs"));
        assert!(!registry.contains("C"));
    }

    #[test]
    fn test_concrete_marker_is_still_excluded() {
        let mut module = ModuleImage::new("m");
        let marker = module.add_type(TypeDef::class(BEHAVIOUR_MARKER));
        module.add_type(TypeDef::class("A").extends(marker));

        let registry = BehaviourRegistry::new();
        registry.scan(&table(&module)).unwrap();
        assert_eq!(registry.list(), vec!["A"]);
    }

    #[test]
    fn test_missing_marker_clears_registry() {
        let mut with_marker = ModuleImage::new("m");
        let marker = with_marker.add_type(TypeDef::abstract_class(BEHAVIOUR_MARKER));
        with_marker.add_type(TypeDef::class("A").extends(marker));

        let registry = BehaviourRegistry::new();
        registry.scan(&table(&with_marker)).unwrap();
        assert_eq!(registry.len(), 1);

        let mut without = ModuleImage::new("m");
        without.add_type(TypeDef::class("A"));
        assert!(matches!(
            registry.scan(&table(&without)),
            Err(HotfixError::MissingBehaviourMarker(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rescan_replaces_contents() {
        let mut first = ModuleImage::new("m");
        let marker = first.add_type(TypeDef::abstract_class(BEHAVIOUR_MARKER));
        first.add_type(TypeDef::class("Old").extends(marker));

        let mut second = ModuleImage::new("m");
        let marker = second.add_type(TypeDef::abstract_class(BEHAVIOUR_MARKER));
        second.add_type(TypeDef::class("New").extends(marker));

        let registry = BehaviourRegistry::new();
        registry.scan(&table(&first)).unwrap();
        registry.scan(&table(&second)).unwrap();
        assert_eq!(registry.list(), vec!["New"]);
    }
}
