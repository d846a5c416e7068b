// Resolved scope distances, keyed by reference node

use rustc_hash::FxHashMap;

use crate::ast::NodeId;

/// Distances produced by the resolver. Populated once per compilation and
/// merged into the interpreter's cache; never overwritten.
#[derive(Debug, Clone, Default)]
pub struct LocalCache {
    pub variables: FxHashMap<NodeId, usize>,
    pub functions: FxHashMap<NodeId, usize>,
    pub classes: FxHashMap<NodeId, usize>,
    /// `super` node -> the class declaration whose body contains it
    pub supers: FxHashMap<NodeId, SuperOwner>,
}

/// Class declaration a `super` call belongs to. Two classes in one lineage
/// may share a name, so the declaration id is what identifies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperOwner {
    pub class: NodeId,
    pub name: String,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variable(&self, id: NodeId) -> Option<usize> {
        self.variables.get(&id).copied()
    }

    pub fn function(&self, id: NodeId) -> Option<usize> {
        self.functions.get(&id).copied()
    }

    pub fn class(&self, id: NodeId) -> Option<usize> {
        self.classes.get(&id).copied()
    }

    pub fn super_owner(&self, id: NodeId) -> Option<&SuperOwner> {
        self.supers.get(&id)
    }

    /// Add entries from `other`; entries already present are kept
    pub fn merge(&mut self, other: &LocalCache) {
        for (id, distance) in &other.variables {
            self.variables.entry(*id).or_insert(*distance);
        }
        for (id, distance) in &other.functions {
            self.functions.entry(*id).or_insert(*distance);
        }
        for (id, distance) in &other.classes {
            self.classes.entry(*id).or_insert(*distance);
        }
        for (id, owner) in &other.supers {
            self.supers.entry(*id).or_insert_with(|| owner.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.variables.len() + self.functions.len() + self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_existing_entries() {
        let shared = NodeId::next();
        let fresh = NodeId::next();

        let mut cache = LocalCache::new();
        cache.variables.insert(shared, 1);

        let mut other = LocalCache::new();
        other.variables.insert(shared, 5);
        other.classes.insert(fresh, 2);
        let owner = SuperOwner {
            class: NodeId::next(),
            name: "A".to_string(),
        };
        other.supers.insert(fresh, owner.clone());

        cache.merge(&other);
        assert_eq!(cache.variable(shared), Some(1));
        assert_eq!(cache.class(fresh), Some(2));
        assert_eq!(cache.super_owner(fresh), Some(&owner));
        assert_eq!(cache.len(), 2);
    }
}
