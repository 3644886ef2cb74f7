//! Explicit per-process partition bookkeeping.
//!
//! [`PartitionRegistry`] records which roles exist and how much
//! parallelism each one was assigned at build time. It is constructed
//! once per process and passed by reference into every consumer — there
//! is deliberately no global, process-wide instance.

use fxhash::FxHashMap;

/// Role → parallelism bookkeeping for one multicast topology.
#[derive(Debug, Clone, Default)]
pub struct PartitionRegistry {
    assignments: FxHashMap<String, u32>,
}

impl PartitionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a role's parallelism assignment, replacing any previous
    /// value for the same role.
    pub fn assign(&mut self, role: impl Into<String>, parallelism: u32) {
        self.assignments.insert(role.into(), parallelism);
    }

    /// Removes a role, returning its parallelism if it was registered.
    pub fn remove(&mut self, role: &str) -> Option<u32> {
        self.assignments.remove(role)
    }

    /// Returns a role's assigned parallelism.
    #[must_use]
    pub fn parallelism_of(&self, role: &str) -> Option<u32> {
        self.assignments.get(role).copied()
    }

    /// Returns whether a role is registered.
    #[must_use]
    pub fn contains(&self, role: &str) -> bool {
        self.assignments.contains_key(role)
    }

    /// Returns the number of registered roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Returns the sum of all assigned parallelism, i.e. the total number
    /// of downstream replicas the topology serves.
    #[must_use]
    pub fn total_parallelism(&self) -> u64 {
        self.assignments.values().map(|&p| u64::from(p)).sum()
    }

    /// Iterates over `(role, parallelism)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.assignments.iter().map(|(role, &p)| (role.as_str(), p))
    }

    /// Clears all assignments.
    pub fn clear(&mut self) {
        self.assignments.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_and_query() {
        let mut registry = PartitionRegistry::new();
        registry.assign("n1", 3);
        registry.assign("n2", 3);
        registry.assign("n3", 3);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.parallelism_of("n2"), Some(3));
        assert_eq!(registry.total_parallelism(), 9);
        assert!(registry.contains("n1"));
        assert!(!registry.contains("n4"));
    }

    #[test]
    fn test_reassign_replaces() {
        let mut registry = PartitionRegistry::new();
        registry.assign("n1", 2);
        registry.assign("n1", 5);
        assert_eq!(registry.parallelism_of("n1"), Some(5));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut registry = PartitionRegistry::new();
        registry.assign("n1", 2);
        assert_eq!(registry.remove("n1"), Some(2));
        assert_eq!(registry.remove("n1"), None);
        registry.assign("n2", 1);
        registry.clear();
        assert!(registry.is_empty());
    }
}
