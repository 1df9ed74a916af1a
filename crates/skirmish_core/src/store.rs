//! Backing storage for combat records.
//!
//! # Reference invalidation
//!
//! [`CombatStore::get_mut`] hands out a direct `&mut CombatState`. The borrow
//! checker already forbids holding it across [`CombatStore::insert`], and that
//! is the rule to keep in mind when porting callers: a reference into the
//! store is valid only until the next insertion. Hold an [`EntityId`] across
//! structural changes, never a reference.

use std::collections::{BTreeSet, HashMap};

use crate::error::{CombatError, Result};
use crate::state::{CombatState, EntityId};

/// Map of entity ID to combat record.
///
/// Lookup is O(1). Anything that must be reproducible (saves, hashes)
/// iterates via [`CombatStore::sorted_ids`].
#[derive(Debug, Clone, Default)]
pub struct CombatStore {
    records: HashMap<EntityId, CombatState>,
}

impl CombatStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::AlreadyRegistered`] if `id` already has one.
    pub fn insert(&mut self, id: EntityId, state: CombatState) -> Result<()> {
        if self.records.contains_key(&id) {
            return Err(CombatError::AlreadyRegistered(id));
        }
        self.records.insert(id, state);
        Ok(())
    }

    /// Remove a record.
    pub fn remove(&mut self, id: EntityId) -> Option<CombatState> {
        self.records.remove(&id)
    }

    /// Get a record.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&CombatState> {
        self.records.get(&id)
    }

    /// Get a mutable record. See the module docs for how long it stays valid.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut CombatState> {
        self.records.get_mut(&id)
    }

    /// Get a record or fail with [`CombatError::NotRegistered`].
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::NotRegistered`] when absent.
    pub fn require(&self, id: EntityId) -> Result<&CombatState> {
        self.get(id).ok_or(CombatError::NotRegistered(id))
    }

    /// Mutable variant of [`CombatStore::require`].
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::NotRegistered`] when absent.
    pub fn require_mut(&mut self, id: EntityId) -> Result<&mut CombatState> {
        self.records
            .get_mut(&id)
            .ok_or(CombatError::NotRegistered(id))
    }

    /// Check whether a record exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.records.contains_key(&id)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record IDs in ascending order.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.records.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over records (unordered).
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &CombatState)> {
        self.records.iter()
    }

    /// Drop every record, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.records.len();
        self.records.clear();
        count
    }
}

/// Entities whose death animation is playing.
///
/// Non-owning: membership is an ID, the entity itself lives in the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingDeaths {
    ids: BTreeSet<EntityId>,
}

impl PendingDeaths {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity. Returns `false` if it was already pending.
    pub fn insert(&mut self, id: EntityId) -> bool {
        self.ids.insert(id)
    }

    /// Remove an entity. Returns `false` if it was not pending.
    pub fn remove(&mut self, id: EntityId) -> bool {
        self.ids.remove(&id)
    }

    /// Membership test.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.ids.contains(&id)
    }

    /// Pending entities in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.ids.iter().copied()
    }

    /// Number of pending deaths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Forget every pending death.
    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Stance;

    #[test]
    fn test_double_insert_rejected() {
        let mut store = CombatStore::new();
        store
            .insert(7, CombatState::new(10, Stance::Aggressive))
            .unwrap();
        let err = store
            .insert(7, CombatState::new(10, Stance::Aggressive))
            .unwrap_err();
        assert!(matches!(err, CombatError::AlreadyRegistered(7)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_sorted_ids() {
        let mut store = CombatStore::new();
        for id in [9, 2, 5] {
            store
                .insert(id, CombatState::new(1, Stance::NoEngagement))
                .unwrap();
        }
        assert_eq!(store.sorted_ids(), vec![2, 5, 9]);
    }

    #[test]
    fn test_require_missing() {
        let mut store = CombatStore::new();
        assert!(matches!(
            store.require(4),
            Err(CombatError::NotRegistered(4))
        ));
        assert!(store.require_mut(4).is_err());
    }

    #[test]
    fn test_mutation_in_place() {
        let mut store = CombatStore::new();
        store
            .insert(1, CombatState::new(30, Stance::Aggressive))
            .unwrap();
        store.get_mut(1).unwrap().current_hp = 12;
        assert_eq!(store.get(1).unwrap().current_hp, 12);
        assert_eq!(store.clear(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_pending_deaths_set_semantics() {
        let mut pending = PendingDeaths::new();
        assert!(pending.insert(3));
        assert!(!pending.insert(3));
        assert!(pending.insert(1));
        assert_eq!(pending.iter().collect::<Vec<_>>(), vec![1, 3]);
        assert!(pending.remove(3));
        assert!(!pending.remove(3));
        assert_eq!(pending.len(), 1);
    }
}
