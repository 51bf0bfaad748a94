//! In-memory placement store for testing.

use crate::error::StorageResult;
use crate::index::LogIndex;
use crate::placement::Placement;
use crate::store::PlacementStore;
use parking_lot::RwLock;

/// An in-memory placement store.
///
/// This store keeps the whole log in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral canvases that don't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use place_storage::{InMemoryPlacementStore, Placement, PlacementStore};
///
/// let store = InMemoryPlacementStore::new();
/// store.append(&Placement::new("alice", 1, 1, 4)).unwrap();
/// assert_eq!(store.len().unwrap(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryPlacementStore {
    index: RwLock<LogIndex>,
}

impl InMemoryPlacementStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store preloaded with placements, in append order.
    #[must_use]
    pub fn with_placements(placements: Vec<Placement>) -> Self {
        let mut index = LogIndex::new();
        index.extend(placements);
        Self {
            index: RwLock::new(index),
        }
    }

    /// Returns a copy of the full log.
    #[must_use]
    pub fn placements(&self) -> Vec<Placement> {
        self.index.read().placements().to_vec()
    }
}

impl PlacementStore for InMemoryPlacementStore {
    fn append(&self, placement: &Placement) -> StorageResult<()> {
        self.index.write().push(placement.clone());
        Ok(())
    }

    fn append_batch(&self, placements: &[Placement]) -> StorageResult<()> {
        self.index.write().extend(placements.iter().cloned());
        Ok(())
    }

    fn latest_per_coordinate(&self) -> StorageResult<Vec<Placement>> {
        Ok(self.index.read().latest_per_coordinate())
    }

    fn last_at(&self, x: u16, y: u16) -> StorageResult<Option<Placement>> {
        Ok(self.index.read().last_at(x, y))
    }

    fn delete_user(&self, user: &str) -> StorageResult<usize> {
        let mut index = self.index.write();
        let kept = index.without_user(user);
        let removed = index.len() - kept.len();
        if removed > 0 {
            index.replace(kept);
        }
        Ok(removed)
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(self.index.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryPlacementStore::new();
        assert!(store.is_empty().unwrap());
        assert!(store.latest_per_coordinate().unwrap().is_empty());
        assert!(store.last_at(0, 0).unwrap().is_none());
    }

    #[test]
    fn memory_last_write_wins() {
        let store = InMemoryPlacementStore::new();
        store.append(&Placement::at(1.0, "alice", 5, 5, 3)).unwrap();
        store.append(&Placement::at(2.0, "bob", 5, 5, 8)).unwrap();

        let last = store.last_at(5, 5).unwrap().unwrap();
        assert_eq!((last.user.as_str(), last.color), ("bob", 8));
        assert_eq!(store.latest_per_coordinate().unwrap().len(), 1);
    }

    #[test]
    fn memory_batch_append_shares_order() {
        let store = InMemoryPlacementStore::new();
        let batch: Vec<_> = (0..4u16)
            .map(|x| Placement::at(7.0, "", x, 0, 0))
            .collect();
        store.append_batch(&batch).unwrap();

        assert_eq!(store.len().unwrap(), 4);
        assert!(store
            .placements()
            .iter()
            .all(|p| p.timestamp == 7.0 && p.is_system()));
    }

    #[test]
    fn memory_delete_user_restores_previous() {
        let store = InMemoryPlacementStore::new();
        store.append(&Placement::at(1.0, "alice", 0, 0, 1)).unwrap();
        store.append(&Placement::at(2.0, "mallory", 0, 0, 2)).unwrap();
        store.append(&Placement::at(3.0, "mallory", 1, 0, 2)).unwrap();

        assert_eq!(store.delete_user("mallory").unwrap(), 2);
        assert_eq!(store.last_at(0, 0).unwrap().unwrap().user, "alice");
        assert!(store.last_at(1, 0).unwrap().is_none());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn memory_delete_unknown_user_is_noop() {
        let store = InMemoryPlacementStore::with_placements(vec![Placement::at(
            1.0, "alice", 0, 0, 1,
        )]);
        assert_eq!(store.delete_user("nobody").unwrap(), 0);
        assert_eq!(store.len().unwrap(), 1);
    }
}
