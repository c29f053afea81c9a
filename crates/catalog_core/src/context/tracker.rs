//! In-memory change tracking for one context session.
//!
//! # Invariants
//! - At most one `Unchanged`, `Modified` or `Deleted` entry exists per
//!   persisted `CategoryId`.
//! - `Added` entries are the only ones allowed to have no id.
//! - Entry keys are never reused within a tracker.

use crate::model::category::{Category, CategoryId};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Context-local handle of a tracked category.
///
/// Stays valid across `save_changes`, so callers can read the id that
/// storage assigned to a staged insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryKey(u64);

impl Display for EntryKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Pending-change state of a tracked category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Matches storage as of the last read or commit.
    Unchanged,
    /// Will be inserted on commit.
    Added,
    /// Will be updated on commit.
    Modified,
    /// Will be deleted on commit.
    Deleted,
}

#[derive(Debug, Clone)]
pub(crate) struct TrackedEntry {
    pub(crate) category: Category,
    pub(crate) state: EntryState,
}

#[derive(Debug, Default)]
pub(crate) struct ChangeTracker {
    next_key: u64,
    entries: BTreeMap<EntryKey, TrackedEntry>,
}

impl ChangeTracker {
    pub(crate) fn attach(&mut self, category: Category, state: EntryState) -> EntryKey {
        self.next_key += 1;
        let key = EntryKey(self.next_key);
        self.entries.insert(key, TrackedEntry { category, state });
        key
    }

    pub(crate) fn get(&self, key: EntryKey) -> Option<&TrackedEntry> {
        self.entries.get(&key)
    }

    pub(crate) fn get_mut(&mut self, key: EntryKey) -> Option<&mut TrackedEntry> {
        self.entries.get_mut(&key)
    }

    pub(crate) fn detach(&mut self, key: EntryKey) -> Option<TrackedEntry> {
        self.entries.remove(&key)
    }

    pub(crate) fn key_for_id(&self, id: CategoryId) -> Option<EntryKey> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.category.id == Some(id))
            .map(|(key, _)| *key)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (EntryKey, &TrackedEntry)> {
        self.entries.iter().map(|(key, entry)| (*key, entry))
    }

    /// Snapshot of entries that `save_changes` has to write.
    pub(crate) fn pending(&self) -> Vec<(EntryKey, TrackedEntry)> {
        self.iter()
            .filter(|(_, entry)| entry.state != EntryState::Unchanged)
            .map(|(key, entry)| (key, entry.clone()))
            .collect()
    }

    pub(crate) fn has_changes(&self) -> bool {
        self.entries
            .values()
            .any(|entry| entry.state != EntryState::Unchanged)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Marks a successful commit: ids are written back, deletes detached.
    pub(crate) fn accept_changes(&mut self, assigned: &[(EntryKey, CategoryId)]) {
        for (key, id) in assigned {
            if let Some(entry) = self.entries.get_mut(key) {
                entry.category.id = Some(*id);
            }
        }

        self.entries
            .retain(|_, entry| entry.state != EntryState::Deleted);
        for entry in self.entries.values_mut() {
            entry.state = EntryState::Unchanged;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeTracker, EntryState};
    use crate::model::category::Category;

    #[test]
    fn accept_changes_assigns_ids_and_drops_deleted_entries() {
        let mut tracker = ChangeTracker::default();
        let added = tracker.attach(Category::new("Books"), EntryState::Added);
        let deleted = tracker.attach(Category::with_id(7, "Toys"), EntryState::Deleted);
        assert!(tracker.has_changes());

        tracker.accept_changes(&[(added, 42)]);

        let entry = tracker.get(added).unwrap();
        assert_eq!(entry.category.id, Some(42));
        assert_eq!(entry.state, EntryState::Unchanged);
        assert!(tracker.get(deleted).is_none());
        assert!(!tracker.has_changes());
        assert_eq!(tracker.key_for_id(42), Some(added));
    }

    #[test]
    fn keys_are_not_reused_after_detach() {
        let mut tracker = ChangeTracker::default();
        let first = tracker.attach(Category::new("Books"), EntryState::Added);
        tracker.detach(first);
        let second = tracker.attach(Category::new("Games"), EntryState::Added);
        assert_ne!(first, second);
    }
}
