//! In-memory entry store.

use super::{EntryStore, validate_append};
use crate::Result;
use crate::models::{Entry, EntryId};
use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Entries held in insertion order plus an id index.
#[derive(Debug, Default)]
pub(super) struct EntryLog {
    entries: Vec<Entry>,
    ids: HashSet<EntryId>,
}

impl EntryLog {
    pub(super) fn from_entries(entries: Vec<Entry>) -> Result<Self> {
        let mut log = Self::default();
        log.append(&entries)?;
        Ok(log)
    }

    pub(super) fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(super) fn get(&self, id: &EntryId) -> Option<Entry> {
        if !self.ids.contains(id) {
            return None;
        }
        self.entries.iter().find(|e| &e.id == id).cloned()
    }

    /// Validates and appends; leaves the log unchanged on error.
    pub(super) fn append(&mut self, incoming: &[Entry]) -> Result<()> {
        let dimensions = self.entries.first().map(Entry::dimensions);
        validate_append(&self.ids, dimensions, incoming)?;
        for entry in incoming {
            self.ids.insert(entry.id.clone());
            self.entries.push(entry.clone());
        }
        Ok(())
    }

    /// Drops everything past the first `len` entries.
    pub(super) fn truncate(&mut self, len: usize) {
        for entry in self.entries.drain(len..) {
            self.ids.remove(&entry.id);
        }
    }
}

/// Acquires a read guard, recovering from poisoning.
pub(super) fn read_log(lock: &RwLock<EntryLog>) -> RwLockReadGuard<'_, EntryLog> {
    lock.read().unwrap_or_else(|poisoned| {
        tracing::warn!("Entry store lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Acquires a write guard, recovering from poisoning.
pub(super) fn write_log(lock: &RwLock<EntryLog>) -> RwLockWriteGuard<'_, EntryLog> {
    lock.write().unwrap_or_else(|poisoned| {
        tracing::warn!("Entry store lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Process-local store; contents are lost when it is dropped.
#[derive(Debug, Default)]
pub struct InMemoryEntryStore {
    log: RwLock<EntryLog>,
}

impl InMemoryEntryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `entries`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if the entries violate the
    /// store invariants.
    pub fn with_entries(entries: Vec<Entry>) -> Result<Self> {
        Ok(Self {
            log: RwLock::new(EntryLog::from_entries(entries)?),
        })
    }
}

impl EntryStore for InMemoryEntryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn load_all(&self) -> Result<Vec<Entry>> {
        Ok(read_log(&self.log).entries().to_vec())
    }

    fn insert(&self, entry: &Entry) -> Result<()> {
        write_log(&self.log).append(std::slice::from_ref(entry))
    }

    fn insert_batch(&self, entries: &[Entry]) -> Result<()> {
        write_log(&self.log).append(entries)
    }

    fn get(&self, id: &EntryId) -> Result<Option<Entry>> {
        Ok(read_log(&self.log).get(id))
    }

    fn count(&self) -> Result<usize> {
        Ok(read_log(&self.log).len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::current_timestamp;

    fn entry(text: &str, vector: Vec<f32>) -> Entry {
        Entry::new(text, vector, current_timestamp())
    }

    #[test]
    fn test_insert_and_load_in_order() {
        let store = InMemoryEntryStore::new();
        let first = entry("first", vec![1.0, 0.0]);
        let second = entry("second", vec![0.0, 1.0]);

        store.insert(&first).unwrap();
        store.insert(&second).unwrap();

        assert_eq!(store.load_all().unwrap(), vec![first.clone(), second]);
        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(store.get(&first.id).unwrap(), Some(first));
        assert_eq!(store.get(&EntryId::new("missing")).unwrap(), None);
    }

    #[test]
    fn test_rejects_duplicate_id() {
        let store = InMemoryEntryStore::new();
        let e = entry("text", vec![1.0]);
        store.insert(&e).unwrap();
        assert!(store.insert(&e).is_err());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_rejects_dimension_mismatch() {
        let store = InMemoryEntryStore::new();
        store.insert(&entry("a", vec![1.0, 0.0])).unwrap();
        assert!(store.insert(&entry("b", vec![1.0, 0.0, 0.0])).is_err());
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let store = InMemoryEntryStore::new();
        let a = entry("a", vec![1.0, 0.0]);
        let bad = entry("bad", vec![1.0]);
        assert!(store.insert_batch(&[a, bad]).is_err());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_truncate_restores_prior_state() {
        let mut log = EntryLog::default();
        let a = entry("a", vec![1.0]);
        let b = entry("b", vec![1.0]);
        log.append(&[a.clone(), b.clone()]).unwrap();
        log.truncate(1);
        assert_eq!(log.entries(), &[a]);
        assert!(log.get(&b.id).is_none());
        log.append(&[b]).unwrap();
        assert_eq!(log.len(), 2);
    }
}
