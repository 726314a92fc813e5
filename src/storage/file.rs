//! Snapshot-file entry store.
//!
//! Holds entries in memory and rewrites the whole JSON snapshot after every
//! insertion, so the file always reflects every acknowledged write.

use super::memory::{EntryLog, read_log, write_log};
use super::{EntryStore, snapshot};
use crate::models::{Entry, EntryId};
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Instant;

/// File-persisted store backed by a JSON snapshot.
#[derive(Debug)]
pub struct FileEntryStore {
    /// Snapshot file path.
    path: PathBuf,
    /// In-memory copy of the snapshot.
    log: RwLock<EntryLog>,
}

impl FileEntryStore {
    /// Opens a store, loading the snapshot at `path` if it exists.
    ///
    /// A missing file is an empty store; the file is created on first insert.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing snapshot cannot be read or violates
    /// the store invariants.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            snapshot::read_snapshot(&path)?
        } else {
            Vec::new()
        };
        let log = EntryLog::from_entries(entries)?;

        tracing::debug!(path = %path.display(), entries = log.len(), "Opened snapshot store");
        Ok(Self {
            path,
            log: RwLock::new(log),
        })
    }

    /// Returns the snapshot path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends entries and flushes the snapshot, rolling back on flush failure.
    fn append_and_flush(&self, entries: &[Entry]) -> Result<()> {
        let mut log = write_log(&self.log);
        let previous_len = log.len();
        log.append(entries)?;

        let start = Instant::now();
        if let Err(e) = snapshot::write_snapshot(&self.path, log.entries()) {
            log.truncate(previous_len);
            tracing::error!(path = %self.path.display(), error = %e, "Snapshot flush failed");
            return Err(e);
        }

        metrics::histogram!("snapshot_flush_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        Ok(())
    }
}

impl EntryStore for FileEntryStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    fn load_all(&self) -> Result<Vec<Entry>> {
        Ok(read_log(&self.log).entries().to_vec())
    }

    fn insert(&self, entry: &Entry) -> Result<()> {
        self.append_and_flush(std::slice::from_ref(entry))
    }

    fn insert_batch(&self, entries: &[Entry]) -> Result<()> {
        self.append_and_flush(entries)
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
    use crate::Error;
    use tempfile::TempDir;

    fn entry(text: &str) -> Entry {
        Entry::new(text, vec![0.6, 0.8], current_timestamp())
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = FileEntryStore::open(dir.path().join("entries.json")).unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_every_insert_rewrites_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entries.json");
        let store = FileEntryStore::open(&path).unwrap();

        let first = entry("first");
        store.insert(&first).unwrap();
        assert_eq!(snapshot::read_snapshot(&path).unwrap(), vec![first.clone()]);

        let second = entry("second");
        store.insert(&second).unwrap();
        assert_eq!(snapshot::read_snapshot(&path).unwrap(), vec![first, second]);
    }

    #[test]
    fn test_reopen_restores_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entries.json");
        let e = entry("persisted");
        FileEntryStore::open(&path).unwrap().insert(&e).unwrap();

        let reopened = FileEntryStore::open(&path).unwrap();
        assert_eq!(reopened.load_all().unwrap(), vec![e.clone()]);
        assert!(reopened.insert(&e).is_err());
    }

    #[test]
    fn test_corrupt_snapshot_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entries.json");
        std::fs::write(&path, "not json").unwrap();
        let err = FileEntryStore::open(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_failed_flush_rolls_back() {
        let dir = TempDir::new().unwrap();
        // A directory where the snapshot file should be makes the rename fail.
        let path = dir.path().join("entries.json");
        std::fs::create_dir(&path).unwrap();
        let blocked = FileEntryStore {
            path,
            log: RwLock::new(EntryLog::default()),
        };

        assert!(blocked.insert(&entry("lost")).is_err());
        assert_eq!(blocked.count().unwrap(), 0);
        assert!(!dir.path().join("entries.json.tmp").exists());
    }
}
