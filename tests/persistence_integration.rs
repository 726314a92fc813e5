//! Integration tests for entry persistence across backends.
#![allow(clippy::expect_used, clippy::unwrap_used)]

use semdup::config::{StorageBackend, StorageConfig};
use semdup::embedding::HashedEmbedder;
use semdup::models::{Entry, current_timestamp};
use semdup::storage::{FileEntryStore, InMemoryEntryStore, SqliteEntryStore, open_store};
use semdup::{DetectionConfig, DuplicateDetector, EntryStore, Error};
use std::sync::Arc;
use tempfile::TempDir;
use test_case::test_case;

fn sample_entries() -> Vec<Entry> {
    let now = current_timestamp();
    vec![
        Entry::new("first entry", vec![1.0, 0.0, 0.0], now),
        Entry::new("second entry", vec![0.0, 1.0, 0.0], now),
        Entry::new("third entry", vec![0.6, 0.0, 0.8], now),
    ]
}

fn open_backend(backend: StorageBackend, dir: &TempDir) -> Arc<dyn EntryStore> {
    let config = StorageConfig {
        backend,
        ..StorageConfig::default()
    };
    open_store(&config, dir.path()).unwrap()
}

#[test_case(StorageBackend::Memory; "memory")]
#[test_case(StorageBackend::File; "file")]
#[test_case(StorageBackend::Sqlite; "sqlite")]
fn test_export_import_round_trip(backend: StorageBackend) {
    let source_dir = TempDir::new().unwrap();
    let source = open_backend(backend, &source_dir);
    source.insert_batch(&sample_entries()).unwrap();

    let snapshot = source_dir.path().join("export").join("snapshot.json");
    assert_eq!(source.export_all(&snapshot).unwrap(), 3);

    let target_dir = TempDir::new().unwrap();
    let target = open_backend(backend, &target_dir);
    assert_eq!(target.import_all(&snapshot).unwrap(), 3);

    assert_eq!(target.load_all().unwrap(), source.load_all().unwrap());
}

#[test]
fn test_cross_backend_migration() {
    let dir = TempDir::new().unwrap();
    let file_store = FileEntryStore::open(dir.path().join("entries.json")).unwrap();
    file_store.insert_batch(&sample_entries()).unwrap();

    let snapshot = dir.path().join("migrate.json");
    file_store.export_all(&snapshot).unwrap();

    let sqlite = SqliteEntryStore::open(dir.path().join("entries.db")).unwrap();
    sqlite.import_all(&snapshot).unwrap();

    assert_eq!(sqlite.load_all().unwrap(), file_store.load_all().unwrap());
}

#[test]
fn test_import_is_all_or_nothing() {
    let dir = TempDir::new().unwrap();
    let entries = sample_entries();
    let snapshot = dir.path().join("snapshot.json");
    semdup::storage::snapshot::write_snapshot(&snapshot, &entries).unwrap();

    let store = InMemoryEntryStore::with_entries(vec![entries[1].clone()]).unwrap();
    let err = store.import_all(&snapshot).unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn test_import_rejects_malformed_snapshot() {
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("broken.json");
    std::fs::write(&snapshot, r#"{"a": {"text": "x"}}"#).unwrap();

    let store = SqliteEntryStore::in_memory().unwrap();
    let err = store.import_all(&snapshot).unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn test_file_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("entries.json");

    let first_id = {
        let detector = DuplicateDetector::new(
            Arc::new(HashedEmbedder::new()),
            Arc::new(FileEntryStore::open(&path).unwrap()),
            DetectionConfig::default(),
        )
        .unwrap();
        detector
            .add_or_find_duplicate("persistent snapshot entry")
            .unwrap()
            .id()
            .clone()
    };

    let detector = DuplicateDetector::new(
        Arc::new(HashedEmbedder::new()),
        Arc::new(FileEntryStore::open(&path).unwrap()),
        DetectionConfig::default(),
    )
    .unwrap();
    let result = detector
        .add_or_find_duplicate("persistent snapshot entry")
        .unwrap();

    assert!(result.is_duplicate());
    assert_eq!(result.id(), &first_id);
}

#[test]
fn test_sqlite_reopen_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("entries.db");
    let entries = sample_entries();

    {
        let store = SqliteEntryStore::open(&path).unwrap();
        store.insert_batch(&entries).unwrap();
    }
    let store = SqliteEntryStore::open(&path).unwrap();
    let again = SqliteEntryStore::open(&path).unwrap();

    assert_eq!(store.load_all().unwrap(), entries);
    assert_eq!(again.count().unwrap(), 3);
}

#[test]
fn test_dimension_mismatch_rejected_everywhere() {
    let dir = TempDir::new().unwrap();
    let odd = Entry::new("odd", vec![1.0, 0.0], current_timestamp());

    for backend in [
        StorageBackend::Memory,
        StorageBackend::File,
        StorageBackend::Sqlite,
    ] {
        let sub = TempDir::new_in(dir.path()).unwrap();
        let store = open_backend(backend, &sub);
        store.insert_batch(&sample_entries()).unwrap();

        let err = store.insert(&odd).unwrap_err();
        assert!(
            matches!(err, Error::InvalidInput(_)),
            "{backend:?} accepted a mismatched dimension"
        );
        assert_eq!(store.count().unwrap(), 3);
    }
}
