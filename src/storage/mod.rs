//! Entry storage.
//!
//! Every backend implements [`EntryStore`]: an append-only collection of
//! [`Entry`] values scanned in a stable, backend-native order.
//!
//! | Backend | Order | Durability |
//! |---------|-------|------------|
//! | [`InMemoryEntryStore`] | insertion | none |
//! | [`FileEntryStore`] | insertion | JSON snapshot rewritten per insert |
//! | [`SqliteEntryStore`] | rowid | `SQLite` transaction |
//! | `PostgresEntryStore` | timestamp, id | PostgreSQL transaction |

mod file;
mod memory;
#[cfg(feature = "postgres")]
mod postgresql;
pub mod snapshot;
pub mod sqlite;

pub use file::FileEntryStore;
pub use memory::InMemoryEntryStore;
#[cfg(feature = "postgres")]
pub use postgresql::PostgresEntryStore;
pub use sqlite::SqliteEntryStore;

use crate::config::{StorageBackend, StorageConfig};
use crate::models::{Entry, EntryId};
use crate::{Error, Result};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Trait for entry store backends.
///
/// Stores are internally synchronized and only grow: there is no update or
/// delete. Identifiers are unique and all vectors share one dimension.
pub trait EntryStore: Send + Sync {
    /// Returns a short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;

    /// Returns every stored entry in the backend's stable scan order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the medium cannot be read.
    fn load_all(&self) -> Result<Vec<Entry>>;

    /// Appends one entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] on an id collision or dimension
    /// mismatch, and [`Error::StoreUnavailable`] if the write fails.
    fn insert(&self, entry: &Entry) -> Result<()>;

    /// Appends several entries, all or nothing.
    ///
    /// # Errors
    ///
    /// Same as [`EntryStore::insert`]; nothing is written on error.
    fn insert_batch(&self, entries: &[Entry]) -> Result<()>;

    /// Looks up an entry by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the medium cannot be read.
    fn get(&self, id: &EntryId) -> Result<Option<Entry>>;

    /// Returns the number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the medium cannot be read.
    fn count(&self) -> Result<usize>;

    /// Writes all entries to a snapshot file and returns how many were written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if reading or writing fails.
    fn export_all(&self, destination: &Path) -> Result<usize> {
        let entries = self.load_all()?;
        snapshot::write_snapshot(destination, &entries)?;
        tracing::info!(
            backend = self.backend_name(),
            path = %destination.display(),
            count = entries.len(),
            "Exported entries"
        );
        Ok(entries.len())
    }

    /// Appends all entries of a snapshot file and returns how many were added.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the snapshot is malformed or any of
    /// its entries would violate the store invariants; nothing is imported.
    fn import_all(&self, source: &Path) -> Result<usize> {
        let entries = snapshot::read_snapshot(source)?;
        self.insert_batch(&entries)?;
        tracing::info!(
            backend = self.backend_name(),
            path = %source.display(),
            count = entries.len(),
            "Imported entries"
        );
        Ok(entries.len())
    }
}

/// Opens the store selected by configuration.
///
/// `data_dir` anchors the default path of file-backed stores.
///
/// # Errors
///
/// Returns an error if the backend cannot be opened or is not compiled in.
pub fn open_store(config: &StorageConfig, data_dir: &Path) -> Result<Arc<dyn EntryStore>> {
    let store: Arc<dyn EntryStore> = match config.backend {
        StorageBackend::Memory => Arc::new(InMemoryEntryStore::new()),
        StorageBackend::File => Arc::new(FileEntryStore::open(config.resolved_path(data_dir))?),
        StorageBackend::Sqlite => Arc::new(SqliteEntryStore::with_table(
            config.resolved_path(data_dir),
            &config.table,
        )?),
        #[cfg(feature = "postgres")]
        StorageBackend::Postgres => {
            let url = config.connection_url.as_deref().ok_or_else(|| {
                Error::InvalidInput("postgres backend requires a connection URL".to_string())
            })?;
            Arc::new(PostgresEntryStore::with_pool_size(
                url,
                &config.table,
                config.pool_max_size,
            )?)
        },
        #[cfg(not(feature = "postgres"))]
        StorageBackend::Postgres => {
            return Err(Error::InvalidInput(
                "storage backend 'postgres' requires the postgres feature".to_string(),
            ));
        },
    };

    tracing::debug!(backend = store.backend_name(), "Entry store opened");
    Ok(store)
}

/// Checks that `incoming` can be appended to a store holding `existing_ids`
/// whose vectors have `existing_dimensions`.
///
/// Rejects id collisions (with stored entries or within the batch) and any
/// dimension that differs from the stored one or from the batch's first entry.
pub(crate) fn validate_append(
    existing_ids: &HashSet<EntryId>,
    existing_dimensions: Option<usize>,
    incoming: &[Entry],
) -> Result<()> {
    let mut seen = HashSet::with_capacity(incoming.len());
    let mut dimensions = existing_dimensions;

    for entry in incoming {
        if existing_ids.contains(&entry.id) || !seen.insert(&entry.id) {
            return Err(Error::InvalidInput(format!(
                "entry id '{}' already exists",
                entry.id
            )));
        }
        match dimensions {
            Some(expected) if expected != entry.dimensions() => {
                return Err(Error::InvalidInput(format!(
                    "entry '{}' has {} dimensions, store holds {expected}",
                    entry.id,
                    entry.dimensions()
                )));
            },
            Some(_) => {},
            None => dimensions = Some(entry.dimensions()),
        }
    }

    Ok(())
}

/// Records `storage_operations_total` and `storage_operation_duration_ms`
/// for one backend operation.
pub(crate) fn record_operation_metrics<T>(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    result: &Result<T>,
) {
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::counter!(
        "storage_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::current_timestamp;

    fn entry(id: &str, dims: usize) -> Entry {
        Entry {
            id: EntryId::new(id),
            text: id.to_string(),
            vector: vec![0.5; dims],
            timestamp: current_timestamp(),
        }
    }

    #[test]
    fn test_validate_append_accepts_fresh_entries() {
        let existing: HashSet<EntryId> = [EntryId::new("a")].into_iter().collect();
        assert!(validate_append(&existing, Some(3), &[entry("b", 3), entry("c", 3)]).is_ok());
        assert!(validate_append(&HashSet::new(), None, &[]).is_ok());
    }

    #[test]
    fn test_validate_append_rejects_collisions() {
        let existing: HashSet<EntryId> = [EntryId::new("a")].into_iter().collect();
        assert!(validate_append(&existing, Some(3), &[entry("a", 3)]).is_err());
        assert!(validate_append(&HashSet::new(), None, &[entry("b", 3), entry("b", 3)]).is_err());
    }

    #[test]
    fn test_validate_append_rejects_dimension_mismatch() {
        assert!(validate_append(&HashSet::new(), Some(3), &[entry("a", 4)]).is_err());
        assert!(validate_append(&HashSet::new(), None, &[entry("a", 3), entry("b", 4)]).is_err());
    }

    #[test]
    fn test_open_memory_store() {
        let config = StorageConfig {
            backend: StorageBackend::Memory,
            ..StorageConfig::default()
        };
        let store = open_store(&config, Path::new("unused")).unwrap();
        assert_eq!(store.backend_name(), "memory");
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_open_file_store_under_data_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = open_store(&StorageConfig::default(), dir.path()).unwrap();
        assert_eq!(store.backend_name(), "file");

        store.insert(&entry("a", 2)).unwrap();
        assert!(dir.path().join("entries.json").exists());
    }

    #[cfg(not(feature = "postgres"))]
    #[test]
    fn test_open_postgres_without_feature() {
        let config = StorageConfig {
            backend: StorageBackend::Postgres,
            connection_url: Some("postgres://localhost/semdup".to_string()),
            ..StorageConfig::default()
        };
        assert!(open_store(&config, Path::new("unused")).is_err());
    }
}
