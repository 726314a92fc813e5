//! `SQLite` entry store.
//!
//! One row per entry:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS entries (
//!     id TEXT PRIMARY KEY,
//!     text TEXT NOT NULL,
//!     vector TEXT NOT NULL,     -- JSON array of floats
//!     timestamp TEXT NOT NULL   -- RFC 3339, microseconds, Z
//! );
//! ```
//!
//! Scans are ordered by rowid, which follows insertion order.

mod connection;

pub use connection::{BUSY_TIMEOUT_MS, acquire_lock, configure_connection};

use super::{EntryStore, record_operation_metrics};
use crate::config::is_valid_table_name;
use crate::models::{Entry, EntryId, format_timestamp, parse_timestamp};
use crate::{Error, Result};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

/// `SQLite`-backed entry store.
pub struct SqliteEntryStore {
    /// Connection guarded for thread-safe access.
    conn: Mutex<Connection>,
    /// Database path (`None` for in-memory databases).
    db_path: Option<PathBuf>,
    /// Table name.
    table: String,
}

impl SqliteEntryStore {
    /// Opens (or creates) a database at `path` using the `entries` table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the database cannot be opened
    /// or the schema cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_table(path, "entries")
    }

    /// Opens (or creates) a database at `path` using a custom table name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an invalid table name and
    /// [`Error::StoreUnavailable`] if the database cannot be opened.
    pub fn with_table(path: impl Into<PathBuf>, table: &str) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::store("sqlite_create_dir", format!("{}: {e}", parent.display())))?;
        }

        let conn = Connection::open(&path)
            .map_err(|e| Error::store("sqlite_open", format!("{}: {e}", path.display())))?;
        Self::from_connection(conn, Some(path), table)
    }

    /// Creates an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::store("sqlite_open", e))?;
        Self::from_connection(conn, None, "entries")
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>, table: &str) -> Result<Self> {
        if !is_valid_table_name(table) {
            return Err(Error::InvalidInput(format!("invalid table name '{table}'")));
        }
        configure_connection(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
            table: table.to_string(),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Creates the table if it does not exist.
    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                vector TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )",
            self.table
        ))
        .map_err(|e| Error::store("sqlite_create_table", e))
    }

    /// Returns the dimension of the stored vectors, if any are stored.
    fn stored_dimensions(conn: &Connection, table: &str) -> Result<Option<usize>> {
        let vector: Option<String> = conn
            .query_row(
                &format!("SELECT vector FROM {table} ORDER BY rowid LIMIT 1"),
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::store("sqlite_read_dimensions", e))?;

        vector
            .map(|v| decode_vector(&v).map(|values| values.len()))
            .transpose()
    }

    /// Inserts entries inside a single `BEGIN IMMEDIATE` transaction.
    fn insert_all(&self, entries: &[Entry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let conn = acquire_lock(&self.conn);

        conn.execute("BEGIN IMMEDIATE", [])
            .map_err(|e| Error::store("sqlite_begin_transaction", e))?;

        let result = self.insert_rows(&conn, entries);
        finish_transaction(&conn, result)
    }

    fn insert_rows(&self, conn: &Connection, entries: &[Entry]) -> Result<()> {
        let mut dimensions = Self::stored_dimensions(conn, &self.table)?;
        let mut stmt = conn
            .prepare_cached(&format!(
                "INSERT INTO {} (id, text, vector, timestamp) VALUES (?1, ?2, ?3, ?4)",
                self.table
            ))
            .map_err(|e| Error::store("sqlite_prepare_insert", e))?;

        for entry in entries {
            let expected = *dimensions.get_or_insert(entry.dimensions());
            if expected != entry.dimensions() {
                return Err(Error::InvalidInput(format!(
                    "entry '{}' has {} dimensions, store holds {expected}",
                    entry.id,
                    entry.dimensions()
                )));
            }

            let vector = serde_json::to_string(&entry.vector)
                .map_err(|e| Error::store("sqlite_encode_vector", e))?;
            stmt.execute(params![
                entry.id.as_str(),
                entry.text,
                vector,
                format_timestamp(&entry.timestamp),
            ])
            .map_err(|e| match e.sqlite_error_code() {
                Some(ErrorCode::ConstraintViolation) => {
                    Error::InvalidInput(format!("entry id '{}' already exists", entry.id))
                },
                _ => Error::store("sqlite_insert", e),
            })?;
        }

        Ok(())
    }

    /// Reads every row ordered by rowid.
    fn scan(&self) -> Result<Vec<Entry>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT id, text, vector, timestamp FROM {} ORDER BY rowid",
                self.table
            ))
            .map_err(|e| Error::store("sqlite_prepare_scan", e))?;

        let rows = stmt
            .query_map([], read_row)
            .map_err(|e| Error::store("sqlite_scan", e))?;

        let mut entries = Vec::new();
        for row in rows {
            let row = row.map_err(|e| Error::store("sqlite_scan", e))?;
            entries.push(row.into_entry()?);
        }
        Ok(entries)
    }
}

impl EntryStore for SqliteEntryStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn load_all(&self) -> Result<Vec<Entry>> {
        let start = Instant::now();
        let result = self.scan();
        record_operation_metrics("sqlite", "load_all", start, &result);
        result
    }

    fn insert(&self, entry: &Entry) -> Result<()> {
        let start = Instant::now();
        let result = self.insert_all(std::slice::from_ref(entry));
        record_operation_metrics("sqlite", "insert", start, &result);
        result
    }

    fn insert_batch(&self, entries: &[Entry]) -> Result<()> {
        let start = Instant::now();
        let result = self.insert_all(entries);
        record_operation_metrics("sqlite", "insert_batch", start, &result);
        result
    }

    fn get(&self, id: &EntryId) -> Result<Option<Entry>> {
        let conn = acquire_lock(&self.conn);
        let row = conn
            .query_row(
                &format!(
                    "SELECT id, text, vector, timestamp FROM {} WHERE id = ?1",
                    self.table
                ),
                params![id.as_str()],
                read_row,
            )
            .optional()
            .map_err(|e| Error::store("sqlite_get", e))?;

        row.map(RawRow::into_entry).transpose()
    }

    fn count(&self) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| {
                row.get(0)
            })
            .map_err(|e| Error::store("sqlite_count", e))?;
        usize::try_from(count).map_err(|e| Error::store("sqlite_count", e))
    }
}

/// Row as stored, before decoding.
struct RawRow {
    id: String,
    text: String,
    vector: String,
    timestamp: String,
}

impl RawRow {
    fn into_entry(self) -> Result<Entry> {
        Ok(Entry {
            vector: decode_vector(&self.vector)?,
            timestamp: parse_timestamp(&self.timestamp)?,
            id: EntryId::new(self.id),
            text: self.text,
        })
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        text: row.get(1)?,
        vector: row.get(2)?,
        timestamp: row.get(3)?,
    })
}

fn decode_vector(value: &str) -> Result<Vec<f32>> {
    serde_json::from_str(value).map_err(|e| Error::store("sqlite_decode_vector", e))
}

/// Commits on success and rolls back otherwise, including when `COMMIT`
/// itself fails and leaves the transaction open.
fn finish_transaction(conn: &Connection, result: Result<()>) -> Result<()> {
    let result = result.and_then(|()| {
        conn.execute("COMMIT", [])
            .map(|_| ())
            .map_err(|e| Error::store("sqlite_commit_transaction", e))
    });
    if result.is_err() && !conn.is_autocommit() {
        let _ = conn.execute("ROLLBACK", []);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::current_timestamp;
    use tempfile::TempDir;

    fn entry(text: &str, vector: Vec<f32>) -> Entry {
        Entry::new(text, vector, current_timestamp())
    }

    #[test]
    fn test_insert_and_scan_in_insertion_order() {
        let store = SqliteEntryStore::in_memory().unwrap();
        let entries: Vec<_> = ["zebra", "apple", "mango"]
            .iter()
            .map(|t| entry(t, vec![0.25, -0.5, 1.0]))
            .collect();
        for e in &entries {
            store.insert(e).unwrap();
        }

        assert_eq!(store.load_all().unwrap(), entries);
        assert_eq!(store.count().unwrap(), 3);
        assert_eq!(store.get(&entries[1].id).unwrap().as_ref(), Some(&entries[1]));
        assert!(store.get(&EntryId::new("missing")).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_id_is_invalid_input() {
        let store = SqliteEntryStore::in_memory().unwrap();
        let e = entry("text", vec![1.0, 0.0]);
        store.insert(&e).unwrap();

        let err = store.insert(&e).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let store = SqliteEntryStore::in_memory().unwrap();
        store.insert(&entry("a", vec![1.0, 0.0])).unwrap();
        let err = store.insert(&entry("b", vec![1.0])).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_batch_rolls_back_on_failure() {
        let store = SqliteEntryStore::in_memory().unwrap();
        let a = entry("a", vec![1.0, 0.0]);
        let batch = vec![a.clone(), entry("b", vec![0.0, 1.0]), a];

        assert!(store.insert_batch(&batch).is_err());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_failed_commit_is_rolled_back() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE parent (id INTEGER PRIMARY KEY);
             CREATE TABLE child (
                 parent_id INTEGER REFERENCES parent(id) DEFERRABLE INITIALLY DEFERRED
             );",
        )
        .unwrap();

        conn.execute("BEGIN IMMEDIATE", []).unwrap();
        conn.execute("INSERT INTO child (parent_id) VALUES (7)", []).unwrap();
        let err = finish_transaction(&conn, Ok(())).unwrap_err();

        assert!(matches!(err, Error::StoreUnavailable { .. }));
        assert!(conn.is_autocommit());
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM child", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 0);
        conn.execute("BEGIN IMMEDIATE", []).unwrap();
    }

    #[test]
    fn test_schema_init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db").join("entries.db");

        let e = entry("persisted", vec![0.6, 0.8]);
        SqliteEntryStore::open(&path).unwrap().insert(&e).unwrap();

        let reopened = SqliteEntryStore::open(&path).unwrap();
        assert_eq!(reopened.db_path(), Some(path.as_path()));
        assert_eq!(reopened.load_all().unwrap(), vec![e]);
    }

    #[test]
    fn test_custom_table() {
        let dir = TempDir::new().unwrap();
        let store = SqliteEntryStore::with_table(dir.path().join("t.db"), "texts").unwrap();
        store.insert(&entry("a", vec![1.0])).unwrap();
        assert_eq!(store.count().unwrap(), 1);

        assert!(SqliteEntryStore::with_table(dir.path().join("t.db"), "bad name").is_err());
    }

    #[test]
    fn test_corrupt_vector_is_store_unavailable() {
        let store = SqliteEntryStore::in_memory().unwrap();
        acquire_lock(&store.conn)
            .execute(
                "INSERT INTO entries VALUES ('x', 'text', 'not-json', '2024-05-01T12:00:00.000000Z')",
                [],
            )
            .unwrap();
        assert!(matches!(
            store.load_all().unwrap_err(),
            Error::StoreUnavailable { .. }
        ));
    }
}
