//! PostgreSQL entry store.
//!
//! Same row shape as the `SQLite` store plus a `seq BIGSERIAL` column; scans
//! are ordered by `seq`, which is insertion order because writers hold a table
//! lock. Only compiled with the `postgres` feature.

use super::{EntryStore, record_operation_metrics};
use crate::config::is_valid_table_name;
use crate::models::{Entry, EntryId, format_timestamp, parse_timestamp};
use crate::{Error, Result};
use deadpool_postgres::{Config, Pool, Runtime};
use std::time::{Duration, Instant};
use tokio_postgres::NoTls;
use tokio_postgres::error::SqlState;

/// Default maximum connections in pool.
const DEFAULT_POOL_MAX_SIZE: usize = 8;

/// Pool wait, create and recycle timeout.
const POOL_TIMEOUT: Duration = Duration::from_secs(5);

/// PostgreSQL-backed entry store.
pub struct PostgresEntryStore {
    /// Connection pool.
    pool: Pool,
    /// Table name.
    table: String,
    /// Runtime driving the async client from synchronous callers.
    ///
    /// Always `Some` until drop.
    runtime: Option<tokio::runtime::Runtime>,
}

fn pool_error(e: impl std::fmt::Display) -> Error {
    Error::store("postgres_get_client", e)
}

impl PostgresEntryStore {
    /// Connects and creates the table if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the database is unreachable.
    pub fn new(connection_url: &str, table: &str) -> Result<Self> {
        Self::with_pool_size(connection_url, table, None)
    }

    /// Connects with a configurable pool size (defaults to 8).
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the database is unreachable.
    pub fn with_pool_size(
        connection_url: &str,
        table: &str,
        pool_max_size: Option<usize>,
    ) -> Result<Self> {
        let store = Self::connect_lazy(connection_url, table, pool_max_size)?;
        store.block_on(store.initialize())?;
        Ok(store)
    }

    /// Builds the pool and runtime without touching the database.
    fn connect_lazy(
        connection_url: &str,
        table: &str,
        pool_max_size: Option<usize>,
    ) -> Result<Self> {
        if !is_valid_table_name(table) {
            return Err(Error::InvalidInput(format!("invalid table name '{table}'")));
        }

        let config = connection_url
            .parse::<tokio_postgres::Config>()
            .map_err(|e| Error::InvalidInput(format!("invalid postgres URL: {e}")))?;
        let cfg = Self::build_pool_config(&config, pool_max_size);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("semdup-postgres")
            .enable_all()
            .build()
            .map_err(|e| Error::store("postgres_create_runtime", e))?;

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| Error::store("postgres_create_pool", e))?;

        Ok(Self {
            pool,
            table: table.to_string(),
            runtime: Some(runtime),
        })
    }

    /// Extracts host string from tokio-postgres Host.
    #[cfg(unix)]
    fn host_to_string(h: &tokio_postgres::config::Host) -> String {
        match h {
            tokio_postgres::config::Host::Tcp(s) => s.clone(),
            tokio_postgres::config::Host::Unix(p) => p.to_string_lossy().to_string(),
        }
    }

    /// Extracts host string from tokio-postgres Host (Windows: Tcp only).
    #[cfg(not(unix))]
    fn host_to_string(h: &tokio_postgres::config::Host) -> String {
        let tokio_postgres::config::Host::Tcp(s) = h;
        s.clone()
    }

    /// Builds a deadpool config with bounded pool waits.
    fn build_pool_config(config: &tokio_postgres::Config, pool_max_size: Option<usize>) -> Config {
        let mut cfg = Config::new();
        cfg.host = config.get_hosts().first().map(Self::host_to_string);
        cfg.port = config.get_ports().first().copied();
        cfg.user = config.get_user().map(String::from);
        cfg.password = config
            .get_password()
            .map(|p| String::from_utf8_lossy(p).to_string());
        cfg.dbname = config.get_dbname().map(String::from);

        cfg.pool = Some(deadpool_postgres::PoolConfig {
            max_size: pool_max_size.unwrap_or(DEFAULT_POOL_MAX_SIZE),
            timeouts: deadpool_postgres::Timeouts {
                wait: Some(POOL_TIMEOUT),
                create: Some(POOL_TIMEOUT),
                recycle: Some(POOL_TIMEOUT),
            },
            ..Default::default()
        });
        cfg.manager = Some(deadpool_postgres::ManagerConfig {
            recycling_method: deadpool_postgres::RecyclingMethod::Fast,
        });

        cfg
    }

    /// Runs a future on the store's runtime.
    ///
    /// Blocking inside another runtime's worker would panic, so callers on a
    /// runtime thread are moved off it with `block_in_place`.
    fn block_on<F, T>(&self, f: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| Error::store("postgres_block_on", "runtime already shut down"))?;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| runtime.block_on(f))
            },
            Ok(_) => Err(Error::store(
                "postgres_block_on",
                "cannot block inside a current-thread runtime; use spawn_blocking",
            )),
            Err(_) => runtime.block_on(f),
        }
    }

    async fn initialize(&self) -> Result<()> {
        let client = self.pool.get().await.map_err(pool_error)?;
        client
            .batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    text TEXT NOT NULL,
                    vector TEXT NOT NULL,
                    timestamp TEXT NOT NULL,
                    seq BIGSERIAL
                );
                ALTER TABLE {table} ADD COLUMN IF NOT EXISTS seq BIGSERIAL;
                CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_seq ON {table} (seq);",
                table = self.table
            ))
            .await
            .map_err(|e| Error::store("postgres_create_table", e))
    }

    async fn load_all_async(&self) -> Result<Vec<Entry>> {
        let client = self.pool.get().await.map_err(pool_error)?;
        let rows = client
            .query(
                &format!(
                    "SELECT id, text, vector, timestamp FROM {} ORDER BY seq",
                    self.table
                ),
                &[],
            )
            .await
            .map_err(|e| Error::store("postgres_scan", e))?;

        rows.iter().map(row_to_entry).collect()
    }

    async fn insert_all_async(&self, entries: &[Entry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut client = self.pool.get().await.map_err(pool_error)?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| Error::store("postgres_begin_transaction", e))?;

        // Serializes writers so the dimension check below sees a stable table.
        tx.batch_execute(&format!(
            "LOCK TABLE {} IN SHARE ROW EXCLUSIVE MODE",
            self.table
        ))
        .await
        .map_err(|e| Error::store("postgres_lock_table", e))?;

        let first = tx
            .query_opt(
                &format!(
                    "SELECT vector FROM {} ORDER BY seq LIMIT 1",
                    self.table
                ),
                &[],
            )
            .await
            .map_err(|e| Error::store("postgres_read_dimensions", e))?;
        let mut dimensions = first
            .map(|row| decode_vector(row.get(0)).map(|v| v.len()))
            .transpose()?;

        let stmt = tx
            .prepare(&format!(
                "INSERT INTO {} (id, text, vector, timestamp) VALUES ($1, $2, $3, $4)",
                self.table
            ))
            .await
            .map_err(|e| Error::store("postgres_prepare_insert", e))?;

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
                .map_err(|e| Error::store("postgres_encode_vector", e))?;
            let timestamp = format_timestamp(&entry.timestamp);
            tx.execute(&stmt, &[&entry.id.as_str(), &entry.text, &vector, &timestamp])
                .await
                .map_err(|e| {
                    if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                        Error::InvalidInput(format!("entry id '{}' already exists", entry.id))
                    } else {
                        Error::store("postgres_insert", e)
                    }
                })?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::store("postgres_commit_transaction", e))
    }

    async fn get_async(&self, id: &EntryId) -> Result<Option<Entry>> {
        let client = self.pool.get().await.map_err(pool_error)?;
        let row = client
            .query_opt(
                &format!(
                    "SELECT id, text, vector, timestamp FROM {} WHERE id = $1",
                    self.table
                ),
                &[&id.as_str()],
            )
            .await
            .map_err(|e| Error::store("postgres_get", e))?;

        row.as_ref().map(row_to_entry).transpose()
    }

    async fn count_async(&self) -> Result<usize> {
        let client = self.pool.get().await.map_err(pool_error)?;
        let row = client
            .query_one(&format!("SELECT COUNT(*) FROM {}", self.table), &[])
            .await
            .map_err(|e| Error::store("postgres_count", e))?;
        let count: i64 = row.get(0);
        usize::try_from(count).map_err(|e| Error::store("postgres_count", e))
    }
}

impl EntryStore for PostgresEntryStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    fn load_all(&self) -> Result<Vec<Entry>> {
        let start = Instant::now();
        let result = self.block_on(self.load_all_async());
        record_operation_metrics("postgres", "load_all", start, &result);
        result
    }

    fn insert(&self, entry: &Entry) -> Result<()> {
        let start = Instant::now();
        let result = self.block_on(self.insert_all_async(std::slice::from_ref(entry)));
        record_operation_metrics("postgres", "insert", start, &result);
        result
    }

    fn insert_batch(&self, entries: &[Entry]) -> Result<()> {
        let start = Instant::now();
        let result = self.block_on(self.insert_all_async(entries));
        record_operation_metrics("postgres", "insert_batch", start, &result);
        result
    }

    fn get(&self, id: &EntryId) -> Result<Option<Entry>> {
        self.block_on(self.get_async(id))
    }

    fn count(&self) -> Result<usize> {
        self.block_on(self.count_async())
    }
}

impl Drop for PostgresEntryStore {
    fn drop(&mut self) {
        // The last owner may be dropped inside another runtime's task, where a
        // blocking shutdown panics.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn row_to_entry(row: &tokio_postgres::Row) -> Result<Entry> {
    let id: String = row.get(0);
    let text: String = row.get(1);
    let vector: &str = row.get(2);
    let timestamp: &str = row.get(3);
    Ok(Entry {
        id: EntryId::new(id),
        text,
        vector: decode_vector(vector)?,
        timestamp: parse_timestamp(timestamp)?,
    })
}

fn decode_vector(value: &str) -> Result<Vec<f32>> {
    serde_json::from_str(value).map_err(|e| Error::store("postgres_decode_vector", e))
}
