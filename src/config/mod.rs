//! Configuration management.
//!
//! Configuration is resolved in layers: built-in defaults, then a TOML file,
//! then `SEMDUP_*` environment variables, then CLI flags (applied by the
//! binary).
//!
//! # Environment Variables
//!
//! | Variable | Type | Default | Description |
//! |----------|------|---------|-------------|
//! | `SEMDUP_THRESHOLD` | f32 | `0.6` | Duplicate similarity threshold |
//! | `SEMDUP_DATA_DIR` | path | `.semdup` | Base directory for local stores |
//! | `SEMDUP_STORAGE_BACKEND` | string | `file` | `memory`, `file`, `sqlite`, `postgres` |
//! | `SEMDUP_STORAGE_PATH` | path | per backend | Snapshot file or `SQLite` database |
//! | `SEMDUP_DATABASE_URL` / `DATABASE_URL` | string | none | PostgreSQL connection URL |
//! | `SEMDUP_STORAGE_TABLE` | string | `entries` | SQL table name |
//! | `SEMDUP_EMBEDDING_PROVIDER` | string | `hashed` | `hashed` or `fastembed` |
//! | `SEMDUP_EMBEDDING_DIMENSIONS` | usize | `384` | Hashed embedder dimensions |
//! | `SEMDUP_HOST` / `SEMDUP_PORT` | string / u16 | `0.0.0.0` / `8000` | HTTP bind address |
//! | `SEMDUP_LOG_FORMAT` | string | `pretty` | `pretty`, `compact`, `json` |
//! | `SEMDUP_LOG` | filter | `info` | Log filter directive |
//! | `SEMDUP_LOG_FILE` | path | stderr | Append logs to a file |
//! | `SEMDUP_METRICS_ENABLED` | bool | `false` | Record and expose Prometheus metrics |

use crate::embedding::DEFAULT_DIMENSIONS;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default duplicate threshold.
pub const DEFAULT_THRESHOLD: f32 = 0.6;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8000;

/// Main configuration for semdup.
#[derive(Debug, Clone)]
pub struct SemdupConfig {
    /// Minimum similarity at which a text counts as a duplicate.
    pub threshold: f32,
    /// Base directory for file and `SQLite` stores.
    pub data_dir: PathBuf,
    /// Entry store configuration.
    pub storage: StorageConfig,
    /// Embedder configuration.
    pub embedding: EmbeddingConfig,
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Logging and metrics settings.
    pub observability: ObservabilitySettings,
}

/// Available entry store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    /// Process-local, lost on exit.
    Memory,
    /// JSON snapshot file rewritten on every insertion.
    #[default]
    File,
    /// `SQLite` database.
    Sqlite,
    /// PostgreSQL database (requires the `postgres` feature).
    Postgres,
}

impl StorageBackend {
    /// Parses a backend name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown names.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "in-memory" | "inmemory" => Ok(Self::Memory),
            "file" | "json" => Ok(Self::File),
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(Error::InvalidInput(format!(
                "unknown storage backend '{other}' (expected memory, file, sqlite or postgres)"
            ))),
        }
    }

    /// Returns the backend name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File => "file",
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        }
    }
}

/// Entry store configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Selected backend.
    pub backend: StorageBackend,
    /// Snapshot file or database path; defaults to a file under `data_dir`.
    pub path: Option<PathBuf>,
    /// PostgreSQL connection URL.
    pub connection_url: Option<String>,
    /// SQL table name.
    pub table: String,
    /// Maximum PostgreSQL pool size.
    pub pool_max_size: Option<usize>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: None,
            connection_url: None,
            table: "entries".to_string(),
            pool_max_size: None,
        }
    }
}

impl StorageConfig {
    /// Returns the path used by file-backed backends.
    #[must_use]
    pub fn resolved_path(&self, data_dir: &Path) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        match self.backend {
            StorageBackend::Sqlite => data_dir.join("entries.db"),
            _ => data_dir.join("entries.json"),
        }
    }
}

/// Available embedding providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingProvider {
    /// Deterministic feature hashing over content lemmas.
    #[default]
    Hashed,
    /// ONNX sentence embeddings (requires the `fastembed-embeddings` feature).
    FastEmbed,
}

impl EmbeddingProvider {
    /// Parses a provider name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown names.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hashed" | "hash" => Ok(Self::Hashed),
            "fastembed" | "fast-embed" | "minilm" => Ok(Self::FastEmbed),
            other => Err(Error::InvalidInput(format!(
                "unknown embedding provider '{other}' (expected hashed or fastembed)"
            ))),
        }
    }

    /// Returns the canonical provider name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hashed => "hashed",
            Self::FastEmbed => "fastembed",
        }
    }
}

/// Embedder configuration.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Selected provider.
    pub provider: EmbeddingProvider,
    /// Output dimensions. The fastembed provider only accepts its model's 384.
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Logging and metrics settings as written in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObservabilitySettings {
    /// Logging section.
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Metrics section.
    #[serde(default)]
    pub metrics: MetricsSettings,
}

/// Logging section of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// Output format: `pretty`, `compact` or `json`.
    pub format: Option<String>,
    /// Filter directive, e.g. `info` or `semdup=debug`.
    pub level: Option<String>,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

/// Metrics section of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsSettings {
    /// Whether metrics are recorded and exposed at `/metrics`.
    pub enabled: Option<bool>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Duplicate threshold.
    pub threshold: Option<f32>,
    /// Data directory.
    pub data_dir: Option<String>,
    /// Storage section.
    pub storage: Option<ConfigFileStorage>,
    /// Embedding section.
    pub embedding: Option<ConfigFileEmbedding>,
    /// Server section.
    pub server: Option<ConfigFileServer>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
    /// Metrics section.
    pub metrics: Option<MetricsSettings>,
}

/// Storage section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileStorage {
    /// Backend name.
    pub backend: Option<String>,
    /// Snapshot file or database path.
    pub path: Option<String>,
    /// PostgreSQL connection URL.
    pub connection_url: Option<String>,
    /// SQL table name.
    pub table: Option<String>,
    /// PostgreSQL pool size.
    pub pool_max_size: Option<usize>,
}

/// Embedding section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileEmbedding {
    /// Provider name.
    pub provider: Option<String>,
    /// Dimensions.
    pub dimensions: Option<usize>,
}

/// Server section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileServer {
    /// Bind host.
    pub host: Option<String>,
    /// Bind port.
    pub port: Option<u16>,
    /// Maximum request body size in bytes.
    pub max_body_bytes: Option<usize>,
}

impl Default for SemdupConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            data_dir: PathBuf::from(".semdup"),
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            server: ServerConfig::default(),
            observability: ObservabilitySettings::default(),
        }
    }
}

impl SemdupConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidInput(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the TOML is malformed or names an
    /// unknown backend or provider.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents)
            .map_err(|e| Error::InvalidInput(format!("cannot parse config file: {e}")))?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir (`~/.config/semdup/config.toml` on
    /// Linux). Returns default configuration if no file is found or it fails
    /// to parse.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(dirs) = directories::ProjectDirs::from("", "", "semdup") else {
            return Self::default();
        };

        let path = dirs.config_dir().join("config.toml");
        if path.exists() {
            match Self::load_from_file(&path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Ignoring config file"),
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `SemdupConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(threshold) = file.threshold {
            config.threshold = threshold;
        }
        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Some(storage) = file.storage {
            if let Some(backend) = storage.backend {
                config.storage.backend = StorageBackend::parse(&backend)?;
            }
            config.storage.path = storage.path.map(PathBuf::from);
            config.storage.connection_url = storage.connection_url;
            if let Some(table) = storage.table {
                config.storage.table = table;
            }
            config.storage.pool_max_size = storage.pool_max_size;
        }
        if let Some(embedding) = file.embedding {
            if let Some(provider) = embedding.provider {
                config.embedding.provider = EmbeddingProvider::parse(&provider)?;
            }
            if let Some(dimensions) = embedding.dimensions {
                config.embedding.dimensions = dimensions;
            }
        }
        if let Some(server) = file.server {
            if let Some(host) = server.host {
                config.server.host = host;
            }
            if let Some(port) = server.port {
                config.server.port = port;
            }
            if let Some(max_body_bytes) = server.max_body_bytes {
                config.server.max_body_bytes = max_body_bytes;
            }
        }
        if let Some(logging) = file.logging {
            config.observability.logging = logging;
        }
        if let Some(metrics) = file.metrics {
            config.observability.metrics = metrics;
        }

        Ok(config)
    }

    /// Applies `SEMDUP_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a variable holds an unparsable value.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// Blank values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a value cannot be parsed.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SEMDUP_THRESHOLD") {
            self.threshold = parse_value("SEMDUP_THRESHOLD", &v)?;
        }
        if let Some(v) = get("SEMDUP_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("SEMDUP_STORAGE_BACKEND") {
            self.storage.backend = StorageBackend::parse(&v)?;
        }
        if let Some(v) = get("SEMDUP_STORAGE_PATH") {
            self.storage.path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("SEMDUP_DATABASE_URL").or_else(|| get("DATABASE_URL")) {
            self.storage.connection_url = Some(v);
        }
        if let Some(v) = get("SEMDUP_STORAGE_TABLE") {
            self.storage.table = v;
        }
        if let Some(v) = get("SEMDUP_EMBEDDING_PROVIDER") {
            self.embedding.provider = EmbeddingProvider::parse(&v)?;
        }
        if let Some(v) = get("SEMDUP_EMBEDDING_DIMENSIONS") {
            self.embedding.dimensions = parse_value("SEMDUP_EMBEDDING_DIMENSIONS", &v)?;
        }
        if let Some(v) = get("SEMDUP_HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("SEMDUP_PORT") {
            self.server.port = parse_value("SEMDUP_PORT", &v)?;
        }
        if let Some(v) = get("SEMDUP_LOG_FORMAT") {
            self.observability.logging.format = Some(v);
        }
        if let Some(v) = get("SEMDUP_LOG_FILE") {
            self.observability.logging.file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("SEMDUP_METRICS_ENABLED") {
            self.observability.metrics.enabled = Some(parse_bool(&v));
        }

        Ok(())
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.threshold)?;
        if self.embedding.dimensions == 0 {
            return Err(Error::InvalidInput(
                "embedding dimensions must be greater than zero".to_string(),
            ));
        }
        if self.storage.backend == StorageBackend::Postgres
            && self.storage.connection_url.is_none()
        {
            return Err(Error::InvalidInput(
                "postgres backend requires SEMDUP_DATABASE_URL or storage.connection_url"
                    .to_string(),
            ));
        }
        if !is_valid_table_name(&self.storage.table) {
            return Err(Error::InvalidInput(format!(
                "invalid table name '{}'",
                self.storage.table
            )));
        }
        Ok(())
    }

    /// Returns the resolved store path.
    #[must_use]
    pub fn storage_path(&self) -> PathBuf {
        self.storage.resolved_path(&self.data_dir)
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Sets the storage backend.
    #[must_use]
    pub const fn with_backend(mut self, backend: StorageBackend) -> Self {
        self.storage.backend = backend;
        self
    }
}

/// Checks that a threshold is finite and within `[0, 1]`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] otherwise.
pub fn validate_threshold(threshold: f32) -> Result<()> {
    if threshold.is_finite() && (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "threshold must be within [0, 1], got {threshold}"
        )))
    }
}

/// Table names are interpolated into SQL, so only identifiers are allowed.
pub(crate) fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::InvalidInput(format!("{key}={value}: {e}")))
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
