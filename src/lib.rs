//! # Semdup
//!
//! Semantic near-duplicate detection for incoming text.
//!
//! Every submitted text is converted into a fixed-length embedding and compared
//! against all previously stored entries with cosine similarity. Texts at or
//! above the configured threshold are reported as duplicates of the first
//! matching entry; everything else is stored as a new entry.
//!
//! ## Features
//!
//! - Pluggable embedders (deterministic hashed embedder, `FastEmbed` ONNX models)
//! - Pluggable entry stores (in-memory, JSON snapshot file, `SQLite`, PostgreSQL)
//! - Atomic check-then-insert per detector instance
//! - HTTP façade (axum) and CLI tooling
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use semdup::embedding::HashedEmbedder;
//! use semdup::services::{DetectionConfig, DetectionResult, DuplicateDetector};
//! use semdup::storage::InMemoryEntryStore;
//!
//! let detector = DuplicateDetector::new(
//!     Arc::new(HashedEmbedder::new()),
//!     Arc::new(InMemoryEntryStore::new()),
//!     DetectionConfig::default(),
//! )?;
//!
//! let first = detector.add_or_find_duplicate("Rust ownership rules")?;
//! assert!(matches!(first, DetectionResult::Added { .. }));
//!
//! let second = detector.add_or_find_duplicate("Rust ownership rules")?;
//! assert!(second.is_duplicate());
//! # Ok::<(), semdup::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
#[cfg(feature = "http")]
pub mod api;
pub mod config;
pub mod embedding;
pub mod models;
pub mod observability;
pub mod services;
pub mod similarity;
pub mod storage;

// Re-exports for convenience
pub use config::SemdupConfig;
pub use embedding::Embedder;
pub use models::{Entry, EntryId};
pub use services::{DetectionConfig, DetectionResult, DuplicateDetector, DuplicateMatch};
pub use similarity::cosine_similarity;
pub use storage::EntryStore;

/// Error type for semdup operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `EmbeddingFailure` | Model cannot be loaded, inference fails, wrong output dimension |
/// | `StoreUnavailable` | Database or filesystem I/O fails, stored data cannot be decoded |
/// | `ProcessingError` | A detection call failed; wraps the underlying error |
/// | `InvalidInput` | Bad configuration, id collisions, dimension mismatch, malformed snapshots |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The embedding provider could not process the input.
    #[error("embedding failed: {cause}")]
    EmbeddingFailure {
        /// The underlying cause.
        cause: String,
    },

    /// The persistence medium is unreachable or returned unusable data.
    ///
    /// Raised when:
    /// - `SQLite`/PostgreSQL connections or queries fail
    /// - Snapshot files cannot be read, written or renamed
    /// - Stored vectors or timestamps cannot be decoded
    #[error("store unavailable during '{operation}': {cause}")]
    StoreUnavailable {
        /// The store operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A detection call failed at the named stage.
    ///
    /// The caller must not assume that any insertion happened.
    #[error("processing failed at {stage}: {source}")]
    ProcessingError {
        /// The engine stage that failed (`embed`, `scan`, `insert`).
        stage: &'static str,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },

    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - The similarity threshold is outside `[0, 1]`
    /// - An entry id already exists in the store
    /// - A vector dimension does not match the stored entries
    /// - A snapshot file is malformed
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Wraps an error as a processing failure at the given engine stage.
    ///
    /// Errors that are already processing failures are returned unchanged.
    #[must_use]
    pub fn processing(stage: &'static str, source: Self) -> Self {
        match source {
            Self::ProcessingError { .. } => source,
            other => Self::ProcessingError {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, unwrapping processing failures.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::ProcessingError { source, .. } => source.root(),
            other => other,
        }
    }

    /// Shorthand for a store failure.
    pub(crate) fn store(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }

    /// Shorthand for an embedding failure.
    pub(crate) fn embedding(cause: impl std::fmt::Display) -> Self {
        Self::EmbeddingFailure {
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for semdup operations.
pub type Result<T> = std::result::Result<T, Error>;
