//! Entry types and identifiers.

use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a stored entry.
///
/// Generated once at insertion time and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Creates an entry ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier (UUID v4, simple hex form).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EntryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A stored unit of deduplicated text.
///
/// Entries are immutable once written: stores only ever append them.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Unique identifier.
    pub id: EntryId,
    /// The original (non-lemmatized) input text.
    pub text: String,
    /// Embedding of `text`, dimension fixed by the embedder.
    pub vector: Vec<f32>,
    /// Creation instant, microsecond precision.
    pub timestamp: DateTime<Utc>,
}

impl Entry {
    /// Creates a new entry with a generated id.
    #[must_use]
    pub fn new(text: impl Into<String>, vector: Vec<f32>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: EntryId::generate(),
            text: text.into(),
            vector,
            timestamp: timestamp.trunc_subsecs(6),
        }
    }

    /// Returns the vector dimension.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

/// Returns the current UTC instant truncated to microseconds.
///
/// Every persistence format stores microseconds, so truncating at creation
/// keeps timestamps identical across export/import round trips.
#[must_use]
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Formats a timestamp as RFC 3339 with microseconds and a `Z` suffix.
///
/// The fixed width keeps lexicographic and chronological order identical.
#[must_use]
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses an RFC 3339 timestamp.
///
/// # Errors
///
/// Returns [`Error::StoreUnavailable`] if the value is not valid RFC 3339,
/// since timestamps are only parsed when reading persisted data.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::store("decode_timestamp", format!("{value}: {e}")))
}
