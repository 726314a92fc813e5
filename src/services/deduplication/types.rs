//! Detection result types.

use crate::models::{EntryId, format_timestamp};
use crate::similarity::round_to;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// The stored entry that a submitted text duplicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateMatch {
    /// Id of the matched entry.
    pub id: EntryId,
    /// Text of the matched entry.
    pub text: String,
    /// Creation time of the matched entry.
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Cosine similarity between the submitted text and the match.
    ///
    /// Serialized as a string with two decimals, e.g. `"0.82"`.
    #[serde(serialize_with = "serialize_score")]
    pub score: f32,
}

/// Outcome of [`super::DuplicateDetector::add_or_find_duplicate`].
///
/// Serializes with a `status` tag:
///
/// ```json
/// {"status": "duplicate", "id": "…", "text": "…", "timestamp": "…", "score": "0.82"}
/// {"status": "added", "id": "…", "text": "…", "timestamp": "…"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DetectionResult {
    /// An existing entry met the threshold; nothing was inserted.
    Duplicate(DuplicateMatch),
    /// No entry met the threshold; the text was stored as a new entry.
    Added {
        /// Id of the new entry.
        id: EntryId,
        /// The submitted text.
        text: String,
        /// Creation time of the new entry.
        #[serde(serialize_with = "serialize_timestamp")]
        timestamp: DateTime<Utc>,
    },
}

impl DetectionResult {
    /// Returns `true` for the duplicate outcome.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }

    /// Returns the id of the matched or newly added entry.
    #[must_use]
    pub const fn id(&self) -> &EntryId {
        match self {
            Self::Duplicate(m) => &m.id,
            Self::Added { id, .. } => id,
        }
    }

    /// Returns the text of the matched or newly added entry.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Duplicate(m) => &m.text,
            Self::Added { text, .. } => text,
        }
    }

    /// Returns the similarity score for duplicates.
    #[must_use]
    pub const fn score(&self) -> Option<f32> {
        match self {
            Self::Duplicate(m) => Some(m.score),
            Self::Added { .. } => None,
        }
    }

    /// Returns the outcome label used in logs and metrics.
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::Duplicate(_) => "duplicate",
            Self::Added { .. } => "added",
        }
    }
}

/// Formats a score with two decimals.
#[must_use]
pub fn format_score(score: f32) -> String {
    format!("{:.2}", round_to(score, 2))
}

fn serialize_score<S: Serializer>(score: &f32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_score(*score))
}

fn serialize_timestamp<S: Serializer>(
    timestamp: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(timestamp))
}
