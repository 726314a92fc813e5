//! Duplicate detector.
//!
//! Implements the check-then-insert cycle: embed the text, scan every stored
//! entry, report the first entry at or above the threshold, otherwise store
//! the text as a new entry.

use super::config::DetectionConfig;
use super::types::{DetectionResult, DuplicateMatch};
use crate::embedding::Embedder;
use crate::models::{Entry, current_timestamp};
use crate::similarity::{checked_cosine_similarity, cosine_similarity};
use crate::storage::EntryStore;
use crate::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::instrument;

/// Semantic duplicate detector over an [`EntryStore`].
///
/// Scan and insertion run under a per-detector write lock, so concurrent
/// submissions of the same text through one detector yield exactly one
/// `added` outcome. Separate processes sharing a database are not
/// coordinated.
pub struct DuplicateDetector {
    /// Embedding provider.
    embedder: Arc<dyn Embedder>,
    /// Entry store.
    store: Arc<dyn EntryStore>,
    /// Detection settings.
    config: DetectionConfig,
    /// Serializes scan-and-insert.
    write_lock: Mutex<()>,
}

impl DuplicateDetector {
    /// Creates a detector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the threshold is not within `[0, 1]`.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn EntryStore>,
        config: DetectionConfig,
    ) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            threshold = config.threshold,
            embedder = embedder.name(),
            backend = store.backend_name(),
            "Duplicate detector ready"
        );
        Ok(Self {
            embedder,
            store,
            config,
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the duplicate threshold.
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.config.threshold
    }

    /// Returns the entry store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn EntryStore> {
        &self.store
    }

    /// Returns the embedder.
    #[must_use]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Returns the number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns the store error if the count cannot be read.
    pub fn entry_count(&self) -> Result<usize> {
        self.store.count()
    }

    /// Reports the first stored duplicate of `text`, or stores `text`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProcessingError`] wrapping the embedding or store
    /// failure. No entry is inserted when an error is returned.
    #[instrument(
        skip(self, text),
        fields(
            operation = "add_or_find_duplicate",
            text_length = text.len(),
            outcome = tracing::field::Empty
        )
    )]
    pub fn add_or_find_duplicate(&self, text: &str) -> Result<DetectionResult> {
        let start = Instant::now();
        let result = self.add_or_find_inner(text);

        let outcome = match &result {
            Ok(r) => r.outcome(),
            Err(_) => "error",
        };
        tracing::Span::current().record("outcome", outcome);
        metrics::counter!("dedup_checks_total", "outcome" => outcome).increment(1);
        metrics::histogram!("dedup_check_duration_ms", "outcome" => outcome)
            .record(start.elapsed().as_secs_f64() * 1000.0);

        match &result {
            Ok(DetectionResult::Duplicate(m)) => {
                tracing::debug!(id = %m.id, score = m.score, "Duplicate found");
            },
            Ok(DetectionResult::Added { id, .. }) => {
                tracing::info!(%id, "Entry added");
            },
            Err(e) => tracing::warn!(error = %e, "Duplicate check failed"),
        }
        result
    }

    fn add_or_find_inner(&self, text: &str) -> Result<DetectionResult> {
        let vector = self.embed(text)?;

        let _guard = self.lock();
        let entries = self
            .store
            .load_all()
            .map_err(|e| Error::processing("scan", e))?;

        if let Some(found) = self.first_match(&vector, &entries) {
            return Ok(DetectionResult::Duplicate(found));
        }

        // Clamp to the latest stored timestamp so timestamps never decrease
        // in insertion order, even if the wall clock steps backwards.
        let latest = entries.iter().map(|e| e.timestamp).max();
        let timestamp = latest.map_or_else(current_timestamp, |l| current_timestamp().max(l));

        let entry = Entry::new(text, vector, timestamp);
        self.store
            .insert(&entry)
            .map_err(|e| Error::processing("insert", e))?;

        Ok(DetectionResult::Added {
            id: entry.id,
            text: entry.text,
            timestamp: entry.timestamp,
        })
    }

    /// Reports the first stored duplicate of `text` without inserting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProcessingError`] wrapping the embedding or store
    /// failure.
    #[instrument(skip(self, text), fields(operation = "find_duplicate", text_length = text.len()))]
    pub fn find_duplicate(&self, text: &str) -> Result<Option<DuplicateMatch>> {
        let vector = self.embed(text)?;
        let entries = self
            .store
            .load_all()
            .map_err(|e| Error::processing("scan", e))?;
        Ok(self.first_match(&vector, &entries))
    }

    /// Returns the cosine similarity between two texts.
    ///
    /// Texts without content embed to the zero vector and score `0.0`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProcessingError`] if either text cannot be embedded.
    #[instrument(
        skip(self, existing, user),
        fields(operation = "similarity", existing_length = existing.len(), user_length = user.len())
    )]
    pub fn similarity(&self, existing: &str, user: &str) -> Result<f32> {
        let a = self.embed(existing)?;
        let b = self.embed(user)?;
        let score = cosine_similarity(&a, &b);
        metrics::counter!("similarity_checks_total").increment(1);
        Ok(score)
    }

    /// Embeds `text` and checks the output dimension.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let vector = self
            .embedder
            .embed(text)
            .map_err(|e| Error::processing("embed", e))?;

        if vector.len() != self.embedder.dimensions() {
            return Err(Error::processing(
                "embed",
                Error::embedding(format!(
                    "embedder returned {} dimensions, expected {}",
                    vector.len(),
                    self.embedder.dimensions()
                )),
            ));
        }

        metrics::histogram!("embedding_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        Ok(vector)
    }

    /// Returns the first entry in scan order at or above the threshold.
    ///
    /// Degenerate comparisons (zero vectors, dimension mismatch) never match.
    fn first_match(&self, vector: &[f32], entries: &[Entry]) -> Option<DuplicateMatch> {
        entries.iter().find_map(|entry| {
            let score = checked_cosine_similarity(vector, &entry.vector)?;
            (score >= self.config.threshold).then(|| DuplicateMatch {
                id: entry.id.clone(),
                text: entry.text.clone(),
                timestamp: entry.timestamp,
                score,
            })
        })
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashedEmbedder;
    use crate::storage::InMemoryEntryStore;
    use std::collections::HashMap;

    /// Embedder returning fixed vectors per text.
    struct FixedEmbedder {
        vectors: HashMap<&'static str, Vec<f32>>,
        dimensions: usize,
    }

    impl FixedEmbedder {
        fn new(pairs: &[(&'static str, Vec<f32>)]) -> Self {
            let dimensions = pairs.first().map_or(2, |(_, v)| v.len());
            Self {
                vectors: pairs.iter().cloned().collect(),
                dimensions,
            }
        }
    }

    impl Embedder for FixedEmbedder {
        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn name(&self) -> &'static str {
            "fixed"
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.vectors
                .get(text)
                .cloned()
                .ok_or_else(|| Error::embedding(format!("no vector for '{text}'")))
        }
    }

    /// Store whose writes always fail.
    struct ReadOnlyStore;

    impl EntryStore for ReadOnlyStore {
        fn backend_name(&self) -> &'static str {
            "read-only"
        }

        fn load_all(&self) -> Result<Vec<Entry>> {
            Ok(Vec::new())
        }

        fn insert(&self, _entry: &Entry) -> Result<()> {
            Err(Error::store("insert", "read-only"))
        }

        fn insert_batch(&self, _entries: &[Entry]) -> Result<()> {
            Err(Error::store("insert_batch", "read-only"))
        }

        fn get(&self, _id: &crate::models::EntryId) -> Result<Option<Entry>> {
            Ok(None)
        }

        fn count(&self) -> Result<usize> {
            Ok(0)
        }
    }

    fn detector(embedder: impl Embedder + 'static, threshold: f32) -> DuplicateDetector {
        DuplicateDetector::new(
            Arc::new(embedder),
            Arc::new(InMemoryEntryStore::new()),
            DetectionConfig { threshold },
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_threshold() {
        let result = DuplicateDetector::new(
            Arc::new(HashedEmbedder::new()),
            Arc::new(InMemoryEntryStore::new()),
            DetectionConfig { threshold: 1.2 },
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_first_submission_is_added() {
        let d = detector(HashedEmbedder::new(), 0.6);
        let result = d.add_or_find_duplicate("Hello world").unwrap();

        assert!(matches!(result, DetectionResult::Added { ref text, .. } if text == "Hello world"));
        assert_eq!(d.entry_count().unwrap(), 1);
    }

    #[test]
    fn test_resubmission_is_duplicate() {
        let d = detector(HashedEmbedder::new(), 0.6);
        let added = d.add_or_find_duplicate("Rust borrow checker").unwrap();
        let again = d.add_or_find_duplicate("Rust borrow checker").unwrap();

        assert!(again.is_duplicate());
        assert_eq!(again.id(), added.id());
        assert!((again.score().unwrap() - 1.0).abs() < 1e-5);
        assert_eq!(d.entry_count().unwrap(), 1);
    }

    #[test]
    fn test_first_match_wins() {
        let embedder = FixedEmbedder::new(&[
            ("first", vec![1.0, 0.0]),
            ("second", vec![0.0, 1.0]),
            ("probe", vec![0.6, 0.8]),
        ]);
        let d = detector(embedder, 0.5);
        let first = d.add_or_find_duplicate("first").unwrap();
        d.add_or_find_duplicate("second").unwrap();

        // Scores 0.6 against "first" and 0.8 against "second"; scan order decides.
        let probe = d.add_or_find_duplicate("probe").unwrap();
        assert_eq!(probe.id(), first.id());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let embedder = FixedEmbedder::new(&[("a", vec![1.0, 0.0]), ("b", vec![1.0, 0.0])]);
        let d = detector(embedder, 1.0);
        d.add_or_find_duplicate("a").unwrap();
        assert!(d.add_or_find_duplicate("b").unwrap().is_duplicate());

        let embedder = FixedEmbedder::new(&[("a", vec![1.0, 0.0]), ("b", vec![0.0, 1.0])]);
        let d = detector(embedder, 0.0);
        d.add_or_find_duplicate("a").unwrap();
        assert!(d.add_or_find_duplicate("b").unwrap().is_duplicate());
    }

    #[test]
    fn test_zero_vectors_never_match() {
        let d = detector(HashedEmbedder::new(), 0.0);
        assert!(!d.add_or_find_duplicate("").unwrap().is_duplicate());
        assert!(!d.add_or_find_duplicate("").unwrap().is_duplicate());
        assert_eq!(d.entry_count().unwrap(), 2);
    }

    #[test]
    fn test_embedding_failure_is_processing_error() {
        let d = detector(FixedEmbedder::new(&[("known", vec![1.0])]), 0.6);
        let err = d.add_or_find_duplicate("unknown").unwrap_err();

        assert!(matches!(err, Error::ProcessingError { stage: "embed", .. }));
        assert!(matches!(err.root(), Error::EmbeddingFailure { .. }));
        assert_eq!(d.entry_count().unwrap(), 0);
    }

    #[test]
    fn test_wrong_dimension_is_embedding_failure() {
        let mut embedder = FixedEmbedder::new(&[("text", vec![1.0, 0.0])]);
        embedder.dimensions = 3;
        let d = detector(embedder, 0.6);

        let err = d.add_or_find_duplicate("text").unwrap_err();
        assert!(matches!(err.root(), Error::EmbeddingFailure { .. }));
    }

    #[test]
    fn test_store_failure_is_processing_error() {
        let d = DuplicateDetector::new(
            Arc::new(HashedEmbedder::new()),
            Arc::new(ReadOnlyStore),
            DetectionConfig::default(),
        )
        .unwrap();

        let err = d.add_or_find_duplicate("anything at all").unwrap_err();
        assert!(matches!(err, Error::ProcessingError { stage: "insert", .. }));
        assert!(matches!(err.root(), Error::StoreUnavailable { .. }));
    }

    #[test]
    fn test_find_duplicate_does_not_insert() {
        let d = detector(HashedEmbedder::new(), 0.6);
        assert!(d.find_duplicate("database migration").unwrap().is_none());
        assert_eq!(d.entry_count().unwrap(), 0);

        d.add_or_find_duplicate("database migration").unwrap();
        assert!(d.find_duplicate("database migration").unwrap().is_some());
        assert_eq!(d.entry_count().unwrap(), 1);
    }

    #[test]
    fn test_similarity_mode() {
        let d = detector(HashedEmbedder::new(), 0.6);
        let same = d.similarity("brown fox", "brown fox").unwrap();
        assert!((same - 1.0).abs() < 1e-5);
        assert!(d.similarity("", "brown fox").unwrap().abs() < f32::EPSILON);
        assert_eq!(d.entry_count().unwrap(), 0);
    }

    #[test]
    fn test_timestamps_non_decreasing() {
        let d = detector(HashedEmbedder::new(), 0.99);
        for text in ["alpha beta", "gamma delta", "epsilon zeta", "kappa lambda"] {
            d.add_or_find_duplicate(text).unwrap();
        }
        let entries = d.store().load_all().unwrap();
        assert!(entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}
