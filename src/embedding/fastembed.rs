//! FastEmbed-based embedder.
//!
//! Provides semantic embeddings using the all-MiniLM-L6-v2 model via fastembed-rs.
//! Only compiled with the `fastembed-embeddings` feature.

use super::{DEFAULT_DIMENSIONS, Embedder, LemmaFilter};
use crate::{Error, Result};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::OnceLock;
use std::time::Instant;

/// Thread-safe singleton for the embedding model.
/// Uses `OnceLock` for lazy initialization on first use.
static EMBEDDING_MODEL: OnceLock<fastembed::TextEmbedding> = OnceLock::new();

/// `FastEmbed` embedder using all-MiniLM-L6-v2.
///
/// The model is lazily loaded on first embed call to preserve cold start time.
/// Text is reduced to its content lemmas before it reaches the model.
pub struct FastEmbedEmbedder {
    /// Model name for logging/debugging.
    model_name: &'static str,
    /// Lemma extraction applied before inference.
    filter: LemmaFilter,
}

impl FastEmbedEmbedder {
    /// Embedding dimensions for all-MiniLM-L6-v2.
    pub const DEFAULT_DIMENSIONS: usize = DEFAULT_DIMENSIONS;

    /// Creates a new `FastEmbed` embedder.
    ///
    /// Note: Model is lazily loaded on first `embed()` call.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            model_name: "all-MiniLM-L6-v2",
            filter: LemmaFilter::new(),
        }
    }

    /// Gets or initializes the embedding model (thread-safe).
    ///
    /// The first call blocks while the ONNX model is loaded (and downloaded if
    /// not cached). Warm up with `FastEmbedEmbedder::new().embed("warmup")`
    /// when first-request latency matters.
    fn get_model() -> Result<&'static fastembed::TextEmbedding> {
        if let Some(model) = EMBEDDING_MODEL.get() {
            return Ok(model);
        }

        tracing::info!("Loading embedding model (first use)...");
        let start = Instant::now();

        let options = fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(false);

        let model = fastembed::TextEmbedding::try_new(options)
            .map_err(|e| Error::embedding(format!("load_embedding_model: {e}")))?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            model = "all-MiniLM-L6-v2",
            "Embedding model loaded successfully"
        );

        // Another thread may have won the race; either model is fine.
        let _ = EMBEDDING_MODEL.set(model);
        EMBEDDING_MODEL
            .get()
            .ok_or_else(|| Error::embedding("model initialization race condition"))
    }

    /// Returns the model name.
    #[must_use]
    pub const fn model_name(&self) -> &'static str {
        self.model_name
    }
}

impl Default for FastEmbedEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for FastEmbedEmbedder {
    fn dimensions(&self) -> usize {
        Self::DEFAULT_DIMENSIONS
    }

    fn name(&self) -> &'static str {
        "fastembed"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let cleaned = self.filter.clean(text);
        if cleaned.is_empty() {
            return Ok(vec![0.0; Self::DEFAULT_DIMENSIONS]);
        }

        let model = Self::get_model()?;

        // ONNX runtime can panic on malformed inputs or internal errors.
        let result = catch_unwind(AssertUnwindSafe(|| model.embed(vec![cleaned], None)));

        let embeddings = result
            .map_err(|panic_info| {
                let panic_msg = panic_info
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic_info.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(
                    panic_message = %panic_msg,
                    "ONNX runtime panicked during embedding"
                );
                Error::embedding(format!("ONNX runtime panic: {panic_msg}"))
            })?
            .map_err(Error::embedding)?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("no embedding returned from model"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_creation() {
        let embedder = FastEmbedEmbedder::new();
        assert_eq!(embedder.dimensions(), FastEmbedEmbedder::DEFAULT_DIMENSIONS);
        assert_eq!(embedder.model_name(), "all-MiniLM-L6-v2");
    }

    #[test]
    fn test_contentless_text_skips_model() {
        let embedder = FastEmbedEmbedder::new();
        let v = embedder.embed("  the  ").unwrap();
        assert_eq!(v.len(), FastEmbedEmbedder::DEFAULT_DIMENSIONS);
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
