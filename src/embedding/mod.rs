//! Embedding generation.
//!
//! Every embedder first reduces text to its content-bearing lemmas with
//! [`LemmaFilter`], then vectorizes them. Texts without any content lemma
//! embed to the all-zero vector instead of failing.

// Allow cast precision loss for hash-based embedding calculations.
#![allow(clippy::cast_precision_loss)]
// Allow cast possible truncation for hash index calculations on 32-bit platforms.
#![allow(clippy::cast_possible_truncation)]

#[cfg(feature = "fastembed-embeddings")]
mod fastembed;
mod hashed;
mod lemmas;

#[cfg(feature = "fastembed-embeddings")]
pub use fastembed::FastEmbedEmbedder;
pub use hashed::HashedEmbedder;
pub use lemmas::LemmaFilter;

use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::Result;
use std::sync::Arc;

/// Default embedding dimensions (all-MiniLM-L6-v2).
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Trait for embedding generators.
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Returns a short provider name for logs and health output.
    fn name(&self) -> &'static str;

    /// Generates an embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::EmbeddingFailure`] if embedding generation fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple texts.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Builds the embedder selected by configuration.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidInput`] if the configuration is unusable.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    if config.dimensions == 0 {
        return Err(crate::Error::InvalidInput(
            "embedding dimensions must be greater than zero".to_string(),
        ));
    }
    if config.provider == EmbeddingProvider::FastEmbed && config.dimensions != DEFAULT_DIMENSIONS {
        return Err(crate::Error::InvalidInput(format!(
            "embedding provider 'fastembed' produces {DEFAULT_DIMENSIONS} dimensions, configured {}",
            config.dimensions
        )));
    }

    let embedder: Arc<dyn Embedder> = match config.provider {
        EmbeddingProvider::Hashed => Arc::new(HashedEmbedder::with_dimensions(config.dimensions)),
        #[cfg(feature = "fastembed-embeddings")]
        EmbeddingProvider::FastEmbed => Arc::new(FastEmbedEmbedder::new()),
        #[cfg(not(feature = "fastembed-embeddings"))]
        EmbeddingProvider::FastEmbed => {
            return Err(crate::Error::InvalidInput(
                "embedding provider 'fastembed' requires the fastembed-embeddings feature"
                    .to_string(),
            ));
        },
    };

    tracing::debug!(
        provider = embedder.name(),
        dimensions = embedder.dimensions(),
        "Embedder ready"
    );
    Ok(embedder)
}
