//! Deterministic hashed embedder.

use super::{DEFAULT_DIMENSIONS, Embedder, LemmaFilter};
use crate::Result;
use sha2::{Digest, Sha256};

/// Weight of lemma bigrams relative to single lemmas.
const BIGRAM_WEIGHT: f32 = 0.5;

/// Embedder using signed feature hashing over content lemmas.
///
/// Each lemma is hashed with SHA-256 into a bucket and a sign; adjacent lemma
/// pairs contribute at half weight so word order carries a little signal.
/// The result is L2-normalized. Hashing is stable across builds and
/// platforms, so persisted vectors stay comparable after upgrades.
///
/// Texts sharing lemmas are similar; synonyms are not. Enable the
/// `fastembed-embeddings` feature for model-based semantic similarity.
pub struct HashedEmbedder {
    /// Embedding dimensions.
    dimensions: usize,
    /// Lemma extraction applied before hashing.
    filter: LemmaFilter,
}

impl HashedEmbedder {
    /// Creates a hashed embedder with the default dimensions.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_dimensions(DEFAULT_DIMENSIONS)
    }

    /// Creates a hashed embedder with custom dimensions.
    #[must_use]
    pub const fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions,
            filter: LemmaFilter::new(),
        }
    }

    /// Adds one hashed feature to the embedding.
    fn add_feature(embedding: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = u64::from_le_bytes(bucket_bytes);
        let idx = (bucket % embedding.len() as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        embedding[idx] += sign * weight;
    }

    /// Normalizes an embedding vector in-place.
    fn normalize_embedding(embedding: &mut [f32]) {
        let norm_sq: f32 = embedding.iter().map(|x| x * x).sum();
        if norm_sq <= 0.0 {
            return;
        }
        let inv_norm = norm_sq.sqrt().recip();
        for v in embedding.iter_mut() {
            *v *= inv_norm;
        }
    }
}

impl Default for HashedEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HashedEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &'static str {
        "hashed"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return Ok(embedding);
        }

        let lemmas = self.filter.lemmas(text);
        if lemmas.is_empty() {
            tracing::debug!(text_length = text.len(), "No content lemmas, using zero vector");
            return Ok(embedding);
        }

        for lemma in &lemmas {
            Self::add_feature(&mut embedding, lemma, 1.0);
        }
        for pair in lemmas.windows(2) {
            Self::add_feature(&mut embedding, &format!("{} {}", pair[0], pair[1]), BIGRAM_WEIGHT);
        }

        Self::normalize_embedding(&mut embedding);
        Ok(embedding)
    }
}
