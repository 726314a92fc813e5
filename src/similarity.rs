//! Vector similarity.
//!
//! Cosine similarity with an explicit fallback for degenerate vectors, plus
//! the fixed-precision rounding used when scores leave the process.

/// Computes cosine similarity between two vectors.
///
/// # Returns
///
/// Cosine similarity in range [-1.0, 1.0], or 0.0 if the vectors have
/// different lengths, are empty, or either has zero magnitude.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    checked_cosine_similarity(a, b).unwrap_or(0.0)
}

/// Computes cosine similarity, returning `None` when it is undefined.
///
/// Undefined means different lengths, empty input, or a zero-magnitude
/// vector. The result is clamped to [-1.0, 1.0] to absorb rounding overshoot.
#[must_use]
pub fn checked_cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    #[allow(clippy::cast_possible_truncation)]
    let similarity = (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32;
    Some(similarity.clamp(-1.0, 1.0))
}

/// Returns the Euclidean norm of a vector.
#[must_use]
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Rounds a score to a fixed number of decimals.
#[must_use]
pub fn round_to(value: f32, decimals: u32) -> f64 {
    let factor = 10f64.powi(i32::try_from(decimals).unwrap_or(i32::MAX));
    (f64::from(value) * factor).round() / factor
}
