//! Detection configuration.

use crate::config::{DEFAULT_THRESHOLD, SemdupConfig, validate_threshold};
use crate::Result;

/// Configuration for a [`super::DuplicateDetector`].
///
/// # Example
///
/// ```rust
/// use semdup::DetectionConfig;
///
/// let config = DetectionConfig::default();
/// assert!((config.threshold - 0.6).abs() < f32::EPSILON);
/// assert!(DetectionConfig::with_threshold(1.5).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionConfig {
    /// Minimum cosine similarity (inclusive) for a text to count as a duplicate.
    pub threshold: f32,
}

impl DetectionConfig {
    /// Creates a configuration with the given threshold.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] unless the threshold is finite
    /// and within `[0, 1]`.
    pub fn with_threshold(threshold: f32) -> Result<Self> {
        let config = Self { threshold };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] for an out-of-range threshold.
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.threshold)
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl From<&SemdupConfig> for DetectionConfig {
    fn from(config: &SemdupConfig) -> Self {
        Self {
            threshold: config.threshold,
        }
    }
}
