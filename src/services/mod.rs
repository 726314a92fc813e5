//! Business logic services.
//!
//! Services wire the configured embedder and entry store together and expose
//! the detection operations.
//!
//! ```text
//! build_detector(config)
//!   ├── build_embedder(config.embedding) → Arc<dyn Embedder>
//!   ├── open_store(config.storage)       → Arc<dyn EntryStore>
//!   └── DuplicateDetector::new(…)
//! ```

pub mod deduplication;

pub use deduplication::{DetectionConfig, DetectionResult, DuplicateDetector, DuplicateMatch};

use crate::config::SemdupConfig;
use crate::embedding::build_embedder;
use crate::storage::open_store;
use crate::Result;

/// Builds a detector from configuration.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the embedder or
/// store cannot be created.
pub fn build_detector(config: &SemdupConfig) -> Result<DuplicateDetector> {
    config.validate()?;
    let embedder = build_embedder(&config.embedding)?;
    let store = open_store(&config.storage, &config.data_dir)?;
    DuplicateDetector::new(embedder, store, DetectionConfig::from(config))
}
