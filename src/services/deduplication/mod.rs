//! Semantic duplicate detection.
//!
//! A [`DuplicateDetector`] owns an injected [`crate::Embedder`] and
//! [`crate::EntryStore`]:
//!
//! ```text
//! text ──▶ Embedder ──▶ vector ──▶ full scan of EntryStore ──▶ first score >= threshold?
//!                                                          │ yes: Duplicate
//!                                                          └ no:  insert, Added
//! ```
//!
//! The scan is linear in the number of stored entries.

mod config;
mod detector;
mod types;

pub use config::DetectionConfig;
pub use detector::DuplicateDetector;
pub use types::{DetectionResult, DuplicateMatch, format_score};
