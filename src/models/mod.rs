//! Data models for semdup.
//!
//! This module contains the core data structures shared by the engine, the
//! entry stores and the API façade.

mod entry;

pub use entry::{Entry, EntryId, current_timestamp, format_timestamp, parse_timestamp};
