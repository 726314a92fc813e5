//! JSON snapshot format.
//!
//! A snapshot is one JSON object mapping entry id to its record, in scan
//! order:
//!
//! ```json
//! {
//!   "a1b2c3d4": {
//!     "text": "The quick brown fox",
//!     "vector": [0.12, -0.03],
//!     "timestamp": "2024-05-01T12:00:00.000000Z"
//!   }
//! }
//! ```
//!
//! Used by [`super::FileEntryStore`] and by every backend's export/import.

use crate::models::{Entry, EntryId, format_timestamp, parse_timestamp};
use crate::{Error, Result};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Record stored under each id.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredEntry {
    text: String,
    vector: Vec<f32>,
    timestamp: String,
}

/// Ordered collection of entries with the snapshot wire format.
#[derive(Debug, Default, PartialEq)]
pub struct Snapshot(pub Vec<Entry>);

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        SnapshotRef(&self.0).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SnapshotVisitor;

        impl<'de> Visitor<'de> for SnapshotVisitor {
            type Value = Snapshot;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping entry ids to entries")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                let mut seen = HashSet::new();

                while let Some((id, stored)) = access.next_entry::<String, StoredEntry>()? {
                    if !seen.insert(id.clone()) {
                        return Err(de::Error::custom(format!("duplicate entry id '{id}'")));
                    }
                    let timestamp =
                        parse_timestamp(&stored.timestamp).map_err(de::Error::custom)?;
                    entries.push(Entry {
                        id: EntryId::new(id),
                        text: stored.text,
                        vector: stored.vector,
                        timestamp,
                    });
                }

                Ok(Snapshot(entries))
            }
        }

        deserializer.deserialize_map(SnapshotVisitor)
    }
}

/// Reads a snapshot file.
///
/// # Errors
///
/// Returns [`Error::StoreUnavailable`] if the file cannot be read and
/// [`Error::InvalidInput`] if it is not a valid snapshot.
pub fn read_snapshot(path: &Path) -> Result<Vec<Entry>> {
    let contents = fs::read_to_string(path)
        .map_err(|e| Error::store("read_snapshot", format!("{}: {e}", path.display())))?;
    parse_snapshot(&contents)
        .map_err(|e| Error::InvalidInput(format!("invalid snapshot {}: {e}", path.display())))
}

/// Parses snapshot JSON text.
///
/// # Errors
///
/// Returns the JSON error if the text is not a valid snapshot.
pub fn parse_snapshot(contents: &str) -> std::result::Result<Vec<Entry>, serde_json::Error> {
    serde_json::from_str::<Snapshot>(contents).map(|snapshot| snapshot.0)
}

/// Writes entries as a snapshot file, replacing it atomically.
///
/// The snapshot is written to a sibling temporary file, synced, then renamed
/// over `path`, so readers never observe a partial snapshot.
///
/// # Errors
///
/// Returns [`Error::StoreUnavailable`] if any filesystem step fails.
pub fn write_snapshot(path: &Path, entries: &[Entry]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| Error::store("create_snapshot_dir", format!("{}: {e}", parent.display())))?;
    }

    let tmp_path = temp_path(path);
    let result = write_to(&tmp_path, entries).and_then(|()| {
        fs::rename(&tmp_path, path)
            .map_err(|e| Error::store("rename_snapshot", format!("{}: {e}", path.display())))
    });

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_to(path: &Path, entries: &[Entry]) -> Result<()> {
    let file = fs::File::create(path)
        .map_err(|e| Error::store("create_snapshot", format!("{}: {e}", path.display())))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, &SnapshotRef(entries))
        .map_err(|e| Error::store("encode_snapshot", e))?;
    writer
        .flush()
        .map_err(|e| Error::store("write_snapshot", e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| Error::store("sync_snapshot", e))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Borrowed serializer matching [`Snapshot`]'s format.
struct SnapshotRef<'a>(&'a [Entry]);

#[derive(Serialize)]
struct StoredEntryRef<'a> {
    text: &'a str,
    vector: &'a [f32],
    timestamp: String,
}

impl Serialize for SnapshotRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in self.0 {
            map.serialize_entry(
                entry.id.as_str(),
                &StoredEntryRef {
                    text: &entry.text,
                    vector: &entry.vector,
                    timestamp: format_timestamp(&entry.timestamp),
                },
            )?;
        }
        map.end()
    }
}
