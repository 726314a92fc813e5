//! Snapshot export and import handlers.

use anyhow::Context;
use semdup::SemdupConfig;
use semdup::storage::open_store;
use std::path::Path;

/// Export command.
pub fn cmd_export(config: &SemdupConfig, path: &Path) -> anyhow::Result<()> {
    let store = open_store(&config.storage, &config.data_dir)?;
    let count = store
        .export_all(path)
        .with_context(|| format!("exporting to {}", path.display()))?;
    println!("Exported {count} entries to {}", path.display());
    Ok(())
}

/// Import command.
///
/// Import is all-or-nothing: a snapshot with any colliding id or mismatched
/// dimension leaves the store unchanged.
pub fn cmd_import(config: &SemdupConfig, path: &Path) -> anyhow::Result<()> {
    let store = open_store(&config.storage, &config.data_dir)?;
    let count = store
        .import_all(path)
        .with_context(|| format!("importing from {}", path.display()))?;
    println!(
        "Imported {count} entries into {} store",
        store.backend_name()
    );
    Ok(())
}
