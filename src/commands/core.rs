//! Core command handlers.
//!
//! Contains `check`, `similarity`, `list` and `status`.

use super::truncate;
use anyhow::Context;
use semdup::SemdupConfig;
use semdup::models::format_timestamp;
use semdup::services::build_detector;
use semdup::similarity::round_to;
use semdup::storage::open_store;

/// Check command.
pub fn cmd_check(config: &SemdupConfig, text: &str, dry_run: bool) -> anyhow::Result<()> {
    let detector = build_detector(config)?;

    if dry_run {
        match detector.find_duplicate(text)? {
            Some(found) => println!("{}", serde_json::to_string_pretty(&found)?),
            None => println!("No duplicate found (threshold {})", detector.threshold()),
        }
        return Ok(());
    }

    let result = detector.add_or_find_duplicate(text)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Similarity command.
pub fn cmd_similarity(config: &SemdupConfig, existing: &str, user: &str) -> anyhow::Result<()> {
    let detector = build_detector(config)?;
    let score = detector.similarity(existing, user)?;
    println!(
        "{}",
        serde_json::json!({ "similarity_score": round_to(score, 4) })
    );
    Ok(())
}

/// List command.
pub fn cmd_list(config: &SemdupConfig, limit: Option<usize>) -> anyhow::Result<()> {
    let store = open_store(&config.storage, &config.data_dir)?;
    let entries = store.load_all().context("loading entries")?;

    if entries.is_empty() {
        println!("No entries stored.");
        return Ok(());
    }

    let shown = limit.unwrap_or(entries.len()).min(entries.len());
    for entry in entries.iter().take(shown) {
        println!(
            "{}  {}  {}",
            entry.id,
            format_timestamp(&entry.timestamp),
            truncate(&entry.text, 60)
        );
    }
    if shown < entries.len() {
        println!("... {} more", entries.len() - shown);
    }
    Ok(())
}

/// Status command.
pub fn cmd_status(config: &SemdupConfig) -> anyhow::Result<()> {
    let store = open_store(&config.storage, &config.data_dir)?;
    let count = store.count().context("counting entries")?;

    println!("Semdup Status");
    println!("=============");
    println!();
    println!("Backend: {}", store.backend_name());
    match config.storage.backend {
        semdup::config::StorageBackend::Postgres => {
            println!("Table: {}", config.storage.table);
        },
        semdup::config::StorageBackend::Memory => {},
        _ => println!("Path: {}", config.storage_path().display()),
    }
    println!("Entries: {count}");
    println!("Threshold: {}", config.threshold);
    println!(
        "Embedding: {} ({} dimensions)",
        config.embedding.provider.as_str(),
        config.embedding.dimensions
    );
    Ok(())
}
