//! Config command handler.
//!
//! Contains the implementation of the `config` CLI command and
//! display helpers for configuration output.

use semdup::SemdupConfig;
use semdup::config::StorageBackend;

/// Config command.
pub fn cmd_config(config: &SemdupConfig, show: bool) -> anyhow::Result<()> {
    if !show {
        println!("Use --show to display the current configuration.");
        return Ok(());
    }

    println!("Current Configuration");
    println!("=====================");
    println!();
    println!("Threshold: {}", config.threshold);
    println!("Data Directory: {}", config.data_dir.display());
    println!();

    println!("Storage:");
    println!("  Backend: {}", config.storage.backend.as_str());
    match config.storage.backend {
        StorageBackend::Memory => {},
        StorageBackend::Postgres => {
            println!(
                "  Connection: {}",
                config
                    .storage
                    .connection_url
                    .as_deref()
                    .map_or_else(|| "(not set)".to_string(), redact_url)
            );
            println!("  Table: {}", config.storage.table);
        },
        StorageBackend::File | StorageBackend::Sqlite => {
            println!("  Path: {}", config.storage_path().display());
        },
    }
    println!();

    println!("Embedding:");
    println!("  Provider: {}", config.embedding.provider.as_str());
    println!("  Dimensions: {}", config.embedding.dimensions);
    println!();

    println!("Server:");
    println!("  Address: {}:{}", config.server.host, config.server.port);
    println!("  Max Body: {} bytes", config.server.max_body_bytes);
    println!();

    println!("Observability:");
    display_logging_config(config);
    println!(
        "  Metrics: {}",
        if config.observability.metrics.enabled.unwrap_or(false) {
            "enabled"
        } else {
            "disabled"
        }
    );

    Ok(())
}

fn display_logging_config(config: &SemdupConfig) {
    let logging = &config.observability.logging;
    println!(
        "  Log Format: {}",
        logging.format.as_deref().unwrap_or("pretty")
    );
    println!("  Log Level: {}", logging.level.as_deref().unwrap_or("info"));
    println!(
        "  Log File: {}",
        logging
            .file
            .as_ref()
            .map_or_else(|| "(stderr)".to_string(), |p| p.display().to_string())
    );
}

/// Hides the password in a connection URL.
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((userinfo, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    let user = userinfo.split_once(':').map_or(userinfo, |(user, _)| user);
    format!("{scheme}://{user}:***@{host}")
}
