//! Binary entry point for semdup.
//!
//! This binary provides the CLI and HTTP server for semantic duplicate
//! detection.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use semdup::SemdupConfig;
use semdup::observability::{self, ObservabilityHandle};
use std::path::PathBuf;
use std::process::ExitCode;

/// Semdup - semantic near-duplicate detection for text.
#[derive(Parser)]
#[command(name = "semdup")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "SEMDUP_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Bind host.
        #[arg(long)]
        host: Option<String>,

        /// Bind port.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check a text and store it unless it duplicates an existing entry.
    Check {
        /// The text to check.
        text: String,

        /// Only report a duplicate; never store the text.
        #[arg(long)]
        dry_run: bool,
    },

    /// Score two texts without touching the store.
    Similarity {
        /// Reference text.
        existing: String,

        /// Text to compare.
        user: String,
    },

    /// List stored entries in scan order.
    List {
        /// Maximum number of entries to show.
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Export all entries to a snapshot file.
    Export {
        /// Destination path.
        path: PathBuf,
    },

    /// Import entries from a snapshot file.
    Import {
        /// Source path.
        path: PathBuf,
    },

    /// Show store status.
    Status,

    /// Manage configuration.
    Config {
        /// Show current configuration.
        #[arg(long)]
        show: bool,
    },
}

fn main() -> ExitCode {
    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    let observability = match observability::init_from_config(&config.observability, cli.verbose)
    {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli.command, config, &observability) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(
    command: Commands,
    config: SemdupConfig,
    observability: &ObservabilityHandle,
) -> anyhow::Result<()> {
    match command {
        Commands::Serve { host, port } => commands::cmd_serve(config, host, port, observability),
        Commands::Check { text, dry_run } => commands::cmd_check(&config, &text, dry_run),
        Commands::Similarity { existing, user } => {
            commands::cmd_similarity(&config, &existing, &user)
        },
        Commands::List { limit } => commands::cmd_list(&config, limit),
        Commands::Export { path } => commands::cmd_export(&config, &path),
        Commands::Import { path } => commands::cmd_import(&config, &path),
        Commands::Status => commands::cmd_status(&config),
        Commands::Config { show } => commands::cmd_config(&config, show),
    }
}

/// Loads configuration from an explicit file or the default location, then
/// applies environment overrides.
fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<SemdupConfig> {
    let mut config = match path {
        Some(path) => SemdupConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SemdupConfig::load_default(),
    };
    config.apply_env().context("applying environment overrides")?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from(["semdup", "serve", "--host", "127.0.0.1", "-p", "9000"])
            .unwrap();
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host.as_deref(), Some("127.0.0.1"));
                assert_eq!(port, Some(9000));
            },
            _ => unreachable!("expected serve"),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["semdup", "status", "--verbose", "--config", "a.toml"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("a.toml")));
    }
}
