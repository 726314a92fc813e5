//! CLI command handlers.
//!
//! Each `cmd_*` function implements one subcommand of the `semdup` binary.

mod config;
mod core;
mod io;
mod serve;

pub use config::cmd_config;
pub use core::{cmd_check, cmd_list, cmd_similarity, cmd_status};
pub use io::{cmd_export, cmd_import};
pub use serve::cmd_serve;

/// Truncates text for single-line display.
fn truncate(text: &str, max_chars: usize) -> String {
    let single_line = text.replace(['\n', '\r'], " ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let head: String = single_line.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{head}...")
}
