//! Common display utilities for CLI commands.

use std::io::{self, Write};

use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use ripple::{ChangeType, RiskLevel};
use serde::Serialize;

const MAX_DISPLAY_ITEMS: usize = 10;

/// How command results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Colored text for people
    Text,
    /// Pretty-printed JSON for programs
    Json,
}

/// Change type for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeArg {
    /// Edit the file in place
    Modify,
    /// Remove the file
    Delete,
    /// Rename or relocate the file
    Move,
}

impl From<ChangeArg> for ChangeType {
    fn from(arg: ChangeArg) -> Self {
        match arg {
            ChangeArg::Modify => Self::Modify,
            ChangeArg::Delete => Self::Delete,
            ChangeArg::Move => Self::Move,
        }
    }
}

/// Print a JSON-formatted result for any serializable value.
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(handle, "{json}")
}

/// Risk level colored by severity.
pub fn colorize_risk(level: RiskLevel) -> ColoredString {
    let text = level.as_str().to_uppercase();
    match level {
        RiskLevel::Low => text.green(),
        RiskLevel::Medium => text.yellow(),
        RiskLevel::High => text.red(),
        RiskLevel::Critical => text.red().bold(),
    }
}

/// Display a list of files with optional truncation.
///
/// Shows up to `MAX_DISPLAY_ITEMS` files with bullet points. If there are more,
/// shows "... and N more". If empty, shows the provided `empty_message`.
pub fn print_files(files: &[String], empty_message: &str) {
    if files.is_empty() {
        println!("    {}", empty_message.dimmed());
        return;
    }

    for file in files.iter().take(MAX_DISPLAY_ITEMS) {
        println!("    {} {file}", "•".dimmed());
    }

    if files.len() > MAX_DISPLAY_ITEMS {
        println!(
            "    {} ... and {} more",
            "•".dimmed(),
            files.len() - MAX_DISPLAY_ITEMS
        );
    }
}

/// Display a dependency chain as `a → b → c`.
pub fn format_chain(chain: &[String]) -> String {
    chain.join(" → ")
}
