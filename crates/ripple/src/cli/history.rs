//! History command implementation.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use super::display::{OutputMode, print_json};

/// Run the history command.
pub fn run(workspace: &Path, file: &str, output: OutputMode) -> Result<()> {
    let ripple = super::open(workspace)?;
    let history = ripple.get_file_history(file)?;

    if output == OutputMode::Json {
        return Ok(print_json(&history)?);
    }

    if history.is_empty() {
        println!("{}", format!("No recorded versions of {file}.").dimmed());
        return Ok(());
    }

    println!(
        "{} of {} ({} versions):",
        "History".white().bold(),
        file.cyan().bold(),
        history.len()
    );
    for entry in &history {
        let marker = if entry.previous_hash.is_none() {
            "first".dimmed()
        } else {
            "changed".yellow()
        };
        println!(
            "  {} {} {} {} {}",
            entry.commit.short().yellow(),
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.hash.as_str().get(..12).unwrap_or(entry.hash.as_str()),
            entry.author.dimmed(),
            marker
        );
    }
    Ok(())
}
