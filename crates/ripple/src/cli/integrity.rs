//! Integrity command implementation.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use ripple::IntegrityStatus;

use super::display::{OutputMode, print_json};

/// Run the integrity command.
pub fn run(workspace: &Path, file: &str, output: OutputMode) -> Result<()> {
    let ripple = super::open(workspace)?;
    let status = ripple.check_integrity(file)?;

    if output == OutputMode::Json {
        return Ok(print_json(&status)?);
    }

    match status {
        IntegrityStatus::NotTracked => {
            println!("{}: {file} has no recorded version", "untracked".dimmed());
        }
        IntegrityStatus::Intact { hash } => {
            println!(
                "{}: {file} matches {}",
                "intact".green().bold(),
                hash.as_str().dimmed()
            );
        }
        IntegrityStatus::Tampered { message, .. } => {
            println!("{}: {message}", "modified".red().bold());
        }
    }
    Ok(())
}
