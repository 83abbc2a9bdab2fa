//! Contributors command implementation.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use super::display::{OutputMode, print_json};

/// Run the contributors command.
pub fn run(workspace: &Path, output: OutputMode) -> Result<()> {
    let ripple = super::open(workspace)?;
    let contributions = ripple.contributions()?;

    if output == OutputMode::Json {
        return Ok(print_json(&contributions)?);
    }

    if contributions.is_empty() {
        println!("{}", "No recorded versions yet.".dimmed());
        return Ok(());
    }
    println!("{}:", "Contributors".white().bold());
    for c in &contributions {
        println!(
            "  {:<24} {:>6} versions {:>5} files  {} → {}",
            c.author,
            c.versions,
            c.files,
            c.first_seen.format("%Y-%m-%d"),
            c.last_seen.format("%Y-%m-%d")
        );
    }
    Ok(())
}
