//! Status command implementation.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use super::display::{OutputMode, print_json};

/// Run the status command.
pub fn run(workspace: &Path, output: OutputMode) -> Result<()> {
    let ripple = super::open(workspace)?;
    let status = ripple.status()?;

    if output == OutputMode::Json {
        return Ok(print_json(&status)?);
    }

    println!("{}: {}", "Repository".white().bold(), ripple.repo_id().as_str().cyan());
    if let Some(path) = ripple.db_path() {
        println!("  Database:       {}", path.display().to_string().dimmed());
    }
    match &status.repository {
        Some(repo) => {
            if let Some(url) = &repo.url {
                println!("  Remote:         {url}");
            }
            let commit = repo
                .current_commit
                .as_ref()
                .map_or_else(|| "none".to_string(), |c| c.short().to_string());
            println!("  Graph commit:   {commit}");
        }
        None => println!("  {}", "not analyzed yet".dimmed()),
    }
    println!("  Tracked files:  {}", status.tracked_files);
    println!("  Versions:       {}", status.versions);
    println!("  Commits:        {}", status.commits);
    println!("  Snapshots:      {}", status.snapshots);
    if let Some(latest) = &status.latest_snapshot {
        println!(
            "  Latest:         {} ({} files, {})",
            latest.id,
            latest.total_files,
            latest.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}
