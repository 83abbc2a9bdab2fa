//! Snapshots command implementation.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use super::display::{OutputMode, print_json};

/// Run the snapshots command.
pub fn run(workspace: &Path, delete: Option<&str>, output: OutputMode) -> Result<()> {
    let ripple = super::open(workspace)?;

    if let Some(reference) = delete {
        let id = ripple.delete_snapshot(reference)?;
        if output == OutputMode::Json {
            return Ok(print_json(&json!({ "deleted": id }))?);
        }
        println!("{} snapshot {id}", "Deleted".green());
        return Ok(());
    }

    let snapshots = ripple.get_snapshot_list()?;
    if output == OutputMode::Json {
        return Ok(print_json(&snapshots)?);
    }

    if snapshots.is_empty() {
        println!("{}", "No snapshots. Run `ripple analyze` first.".dimmed());
        return Ok(());
    }

    println!("{} ({}):", "Snapshots".white().bold(), snapshots.len());
    for info in &snapshots {
        let commit = info
            .commit
            .as_ref()
            .map_or_else(|| "--------".to_string(), |c| c.short().to_string());
        let mut flags = Vec::new();
        if info.dirty {
            flags.push("dirty".yellow().to_string());
        }
        if !info.complete {
            flags.push("incomplete".red().to_string());
        }
        println!(
            "  {} {} {} {:>5} files {:>6} deps {:>5.2} coupling {} cycles {}",
            info.id.as_str().cyan(),
            commit.yellow(),
            info.created_at.format("%Y-%m-%d %H:%M"),
            info.total_files,
            info.total_dependencies,
            info.avg_coupling,
            info.cycle_count,
            flags.join(" ")
        );
    }
    Ok(())
}
