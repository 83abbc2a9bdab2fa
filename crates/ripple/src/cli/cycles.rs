//! Cycles command implementation.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use super::display::{OutputMode, print_json};

/// Run the cycles command.
pub fn run(workspace: &Path, output: OutputMode) -> Result<()> {
    let ripple = super::open(workspace)?;
    let metrics = ripple.metrics()?;

    if output == OutputMode::Json {
        return Ok(print_json(&json!({
            "cycle_count": metrics.cycle_count,
            "cycles": metrics.cycles,
        }))?);
    }

    if metrics.cycles.is_empty() {
        println!("{}", "No circular dependencies detected.".green());
        return Ok(());
    }

    println!(
        "Found {} circular dependencies:",
        metrics.cycle_count.to_string().red().bold()
    );
    println!();

    for (i, cycle) in metrics.cycles.iter().enumerate() {
        println!("  {} {}:", "Cycle".yellow().bold(), i + 1);
        let mut path = cycle.join(" → ");
        if let Some(first) = cycle.first() {
            path.push_str(" → ");
            path.push_str(first);
        }
        println!("    {}", path.dimmed());
        println!();
    }

    if metrics.cycle_count > metrics.cycles.len() {
        println!(
            "  {}",
            format!(
                "... {} more not listed",
                metrics.cycle_count - metrics.cycles.len()
            )
            .dimmed()
        );
    }
    Ok(())
}
