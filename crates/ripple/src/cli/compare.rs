//! Compare command implementation.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use ripple::SnapshotSide;

use super::display::{OutputMode, colorize_risk, print_files, print_json};

/// Run the compare command.
pub fn run(workspace: &Path, before: &str, after: &str, output: OutputMode) -> Result<()> {
    let ripple = super::open(workspace)?;
    let diff = ripple.compare_snapshots(before, after)?;

    if output == OutputMode::Json {
        return Ok(print_json(&diff)?);
    }

    println!(
        "{} {} → {}",
        "Comparing".white().bold(),
        describe(&diff.before).cyan(),
        describe(&diff.after).cyan()
    );
    println!();
    println!("  Risk: {}", colorize_risk(diff.risk_level));
    println!("  {}", diff.summary.dimmed());
    println!();

    println!(
        "  {:<14} {:>8} {:>8} {:>8}",
        "", "before", "after", "delta"
    );
    let (b, a, d) = (&diff.before.metrics, &diff.after.metrics, &diff.deltas);
    println!("  {:<14} {:>8} {:>8} {:>+8}", "files", b.files, a.files, d.files);
    println!(
        "  {:<14} {:>8} {:>8} {:>+8}",
        "dependencies", b.dependencies, a.dependencies, d.dependencies
    );
    println!(
        "  {:<14} {:>8.2} {:>8.2} {:>+8.2}",
        "avg coupling", b.avg_coupling, a.avg_coupling, d.avg_coupling
    );
    println!("  {:<14} {:>8} {:>8} {:>+8}", "cycles", b.cycles, a.cycles, d.cycles);
    println!();

    println!("  {} ({}):", "Added".green().bold(), diff.added.len());
    print_files(&diff.added, "(none)");
    println!("  {} ({}):", "Removed".red().bold(), diff.removed.len());
    print_files(&diff.removed, "(none)");
    println!("  {} ({}):", "Modified".yellow().bold(), diff.modified.len());
    print_files(&diff.modified, "(none)");
    println!("  {} unchanged", diff.unchanged.to_string().dimmed());

    if !diff.pattern_changes.is_empty() {
        println!();
        println!("  {}:", "Pattern changes".white().bold());
        let changes: Vec<String> = diff.pattern_changes.iter().map(ToString::to_string).collect();
        print_files(&changes, "");
    }
    if !diff.risk_areas.is_empty() {
        println!();
        println!("  {}:", "Risk areas".white().bold());
        print_files(&diff.risk_areas, "");
    }
    Ok(())
}

fn describe(side: &SnapshotSide) -> String {
    match &side.commit {
        Some(commit) => format!("{} ({})", side.id, commit.short()),
        None => side.id.to_string(),
    }
}
