//! Analyze command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use ripple::{Ripple, SessionOptions};

use super::display::{OutputMode, print_files, print_json};

/// Run the analyze command.
pub fn run(workspace: &Path, url: Option<String>, output: OutputMode) -> Result<()> {
    let options = SessionOptions {
        url,
        ..SessionOptions::default()
    };
    let ripple = Ripple::open_with(workspace, options)
        .with_context(|| format!("cannot open ripple session in {}", workspace.display()))?;

    if output == OutputMode::Text {
        println!(
            "{} {}",
            "Analyzing".cyan().bold(),
            ripple.workspace_root().display()
        );
    }
    let report = ripple.analyze()?;

    if output == OutputMode::Json {
        print_json(&report)?;
        return Ok(());
    }

    let commit = report
        .commit
        .as_ref()
        .map_or_else(|| "no commit".to_string(), |c| c.short().to_string());
    let state = if report.dirty { " (dirty)" } else { "" };
    println!();
    println!(
        "{}: {} at {}{}",
        "Snapshot".white().bold(),
        report.snapshot_id,
        commit,
        state.yellow()
    );
    if report.cached {
        println!("  {}", "reused snapshot of this commit".dimmed());
    }

    println!();
    println!("{}:", "Graph".white().bold());
    println!("  Files:         {}", report.total_files);
    println!("  Dependencies:  {}", report.metrics.total_dependencies);
    println!("  Avg coupling:  {:.2}", report.metrics.avg_coupling);
    let cycles = report.metrics.cycle_count;
    if cycles == 0 {
        println!("  Cycles:        {}", "0".green());
    } else {
        println!("  Cycles:        {}", cycles.to_string().red().bold());
    }
    if let Some(build) = &report.build {
        println!(
            "  Imports:       {} resolved, {} external",
            build.resolved_imports, build.unresolved_imports
        );
    }

    if !report.cached && report.commit.is_some() && !report.dirty {
        println!();
        println!(
            "{}: {} new, {} unchanged",
            "Versions".white().bold(),
            report.versions.new_versions.to_string().green(),
            report.versions.unchanged
        );
    }

    let detected: Vec<String> = report
        .patterns
        .iter()
        .filter(|p| p.detected)
        .map(|p| format!("{} ({:.0}%)", p.pattern, p.confidence * 100.0))
        .collect();
    println!();
    println!("{}:", "Patterns".white().bold());
    print_files(&detected, "no architecture patterns detected");

    println!();
    println!("{}:", "Architecture".white().bold());
    for line in report.architecture.lines() {
        println!("  {line}");
    }

    if !report.warnings.is_empty() {
        println!();
        println!(
            "{}: {} files skipped",
            "Warnings".yellow().bold(),
            report.warnings.len()
        );
        let skipped: Vec<String> = report.warnings.iter().map(ToString::to_string).collect();
        print_files(&skipped, "");
    }

    Ok(())
}
