//! Confidence command implementation.

use std::path::Path;

use anyhow::Result;
use colored::{ColoredString, Colorize};
use ripple::HIGH_CONFIDENCE;

use super::display::{OutputMode, print_json};

/// Run the confidence command.
pub fn run(workspace: &Path, output: OutputMode) -> Result<()> {
    let ripple = super::open(workspace)?;
    let report = ripple.confidence_report()?;

    if output == OutputMode::Json {
        return Ok(print_json(&report)?);
    }

    if report.claims.is_empty() {
        println!("{}", report.summary.dimmed());
        return Ok(());
    }

    for claim in &report.claims {
        println!("{} {}", colorize_confidence(claim.confidence), claim.claim.bold());
        println!("    {}", claim.reasoning);
        println!("    {} {}", "fails when:".dimmed(), claim.failure_scenario.dimmed());
        if !claim.evidence.is_empty() {
            println!("    {} {}", "evidence:".dimmed(), claim.evidence.join(", "));
        }
        println!();
    }
    if report.total_claims > report.claims.len() {
        println!(
            "{}",
            format!("... {} more claims not listed", report.total_claims - report.claims.len())
                .dimmed()
        );
    }
    println!("{}", report.summary);
    Ok(())
}

fn colorize_confidence(confidence: f64) -> ColoredString {
    let text = format!("[{confidence:.2}]");
    if confidence >= HIGH_CONFIDENCE {
        text.green()
    } else if confidence >= 0.5 {
        text.yellow()
    } else {
        text.red()
    }
}
