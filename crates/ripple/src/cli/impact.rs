//! Impact command implementation.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use ripple::{ChangeType, ImpactResult, Ripple};
use serde::Serialize;

use super::display::{OutputMode, colorize_risk, format_chain, print_files, print_json};

/// Chains shown per dependent with `--why`.
const MAX_CHAINS: usize = 3;

#[derive(Serialize)]
struct Why {
    dependent: String,
    chains: Vec<Vec<String>>,
}

#[derive(Serialize)]
struct ImpactOutput {
    #[serde(flatten)]
    impact: ImpactResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    why: Vec<Why>,
}

/// Run the impact command.
pub fn run(
    workspace: &Path,
    file: &str,
    change: ChangeType,
    explain: bool,
    why: bool,
    output: OutputMode,
) -> Result<()> {
    let ripple = super::open(workspace)?;

    let (impact, explanation) = if explain {
        let explained = ripple.explain_impact(file, change)?;
        (explained.impact, Some(explained.explanation.text))
    } else {
        (ripple.get_impact(file, change)?, None)
    };
    let why = if why {
        chains(&ripple, &impact)?
    } else {
        Vec::new()
    };

    if output == OutputMode::Json {
        return Ok(print_json(&ImpactOutput {
            impact,
            explanation,
            why,
        })?);
    }

    println!(
        "{} of {} ({}):",
        "Impact analysis".white(),
        impact.file.cyan().bold(),
        change.as_str()
    );
    println!();
    println!(
        "  Risk: {} ({}/100)",
        colorize_risk(impact.risk_level),
        impact.risk_score
    );
    println!();

    let direct = impact.direct_dependents.len();
    let count = if direct > 0 {
        direct.to_string().green()
    } else {
        direct.to_string().dimmed()
    };
    println!(
        "  {} ({count} files):",
        "Direct dependents".white().bold()
    );
    print_files(&impact.direct_dependents, "(none)");
    println!();

    let indirect = impact.indirect_dependents.len();
    let count = if indirect > 0 {
        indirect.to_string().yellow()
    } else {
        indirect.to_string().dimmed()
    };
    println!(
        "  {} ({count} files):",
        "Indirect dependents".white().bold()
    );
    print_files(&impact.indirect_dependents, "(none)");
    println!();

    let functions = &impact.functions_affected;
    println!(
        "  {} ({} functions, {} external callers)",
        "Functions".white().bold(),
        functions.total_functions,
        functions.callers.len()
    );
    let called: Vec<String> = functions
        .functions
        .iter()
        .filter(|f| f.caller_count > 0)
        .map(|f| format!("{} ← {}", f.name, f.callers.join(", ")))
        .collect();
    print_files(&called, "(no cross-file callers)");

    if !why.is_empty() {
        println!();
        println!("  {}:", "Why".white().bold());
        for entry in &why {
            for chain in &entry.chains {
                println!("    {} {}", "•".dimmed(), format_chain(chain).dimmed());
            }
        }
    }

    if let Some(text) = explanation {
        println!();
        println!("  {}:", "Explanation".white().bold());
        for line in text.lines() {
            println!("    {line}");
        }
    }

    Ok(())
}

/// Dependency chains from every dependent to the changed file.
fn chains(ripple: &Ripple, impact: &ImpactResult) -> Result<Vec<Why>> {
    let mut why = Vec::new();
    for dependent in impact
        .direct_dependents
        .iter()
        .chain(&impact.indirect_dependents)
    {
        let mut chains = ripple.dependency_paths(dependent, &impact.file)?;
        chains.truncate(MAX_CHAINS);
        why.push(Why {
            dependent: dependent.clone(),
            chains,
        });
    }
    Ok(why)
}
