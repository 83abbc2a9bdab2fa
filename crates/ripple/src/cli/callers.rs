//! Callers command implementation.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use ripple::{CallChain, FunctionCallers};

use super::display::{OutputMode, print_json};

/// Run the callers command.
pub fn run(
    workspace: &Path,
    function: &str,
    transitive: bool,
    depth: u32,
    output: OutputMode,
) -> Result<()> {
    let ripple = super::open(workspace)?;

    if transitive {
        let chains = ripple.function_call_chain(function, depth)?;
        if output == OutputMode::Json {
            return Ok(print_json(&chains)?);
        }
        print_chains(function, &chains);
    } else {
        let callers = ripple.function_callers(function)?;
        if output == OutputMode::Json {
            return Ok(print_json(&callers)?);
        }
        print_direct(function, &callers);
    }
    Ok(())
}

fn print_direct(function: &str, declarations: &[FunctionCallers]) {
    if declarations.iter().all(FunctionCallers::is_empty) {
        println!("No callers found for \"{}\"", function.cyan());
        return;
    }

    for callers in declarations.iter().filter(|c| !c.is_empty()) {
        let target = &callers.function;
        let line = target.line.map(|l| format!(":{l}")).unwrap_or_default();
        println!(
            "Callers of \"{}\" ({}{line}):",
            target.name.cyan().bold(),
            target.file
        );
        for file in &callers.file_callers {
            println!("    {} {file}", "•".dimmed());
        }
        for caller in &callers.function_callers {
            println!(
                "    {} {}::{}",
                "•".dimmed(),
                caller.file,
                caller.name.yellow()
            );
        }

        let files: BTreeSet<&str> = callers
            .file_callers
            .iter()
            .map(String::as_str)
            .chain(callers.function_callers.iter().map(|c| c.file.as_str()))
            .collect();
        println!();
        println!(
            "{}: {} file callers, {} function callers across {} files",
            "Total".dimmed(),
            callers.file_callers.len().to_string().green(),
            callers.function_callers.len().to_string().green(),
            files.len()
        );
        println!();
    }
}

fn print_chains(function: &str, chains: &[CallChain]) {
    if chains.iter().all(|c| c.callers.is_empty()) {
        println!("No callers found for \"{}\"", function.cyan());
        return;
    }

    for chain in chains.iter().filter(|c| !c.callers.is_empty()) {
        println!(
            "Callers of \"{}\" ({}), up to {} hops:",
            chain.function.name.cyan().bold(),
            chain.function.file,
            chain.depth
        );
        for link in &chain.callers {
            let caller = match &link.function {
                Some(name) => format!("{}::{}", link.file, name.yellow()),
                None => link.file.clone(),
            };
            println!("    {} {caller} {}", "•".dimmed(), format!("({} hops)", link.hops).dimmed());
        }

        let direct = chain.callers.iter().filter(|l| l.hops == 1).count();
        println!();
        println!(
            "{}: {} direct, {} transitive",
            "Total".dimmed(),
            direct.to_string().green(),
            (chain.callers.len() - direct).to_string().yellow()
        );
        println!();
    }
}
