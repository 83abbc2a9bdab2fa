//! Import-history command implementation.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use super::display::{OutputMode, print_json};

/// Run the import-history command.
pub fn run(workspace: &Path, max: Option<usize>, output: OutputMode) -> Result<()> {
    let ripple = super::open(workspace)?;
    let import = ripple.import_history(max)?;

    if output == OutputMode::Json {
        return Ok(print_json(&import)?);
    }

    println!(
        "{} {} commits ({} new), {} new versions",
        "Imported".green().bold(),
        import.commits,
        import.new_commits,
        import.new_versions
    );
    Ok(())
}
