//! Repos command implementation.

use std::path::Path;

use anyhow::{Result, bail};
use colored::Colorize;
use ripple::RepoId;
use serde_json::json;

use super::display::{OutputMode, print_json};

/// Run the repos command.
pub fn run(workspace: &Path, delete: Option<&str>, output: OutputMode) -> Result<()> {
    let ripple = super::open(workspace)?;

    if let Some(raw) = delete {
        let repo_id = RepoId::new(raw);
        if !ripple.delete_repository(&repo_id)? {
            bail!("repository '{raw}' is not registered");
        }
        if output == OutputMode::Json {
            return Ok(print_json(&json!({ "deleted": repo_id }))?);
        }
        println!("{} repository {repo_id}", "Deleted".green());
        return Ok(());
    }

    let repositories = ripple.list_repositories()?;
    if output == OutputMode::Json {
        return Ok(print_json(&repositories)?);
    }

    if repositories.is_empty() {
        println!("{}", "No repositories registered.".dimmed());
        return Ok(());
    }
    for repo in &repositories {
        let marker = if &repo.repo_id == ripple.repo_id() {
            "*".green().bold()
        } else {
            " ".normal()
        };
        let commit = repo
            .current_commit
            .as_ref()
            .map_or_else(|| "--------".to_string(), |c| c.short().to_string());
        println!(
            "{marker} {} {} {}",
            repo.repo_id.as_str().cyan(),
            commit.yellow(),
            repo.url.as_deref().unwrap_or(&repo.local_path)
        );
    }
    Ok(())
}
