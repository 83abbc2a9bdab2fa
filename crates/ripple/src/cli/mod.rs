//! CLI command implementations.

pub mod display;

pub mod analyze;
pub mod callers;
pub mod compare;
pub mod confidence;
pub mod contributors;
pub mod cycles;
pub mod history;
pub mod impact;
pub mod import_history;
pub mod integrity;
pub mod repos;
pub mod snapshots;
pub mod status;

use std::path::Path;

use anyhow::{Context, Result};
use ripple::Ripple;

/// Open a session for `workspace`, naming it in the error.
fn open(workspace: &Path) -> Result<Ripple> {
    Ripple::open(workspace)
        .with_context(|| format!("cannot open ripple session in {}", workspace.display()))
}
