//! Reading and parsing a working tree for one analysis pass.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Ripple::analyze                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Phase 1 (Sequential):  snapshot lookup under the key lock  │
//! │  Phase 2 (Parallel):    rayon read + fingerprint + parse    │
//! │  Phase 3 (Sequential):  version tracking, file by file      │
//! │  Phase 4 (Sequential):  graph build, persist, metrics       │
//! │  Phase 5 (Sequential):  summary, search index, finalize     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Phase 2 lives here. Files that cannot be read or decoded become
//! warnings; the pass continues without them.

use std::path::Path;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::RippleConfig;
use crate::error::{AnalysisWarning, WarningKind};
use crate::graph::{BuildStats, GraphMetrics};
use crate::parser::SourceParser;
use crate::patterns::PatternMatch;
use crate::scan::{SourceFile, discover};
use crate::snapshot::FileEntry;
use crate::types::{CommitHash, ContentHash, ParsedFile, RepoId, SnapshotId};
use crate::versioning::fingerprint_bytes;

/// Parsed facts and fingerprints of every readable file, in path order.
#[derive(Debug, Default)]
pub(crate) struct Collected {
    pub parsed: Vec<ParsedFile>,
    pub files: Vec<FileEntry>,
    pub warnings: Vec<AnalysisWarning>,
}

/// Discover, read, fingerprint and parse the files under `root`.
pub(crate) fn collect(root: &Path, config: &RippleConfig, parser: &dyn SourceParser) -> Collected {
    let discovery = discover(root, config);

    let results: Vec<Result<(ParsedFile, ContentHash), AnalysisWarning>> = discovery
        .files
        .par_iter()
        .map(|file| read_and_parse(file, parser))
        .collect();

    let mut collected = Collected {
        warnings: discovery.warnings,
        ..Collected::default()
    };
    for result in results {
        match result {
            Ok((parsed, hash)) => {
                collected.files.push(FileEntry {
                    path: parsed.path.clone(),
                    hash,
                });
                collected.parsed.push(parsed);
            }
            Err(warning) => {
                warn!(path = %warning.path.display(), kind = %warning.kind, "skipping file");
                collected.warnings.push(warning);
            }
        }
    }
    debug!(
        parsed = collected.parsed.len(),
        warnings = collected.warnings.len(),
        "collected source files"
    );
    collected
}

fn read_and_parse(
    file: &SourceFile,
    parser: &dyn SourceParser,
) -> Result<(ParsedFile, ContentHash), AnalysisWarning> {
    let bytes = std::fs::read(&file.abs_path).map_err(|e| AnalysisWarning {
        path: file.abs_path.clone(),
        kind: WarningKind::IoError,
        message: format!("cannot read file: {e}"),
    })?;
    let hash = fingerprint_bytes(&bytes);
    let source = std::str::from_utf8(&bytes).map_err(|e| AnalysisWarning {
        path: file.abs_path.clone(),
        kind: WarningKind::EncodingError,
        message: format!("not valid UTF-8: {e}"),
    })?;
    Ok((parser.parse(&file.path, file.language, source), hash))
}

/// Version records written during a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VersionCounts {
    /// Files whose (hash, commit) was new
    pub new_versions: usize,
    /// Files already recorded at this commit with this hash
    pub unchanged: usize,
}

/// Outcome of [`Ripple::analyze`](crate::Ripple::analyze).
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Repository analyzed
    pub repo_id: RepoId,
    /// Snapshot created or reused
    pub snapshot_id: SnapshotId,
    /// Commit checked out, `None` without version control
    pub commit: Option<CommitHash>,
    /// Working tree had uncommitted changes
    pub dirty: bool,
    /// A complete snapshot of this commit was reused
    pub cached: bool,
    /// Files in the graph
    pub total_files: usize,
    /// Graph metrics
    pub metrics: GraphMetrics,
    /// Architecture pattern heuristics
    pub patterns: Vec<PatternMatch>,
    /// Architecture summary
    pub architecture: String,
    /// Version records written
    pub versions: VersionCounts,
    /// Build counters, `None` when the persisted graph was reused as-is
    pub build: Option<BuildStats>,
    /// Files skipped during the pass
    pub warnings: Vec<AnalysisWarning>,
}
