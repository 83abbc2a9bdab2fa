//! Source control access.
//!
//! Ripple needs five things from version control: the current commit, whether
//! the working tree has uncommitted changes, the remote URL, the commit history
//! with per-commit changed files, and file content at a commit. A directory
//! that is not under version control is not an error: every query degrades to
//! "nothing known" and analysis proceeds uncached.

use std::path::Path;
use std::process::{Command, Output};

use tracing::{debug, warn};

use crate::db::datetime_from_secs;
use crate::error::{Error, Result};
use crate::types::{Commit, CommitHash};

/// A commit together with the files it changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// The commit
    pub commit: Commit,
    /// Repository-relative paths changed by the commit
    pub changed_files: Vec<String>,
}

/// Read-only view of a repository's version control.
pub trait SourceControl: Send + Sync {
    /// Commit checked out in `root`, `None` when `root` is not under version control.
    fn head(&self, root: &Path) -> Result<Option<Commit>>;

    /// Whether the working tree differs from `head`.
    fn is_dirty(&self, root: &Path) -> Result<bool>;

    /// Remote URL, when one is configured.
    fn remote_url(&self, root: &Path) -> Result<Option<String>>;

    /// Up to `max` commits reachable from `head`, newest first.
    fn history(&self, root: &Path, max: usize) -> Result<Vec<CommitInfo>>;

    /// Content of `path` at `commit`, `None` if the file does not exist there.
    fn file_at(&self, root: &Path, commit: &CommitHash, path: &str) -> Result<Option<Vec<u8>>>;
}

/// Source control for directories that are not tracked.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSourceControl;

impl SourceControl for NoSourceControl {
    fn head(&self, _root: &Path) -> Result<Option<Commit>> {
        Ok(None)
    }

    fn is_dirty(&self, _root: &Path) -> Result<bool> {
        Ok(false)
    }

    fn remote_url(&self, _root: &Path) -> Result<Option<String>> {
        Ok(None)
    }

    fn history(&self, _root: &Path, _max: usize) -> Result<Vec<CommitInfo>> {
        Ok(Vec::new())
    }

    fn file_at(&self, _root: &Path, _commit: &CommitHash, _path: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// Field and record separators used in `git log` formats.
const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

/// Git accessed through the `git` executable.
///
/// A missing executable or a directory outside any work tree yields the same
/// answers as [`NoSourceControl`].
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
        }
    }
}

impl GitCli {
    /// Use the `git` found on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific git executable.
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run git in `root`. `Ok(None)` means git is missing or exited non-zero.
    fn run(&self, root: &Path, args: &[&str]) -> Result<Option<Output>> {
        let output = match Command::new(&self.program)
            .arg("-C")
            .arg(root)
            .args(args)
            .output()
        {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(program = %self.program, "git executable not found");
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::SourceControl(format!(
                    "failed to run {}: {e}",
                    self.program
                )));
            }
        };
        if output.status.success() {
            Ok(Some(output))
        } else {
            debug!(
                args = ?args,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "git command failed"
            );
            Ok(None)
        }
    }

    fn run_text(&self, root: &Path, args: &[&str]) -> Result<Option<String>> {
        Ok(self
            .run(root, args)?
            .map(|output| String::from_utf8_lossy(&output.stdout).into_owned()))
    }
}

impl SourceControl for GitCli {
    fn head(&self, root: &Path) -> Result<Option<Commit>> {
        let format = format!("--format=%H{FIELD_SEP}%an{FIELD_SEP}%at{FIELD_SEP}%s");
        let Some(text) = self.run_text(root, &["log", "-1", &format])? else {
            return Ok(None);
        };
        Ok(parse_commit_line(text.trim()))
    }

    fn is_dirty(&self, root: &Path) -> Result<bool> {
        match self.run_text(root, &["status", "--porcelain"])? {
            Some(text) => Ok(!text.trim().is_empty()),
            None => Err(Error::SourceControl(format!(
                "cannot read working tree status in {}",
                root.display()
            ))),
        }
    }

    fn remote_url(&self, root: &Path) -> Result<Option<String>> {
        Ok(self
            .run_text(root, &["config", "--get", "remote.origin.url"])?
            .map(|text| text.trim().to_string())
            .filter(|url| !url.is_empty()))
    }

    fn history(&self, root: &Path, max: usize) -> Result<Vec<CommitInfo>> {
        let limit = format!("-n{max}");
        let format =
            format!("--format={RECORD_SEP}%H{FIELD_SEP}%an{FIELD_SEP}%at{FIELD_SEP}%s");
        let Some(text) = self.run_text(root, &["log", &limit, &format, "--name-only"])? else {
            return Ok(Vec::new());
        };
        Ok(parse_history(&text))
    }

    fn file_at(&self, root: &Path, commit: &CommitHash, path: &str) -> Result<Option<Vec<u8>>> {
        let object = format!("{}:{path}", commit.as_str());
        Ok(self.run(root, &["show", &object])?.map(|output| output.stdout))
    }
}

/// Parse `hash<US>author<US>unix-seconds<US>subject`.
fn parse_commit_line(line: &str) -> Option<Commit> {
    let mut fields = line.splitn(4, FIELD_SEP);
    let hash = fields.next()?.trim();
    let author = fields.next()?;
    let secs = fields.next()?.trim().parse::<i64>().ok()?;
    let message = fields.next().unwrap_or_default();
    if hash.is_empty() {
        return None;
    }
    Some(Commit {
        hash: CommitHash::new(hash),
        message: message.to_string(),
        author: author.to_string(),
        timestamp: datetime_from_secs(secs),
    })
}

fn parse_history(text: &str) -> Vec<CommitInfo> {
    text.split(RECORD_SEP)
        .filter(|record| !record.trim().is_empty())
        .filter_map(|record| {
            let mut lines = record.lines();
            let header = lines.next()?;
            let Some(commit) = parse_commit_line(header) else {
                warn!(header, "skipping unparseable commit record");
                return None;
            };
            let changed_files = lines
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect();
            Some(CommitInfo {
                commit,
                changed_files,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn commit_line_parses_all_fields() {
        let line = format!("abc123{FIELD_SEP}Ana{FIELD_SEP}1700000000{FIELD_SEP}fix: parser");
        let commit = parse_commit_line(&line).expect("parse");
        assert_eq!(commit.hash.as_str(), "abc123");
        assert_eq!(commit.author, "Ana");
        assert_eq!(commit.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(commit.message, "fix: parser");
    }

    #[test]
    fn commit_line_rejects_bad_timestamp() {
        let line = format!("abc{FIELD_SEP}Ana{FIELD_SEP}yesterday{FIELD_SEP}msg");
        assert!(parse_commit_line(&line).is_none());
    }

    #[test]
    fn history_splits_records_and_changed_files() {
        let text = format!(
            "{RECORD_SEP}c2{FIELD_SEP}Bo{FIELD_SEP}200{FIELD_SEP}second\n\nsrc/a.py\nsrc/b.py\n\
             {RECORD_SEP}c1{FIELD_SEP}Ana{FIELD_SEP}100{FIELD_SEP}first\n\nsrc/a.py\n"
        );
        let history = parse_history(&text);

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].commit.hash.as_str(), "c2");
        assert_eq!(history[0].changed_files, vec!["src/a.py", "src/b.py"]);
        assert_eq!(history[1].changed_files, vec!["src/a.py"]);
    }

    #[test]
    fn unreadable_status_is_an_error_not_a_clean_tree() {
        let dir = TempDir::new().expect("temp dir");
        let git = GitCli::with_program("ripple-missing-git-executable");

        let dirty = git.is_dirty(dir.path());

        assert!(matches!(dirty, Err(Error::SourceControl(_))), "got {dirty:?}");
    }

    #[test]
    fn untracked_directory_has_no_head() {
        let dir = TempDir::new().expect("temp dir");
        let git = GitCli::new();
        assert_eq!(git.head(dir.path()).expect("head"), None);
        assert!(git.history(dir.path(), 10).expect("history").is_empty());
    }

    #[test]
    fn missing_executable_degrades_to_untracked() {
        let git = GitCli {
            program: "definitely-not-a-git-binary".into(),
        };
        let dir = TempDir::new().expect("temp dir");
        assert_eq!(git.head(dir.path()).expect("head"), None);
        assert!(!git.is_dirty(dir.path()).expect("dirty"));
    }
}
