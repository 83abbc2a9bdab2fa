//! Domain types for Ripple.
//!
//! - **Identities**: `RepoId`, `CommitHash`, `ContentHash`, `SnapshotId`
//! - **Parse facts**: `ParsedFile` and its symbol/call records (input to the graph builder)
//! - **Lineage records**: `Repository`, `Commit`, `Version`
//! - **Query results**: `TrackOutcome`, `HistoryEntry`, `IntegrityStatus`, `Contribution`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Strongly-typed identities
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier.
            #[must_use]
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id! {
    /// Repository identity: 16 hex chars derived from its URL or local path.
    RepoId
}

string_id! {
    /// Full commit hash as reported by source control.
    CommitHash
}

string_id! {
    /// SHA-256 of a file's raw bytes, lowercase hex.
    ContentHash
}

string_id! {
    /// Identity of one cached analysis result.
    SnapshotId
}

impl CommitHash {
    /// First eight characters, for display.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Supported source languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python source files (`.py`)
    Python,
    /// JavaScript source files (`.js`, `.jsx`, `.mjs`, `.cjs`)
    JavaScript,
    /// TypeScript source files (`.ts`, `.tsx`)
    TypeScript,
    /// Java source files (`.java`)
    Java,
}

impl Language {
    /// Every language Ripple can parse.
    pub const ALL: [Language; 4] = [
        Self::Python,
        Self::JavaScript,
        Self::TypeScript,
        Self::Java,
    ];

    /// File extensions handled by this language.
    #[must_use]
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Python => &["py"],
            Self::JavaScript => &["js", "jsx", "mjs", "cjs"],
            Self::TypeScript => &["ts", "tsx"],
            Self::Java => &["java"],
        }
    }

    /// Detect language from file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|lang| lang.extensions().contains(&ext.as_str()))
    }

    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Java => "java",
        }
    }

    /// Parse the database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|lang| lang.as_str() == s)
    }
}

/// Kind of change whose impact is being simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Edit the file's content in place
    Modify,
    /// Remove the file
    Delete,
    /// Rename or relocate the file
    Move,
}

impl ChangeType {
    /// Lowercase name used in keys and output.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Modify => "modify",
            Self::Delete => "delete",
            Self::Move => "move",
        }
    }
}

impl std::str::FromStr for ChangeType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "modify" => Ok(Self::Modify),
            "delete" => Ok(Self::Delete),
            "move" => Ok(Self::Move),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown change type '{other}' (expected modify, delete or move)"
            ))),
        }
    }
}

/// Bucketed risk of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Little or no reachable surface
    Low,
    /// Noticeable surface
    Medium,
    /// Large surface
    High,
    /// Certain breakage across a large surface
    Critical,
}

impl RiskLevel {
    /// Lowercase name used in output.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Parse facts
// ============================================================================

/// A named declaration (class or function) at a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    /// Declared name
    pub name: String,
    /// 1-indexed line number
    pub line: u32,
}

/// A call from one function to another, both named by their bare names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Calling function (declared in the same file)
    pub caller: String,
    /// Called function name
    pub callee: String,
}

/// Structural facts extracted from one file.
///
/// `path` is relative to the repository root and always uses `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFile {
    /// Repository-relative path
    pub path: String,
    /// Source language
    pub language: Language,
    /// Raw import strings in source order
    pub imports: Vec<String>,
    /// Declared classes
    pub classes: Vec<Declaration>,
    /// Declared functions and methods
    pub functions: Vec<Declaration>,
    /// Names of called functions, in source order, without duplicates
    pub calls: Vec<String>,
    /// Calls attributed to an enclosing function
    pub function_calls: Vec<FunctionCall>,
}

impl ParsedFile {
    /// Create an empty record for a file.
    #[must_use]
    pub fn new(path: impl Into<String>, language: Language) -> Self {
        Self {
            path: path.into(),
            language,
            imports: Vec::new(),
            classes: Vec::new(),
            functions: Vec::new(),
            calls: Vec::new(),
            function_calls: Vec::new(),
        }
    }
}

// ============================================================================
// Lineage records
// ============================================================================

/// A repository registered with Ripple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Identity
    pub repo_id: RepoId,
    /// Remote URL, when known
    pub url: Option<String>,
    /// Local checkout path
    pub local_path: String,
    /// Commit analyzed most recently
    pub current_commit: Option<CommitHash>,
}

/// A commit observed in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Full commit hash
    pub hash: CommitHash,
    /// First line of the commit message
    pub message: String,
    /// Author name
    pub author: String,
    /// Commit time
    pub timestamp: DateTime<Utc>,
}

/// An immutable record of a file's content at a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Repository-relative path
    pub file: String,
    /// Content fingerprint
    pub content_hash: ContentHash,
    /// Commit at which the content was observed
    pub commit: CommitHash,
    /// Commit time
    pub timestamp: DateTime<Utc>,
    /// Commit author
    pub author: String,
}

/// Whether `track_file_version` created a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    /// A version for this (file, hash, commit) already existed
    Unchanged,
    /// A new version was recorded
    NewVersion,
}

/// Outcome of tracking one file at one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackOutcome {
    /// Whether a record was created
    pub status: TrackStatus,
    /// Content fingerprint observed
    pub hash: ContentHash,
    /// Short commit hash
    pub commit: String,
}

/// One entry of a file's history, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Content fingerprint
    pub hash: ContentHash,
    /// Commit at which it was observed
    pub commit: CommitHash,
    /// Commit time
    pub timestamp: DateTime<Utc>,
    /// Commit author
    pub author: String,
    /// Fingerprint of the preceding version, if any
    pub previous_hash: Option<ContentHash>,
}

/// Result of comparing a file on disk with its latest recorded version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntegrityStatus {
    /// No version has been recorded for the file
    NotTracked,
    /// Current content differs from the latest recorded version
    Tampered {
        /// Fingerprint of the latest recorded version
        stored_hash: ContentHash,
        /// Fingerprint of the content on disk (`None` when the file is gone)
        current_hash: Option<ContentHash>,
        /// Human-readable summary
        message: String,
    },
    /// Current content matches the latest recorded version
    Intact {
        /// Matching fingerprint
        hash: ContentHash,
    },
}

/// Aggregate activity of one author in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    /// Author name
    pub author: String,
    /// Number of versions authored
    pub versions: u64,
    /// Number of distinct files touched
    pub files: u64,
    /// Earliest authored version
    pub first_seen: DateTime<Utc>,
    /// Latest authored version
    pub last_seen: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("py", Some(Language::Python))]
    #[case("JS", Some(Language::JavaScript))]
    #[case("tsx", Some(Language::TypeScript))]
    #[case("java", Some(Language::Java))]
    #[case("rs", None)]
    fn language_from_extension(#[case] ext: &str, #[case] expected: Option<Language>) {
        assert_eq!(Language::from_extension(ext), expected);
    }

    #[test]
    fn language_string_representation_round_trips() {
        for lang in Language::ALL {
            assert_eq!(Language::parse(lang.as_str()), Some(lang));
        }
    }

    #[test]
    fn change_type_parses_case_insensitively() {
        assert_eq!("DELETE".parse::<ChangeType>().ok(), Some(ChangeType::Delete));
        assert!("rename".parse::<ChangeType>().is_err());
    }

    #[test]
    fn commit_short_hash_tolerates_short_input() {
        assert_eq!(CommitHash::new("0123456789abcdef").short(), "01234567");
        assert_eq!(CommitHash::new("abc").short(), "abc");
    }

    #[test]
    fn integrity_status_serializes_with_status_tag() {
        let status = IntegrityStatus::Intact {
            hash: ContentHash::new("ab"),
        };
        let json = serde_json::to_value(&status).expect("serialize");
        assert_eq!(json["status"], "intact");
        assert_eq!(json["hash"], "ab");
    }
}
