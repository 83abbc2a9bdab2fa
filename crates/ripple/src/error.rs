//! Error types for Ripple operations.
//!
//! Errors fall into two groups:
//!
//! - **`Error`**: failures that stop the operation in progress (store failures,
//!   unknown repositories, invalid arguments)
//! - **`AnalysisWarning`**: per-file problems collected during an analysis pass
//!   that never abort it
//!
//! ## Store failures
//!
//! A query that cannot reach the backing store must not look like a query that
//! found nothing. [`Error::is_store_failure`] lets request handling report
//! "analysis failed" instead of an empty blast radius.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Ripple operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for Ripple operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A statement against the backing store failed
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The backing store could not be reached at all
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// File system operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted JSON payload could not be encoded or decoded
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Requested repository, snapshot or file does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller supplied an argument that cannot be interpreted
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The version control tool failed in an unexpected way
    #[error("source control error: {0}")]
    SourceControl(String),

    /// Internal invariant violated
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns `true` when the backing store itself failed.
    ///
    /// Callers use this to distinguish "the store is down" from
    /// "the target has no dependents".
    #[must_use]
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Database(_) | Self::StoreUnavailable(_))
    }
}

/// Problem encountered with a single file during an analysis pass.
///
/// Warnings are collected, not thrown. The pass continues with the remaining
/// files and reports every warning at the end.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AnalysisWarning {
    /// File or directory the warning is about
    pub path: PathBuf,
    /// Category of the problem
    pub kind: WarningKind,
    /// Human-readable message
    pub message: String,
}

impl std::fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.path.display(),
            self.message,
            self.kind
        )
    }
}

/// Categorization of analysis warnings.
///
/// Input problems are properties of the analyzed files; internal problems
/// come from the environment Ripple runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    // === Input Problems ===
    /// File content is not valid UTF-8
    EncodingError,

    /// File exceeds the configured size limit
    TooLarge,

    // === Internal Problems ===
    /// File or directory could not be read
    IoError,
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EncodingError => write!(f, "encoding error"),
            Self::TooLarge => write!(f, "file too large"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl WarningKind {
    /// Returns `true` if the problem lies in the analyzed files.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::EncodingError | Self::TooLarge)
    }

    /// Returns `true` if the problem lies in the environment.
    #[must_use]
    pub fn is_internal_error(&self) -> bool {
        !self.is_input_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_and_unavailable_are_store_failures() {
        let db = Error::Database(rusqlite::Error::InvalidQuery);
        let down = Error::StoreUnavailable("gone".into());
        let missing = Error::NotFound("repo abc".into());

        assert!(db.is_store_failure());
        assert!(down.is_store_failure());
        assert!(!missing.is_store_failure());
    }

    #[test]
    fn warning_kinds_split_into_input_and_internal() {
        assert!(WarningKind::EncodingError.is_input_error());
        assert!(WarningKind::TooLarge.is_input_error());
        assert!(WarningKind::IoError.is_internal_error());
        assert!(!WarningKind::IoError.is_input_error());
    }

    #[test]
    fn warning_display_includes_path_and_kind() {
        let warning = AnalysisWarning {
            path: PathBuf::from("src/big.py"),
            kind: WarningKind::TooLarge,
            message: "2000000 bytes exceeds limit".into(),
        };

        assert_eq!(
            warning.to_string(),
            "src/big.py: 2000000 bytes exceeds limit (file too large)"
        );
    }
}
