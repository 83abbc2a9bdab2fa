//! Configuration loaded from `.ripple/config.yaml`.
//!
//! Every key is optional; a missing file means defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::impact::CallerPolicy;
use crate::types::Language;

/// Name of the per-workspace data directory.
pub const DATA_DIR_NAME: &str = ".ripple";

/// Name of the configuration file inside [`DATA_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Name of the database file inside [`DATA_DIR_NAME`].
pub const DATABASE_FILE_NAME: &str = "ripple.db";

const DEFAULT_CACHE_CAPACITY: usize = 100;
const DEFAULT_MAX_FILE_SIZE: u64 = 1_000_000;
const DEFAULT_HISTORY_DEPTH: usize = 50;

/// Ripple configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RippleConfig {
    /// Maximum number of entries in the result cache
    pub cache_capacity: usize,

    /// Files larger than this many bytes are skipped
    pub max_file_size: u64,

    /// Languages to analyze
    pub languages: Vec<Language>,

    /// Directory names never descended into (hidden directories are always skipped)
    pub exclude_dirs: Vec<String>,

    /// How function-level callers contribute to risk scores
    pub caller_policy: CallerPolicy,

    /// Default number of commits walked by history import
    pub history_depth: usize,

    /// External command that turns a prompt on stdin into an explanation on stdout
    pub explain_command: Option<String>,
}

impl Default for RippleConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            languages: Language::ALL.to_vec(),
            exclude_dirs: [
                "node_modules",
                "target",
                "build",
                "dist",
                "vendor",
                "__pycache__",
                "venv",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            caller_policy: CallerPolicy::default(),
            history_depth: DEFAULT_HISTORY_DEPTH,
            explain_command: None,
        }
    }
}

impl RippleConfig {
    /// Load configuration from a file, falling back to defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file exists but is not valid YAML or fails
    /// validation, and `Error::Io` if it cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check that values are usable.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(Error::Config("cache-capacity must be at least 1".into()));
        }
        if self.max_file_size == 0 {
            return Err(Error::Config("max-file-size must be positive".into()));
        }
        if self.languages.is_empty() {
            return Err(Error::Config("languages must name at least one language".into()));
        }
        Ok(())
    }

    /// Whether a directory name is excluded from discovery.
    #[must_use]
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        name.starts_with('.') || self.exclude_dirs.iter().any(|d| d == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().expect("temp dir");
        let config = RippleConfig::load(&dir.path().join("absent.yaml")).expect("load");
        assert_eq!(config, RippleConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "cache-capacity: 5\ncaller-policy: dedup-against-direct\nlanguages: [python]\n",
        )
        .expect("write");

        let config = RippleConfig::load(&path).expect("load");

        assert_eq!(config.cache_capacity, 5);
        assert_eq!(config.caller_policy, CallerPolicy::DedupAgainstDirect);
        assert_eq!(config.languages, vec![Language::Python]);
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = RippleConfig {
            explain_command: Some("llm --model local".into()),
            history_depth: 7,
            ..RippleConfig::default()
        };

        config.save(&path).expect("save");
        assert_eq!(RippleConfig::load(&path).expect("load"), config);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "cache-capacity: 0\n").expect("write");

        let err = RippleConfig::load(&path).expect_err("should reject");
        assert!(err.to_string().contains("cache-capacity"));
    }

    #[test]
    fn hidden_and_listed_directories_are_excluded() {
        let config = RippleConfig::default();
        assert!(config.is_excluded_dir(".git"));
        assert!(config.is_excluded_dir("node_modules"));
        assert!(!config.is_excluded_dir("src"));
    }
}
