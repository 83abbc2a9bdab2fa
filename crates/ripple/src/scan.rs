//! Source file discovery.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::RippleConfig;
use crate::error::{AnalysisWarning, WarningKind};
use crate::types::Language;

/// A source file selected for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the root, `/`-separated
    pub path: String,
    /// Absolute path on disk
    pub abs_path: PathBuf,
    /// Detected language
    pub language: Language,
}

/// Files found under a root, plus what was skipped along the way.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Selected files, ordered by relative path
    pub files: Vec<SourceFile>,
    /// Unreadable directories and oversized files
    pub warnings: Vec<AnalysisWarning>,
}

/// Walk `root` for files in the configured languages.
///
/// Hidden entries and excluded directory names are never descended into.
/// Files over `max-file-size` are skipped with a warning.
#[must_use]
pub fn discover(root: &Path, config: &RippleConfig) -> Discovery {
    let mut discovery = Discovery::default();
    walk_dir(root, root, config, &mut discovery);
    discovery.files.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(
        root = %root.display(),
        files = discovery.files.len(),
        skipped = discovery.warnings.len(),
        "discovered source files"
    );
    discovery
}

fn walk_dir(root: &Path, dir: &Path, config: &RippleConfig, out: &mut Discovery) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(directory = %dir.display(), error = %e, "Cannot read directory, skipping");
            out.warnings.push(AnalysisWarning {
                path: dir.to_path_buf(),
                kind: WarningKind::IoError,
                message: format!("cannot read directory: {e}"),
            });
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(directory = %dir.display(), error = %e, "Failed to read directory entry, skipping");
                continue;
            }
        };
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }

        if path.is_dir() {
            if !config.is_excluded_dir(name) {
                walk_dir(root, &path, config, out);
            }
            continue;
        }
        if !path.is_file() {
            continue;
        }

        let Some(language) = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Language::from_extension)
            .filter(|lang| config.languages.contains(lang))
        else {
            continue;
        };

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if size > config.max_file_size {
            out.warnings.push(AnalysisWarning {
                path: path.clone(),
                kind: WarningKind::TooLarge,
                message: format!("{size} bytes exceeds limit of {}", config.max_file_size),
            });
            continue;
        }

        out.files.push(SourceFile {
            path: relative_path(root, &path),
            abs_path: path,
            language,
        });
    }
}

/// `path` relative to `root` with `/` separators.
pub(crate) fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write");
    }

    #[test]
    fn finds_supported_files_in_sorted_order() {
        let dir = TempDir::new().expect("temp dir");
        write(dir.path(), "src/b.py", "");
        write(dir.path(), "src/a.ts", "");
        write(dir.path(), "README.md", "");
        write(dir.path(), "Main.java", "");

        let found = discover(dir.path(), &RippleConfig::default());

        let paths: Vec<&str> = found.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["Main.java", "src/a.ts", "src/b.py"]);
        assert_eq!(found.files[1].language, Language::TypeScript);
    }

    #[test]
    fn skips_hidden_and_excluded_directories() {
        let dir = TempDir::new().expect("temp dir");
        write(dir.path(), ".ripple/cache.py", "");
        write(dir.path(), "node_modules/lib/index.js", "");
        write(dir.path(), "app/main.py", "");

        let found = discover(dir.path(), &RippleConfig::default());

        assert_eq!(found.files.len(), 1);
        assert_eq!(found.files[0].path, "app/main.py");
    }

    #[test]
    fn oversized_files_become_warnings() {
        let dir = TempDir::new().expect("temp dir");
        write(dir.path(), "big.py", &"x".repeat(64));
        let config = RippleConfig {
            max_file_size: 10,
            ..RippleConfig::default()
        };

        let found = discover(dir.path(), &config);

        assert!(found.files.is_empty());
        assert_eq!(found.warnings.len(), 1);
        assert_eq!(found.warnings[0].kind, WarningKind::TooLarge);
    }

    #[test]
    fn language_filter_applies() {
        let dir = TempDir::new().expect("temp dir");
        write(dir.path(), "a.py", "");
        write(dir.path(), "b.js", "");
        let config = RippleConfig {
            languages: vec![Language::JavaScript],
            ..RippleConfig::default()
        };

        let found = discover(dir.path(), &config);
        assert_eq!(found.files.len(), 1);
        assert_eq!(found.files[0].path, "b.js");
    }
}
