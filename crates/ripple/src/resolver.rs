//! Import string resolution.
//!
//! Maps raw import strings (`utils.parser`, `./utils/parser.js`,
//! `com.acme.util.Strings`) to files of the repository. Each file registers
//! several lookup keys; each import is tried against an ordered list of
//! strategies and the first strategy that returns a match wins. Exhausting the
//! list yields [`Resolution::Unresolved`], which the graph builder turns into
//! an external module.
//!
//! Results depend only on the input order of files: keys are kept in
//! declaration order and every tie is broken by it.

use std::collections::HashMap;

/// Extensions stripped from paths and import strings before matching.
const SOURCE_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".jsx", ".mjs", ".cjs", ".ts", ".tsx", ".java",
];

/// File stems that stand for their directory (`pkg/__init__.py` is `pkg`).
const PACKAGE_STEMS: &[&str] = &["__init__", "index"];

/// Number of trailing path segments registered as lookup keys.
const MAX_SUFFIX_SEGMENTS: usize = 3;

/// Outcome of resolving one import string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Import names the file at this position of the input list
    File(usize),
    /// Import names the importing file itself
    SelfReference,
    /// No strategy matched; carries the normalized module name
    Unresolved(String),
}

/// One way of matching a normalized import against the index.
struct Strategy {
    name: &'static str,
    find: fn(&ModuleIndex, &Request<'_>) -> Option<usize>,
}

/// Tried in order; first match wins.
const STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "relative",
        find: ModuleIndex::find_relative,
    },
    Strategy {
        name: "exact",
        find: ModuleIndex::find_exact,
    },
    Strategy {
        name: "suffix",
        find: ModuleIndex::find_suffix,
    },
];

struct Request<'a> {
    /// Directory of the importing file, `/`-separated, no trailing slash
    importer_dir: &'a str,
    /// Normalized import
    module: &'a str,
}

/// Lookup table from candidate identifiers to file positions.
#[derive(Debug, Default)]
pub struct ModuleIndex {
    /// Extension-less full paths (and package directories)
    full_paths: HashMap<String, usize>,
    /// First registration of each key wins
    exact: HashMap<String, usize>,
    /// Every key in registration order
    keys: Vec<(String, usize)>,
}

impl ModuleIndex {
    /// Build the table for files given as repository-relative paths.
    #[must_use]
    pub fn build<S: AsRef<str>>(paths: &[S]) -> Self {
        let mut index = Self::default();
        for (position, path) in paths.iter().enumerate() {
            index.register(path.as_ref(), position);
        }
        index
    }

    fn register(&mut self, path: &str, position: usize) {
        let path = path.replace('\\', "/");
        let module_path = strip_extension(&path);
        let mut segments: Vec<&str> = module_path.split('/').filter(|s| !s.is_empty()).collect();

        self.full_paths.entry(module_path.to_string()).or_insert(position);
        if segments.len() > 1 && segments.last().is_some_and(|s| PACKAGE_STEMS.contains(s)) {
            segments.pop();
            self.full_paths.entry(segments.join("/")).or_insert(position);
        }

        let Some(stem) = segments.last().copied() else {
            return;
        };
        self.add_key(stem.to_string(), position);
        self.add_key(format!("./{stem}"), position);
        self.add_key(format!("../{stem}"), position);
        for len in 2..=MAX_SUFFIX_SEGMENTS.min(segments.len()) {
            self.add_key(segments[segments.len() - len..].join("/"), position);
        }
    }

    fn add_key(&mut self, key: String, position: usize) {
        self.exact.entry(key.clone()).or_insert(position);
        self.keys.push((key, position));
    }

    /// Resolve an import made by the file at `importer` (whose path is `importer_path`).
    #[must_use]
    pub fn resolve(&self, importer: usize, importer_path: &str, raw_import: &str) -> Resolution {
        let module = normalize_import(raw_import);
        let importer_path = importer_path.replace('\\', "/");
        let importer_dir = importer_path.rsplit_once('/').map_or("", |(dir, _)| dir);
        let request = Request {
            importer_dir,
            module: &module,
        };

        for strategy in STRATEGIES {
            if let Some(position) = (strategy.find)(self, &request) {
                tracing::trace!(import = raw_import, strategy = strategy.name, "resolved import");
                return if position == importer {
                    Resolution::SelfReference
                } else {
                    Resolution::File(position)
                };
            }
        }
        Resolution::Unresolved(module)
    }

    fn find_relative(&self, request: &Request<'_>) -> Option<usize> {
        if !(request.module.starts_with("./") || request.module.starts_with("../")) {
            return None;
        }
        let joined = join_relative(request.importer_dir, request.module)?;
        self.full_paths.get(&joined).copied()
    }

    fn find_exact(&self, request: &Request<'_>) -> Option<usize> {
        self.exact.get(request.module).copied()
    }

    /// Longest key that is a segment-aligned suffix of the import (or the
    /// import of the key); equal lengths fall back to registration order.
    fn find_suffix(&self, request: &Request<'_>) -> Option<usize> {
        let module = request.module.trim_start_matches("./").trim_start_matches("../");
        let mut best: Option<(usize, usize)> = None;
        for (key, position) in &self.keys {
            let key = key.trim_start_matches("./").trim_start_matches("../");
            let matched = if ends_with_segments(module, key) {
                key.len()
            } else if ends_with_segments(key, module) {
                module.len()
            } else {
                continue;
            };
            if best.is_none_or(|(len, _)| matched > len) {
                best = Some((matched, *position));
            }
        }
        best.map(|(_, position)| position)
    }
}

/// Normalize separators and module notation to a `/`-separated, extension-less form.
///
/// `utils.parser` → `utils/parser`, `.db` → `./db`, `..models` → `../models`,
/// `./view.js` → `./view`, `pkg\mod` → `pkg/mod`.
#[must_use]
pub fn normalize_import(raw: &str) -> String {
    let raw = raw.trim().replace('\\', "/");
    let raw = strip_extension(&raw);

    if raw.contains('/') {
        return raw.to_string();
    }

    // Dotted module notation, possibly with leading relative dots
    let dots = raw.chars().take_while(|&c| c == '.').count();
    let body = raw[dots..].replace('.', "/");
    match dots {
        0 => body,
        1 => format!("./{body}"),
        n => format!("{}{body}", "../".repeat(n - 1)),
    }
}

fn strip_extension(path: &str) -> &str {
    SOURCE_EXTENSIONS
        .iter()
        .find_map(|ext| path.strip_suffix(ext))
        .unwrap_or(path)
}

fn ends_with_segments(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() || !haystack.ends_with(needle) {
        return false;
    }
    let prefix = &haystack[..haystack.len() - needle.len()];
    prefix.is_empty() || prefix.ends_with('/')
}

fn join_relative(dir: &str, module: &str) -> Option<String> {
    let mut parts: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in module.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("utils.parser", "utils/parser")]
    #[case(".db", "./db")]
    #[case("..models", "../models")]
    #[case("./view.js", "./view")]
    #[case("pkg\\mod", "pkg/mod")]
    #[case("com.acme.util.Strings", "com/acme/util/Strings")]
    #[case("react", "react")]
    fn normalizes_import_notation(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_import(raw), expected);
    }

    #[test]
    fn dotted_module_resolves_by_suffix() {
        let files = ["main.py", "project/utils/parser.py"];
        let index = ModuleIndex::build(&files);

        assert_eq!(index.resolve(0, "main.py", "utils.parser"), Resolution::File(1));
    }

    #[test]
    fn backslash_paths_are_registered_with_forward_slashes() {
        let files = ["app\\main.py", "project\\utils\\parser.py"];
        let index = ModuleIndex::build(&files);

        assert_eq!(
            index.resolve(0, "app\\main.py", "utils.parser"),
            Resolution::File(1)
        );
    }

    #[test]
    fn relative_import_prefers_sibling_over_same_named_file() {
        let files = ["lib/config.js", "app/config.js", "app/main.js"];
        let index = ModuleIndex::build(&files);

        assert_eq!(index.resolve(2, "app/main.js", "./config"), Resolution::File(1));
        // Without the relative strategy the first registration would win
        assert_eq!(index.resolve(2, "app/main.js", "config"), Resolution::File(0));
    }

    #[test]
    fn package_index_files_stand_for_their_directory() {
        let files = ["src/components/index.js", "src/app.js"];
        let index = ModuleIndex::build(&files);

        assert_eq!(index.resolve(1, "src/app.js", "./components"), Resolution::File(0));
    }

    #[test]
    fn suffix_match_prefers_longest_key() {
        let files = ["other/Strings.java", "src/main/java/com/acme/util/Strings.java"];
        let index = ModuleIndex::build(&files);

        assert_eq!(
            index.resolve(0, "other/Strings.java", "com.acme.util.Strings"),
            Resolution::File(1)
        );
    }

    #[test]
    fn suffix_match_requires_segment_boundary() {
        let files = ["parser.py", "main.py"];
        let index = ModuleIndex::build(&files);

        assert_eq!(
            index.resolve(1, "main.py", "myparser"),
            Resolution::Unresolved("myparser".into())
        );
    }

    #[test]
    fn import_of_own_file_is_a_self_reference() {
        let files = ["pkg/config.py"];
        let index = ModuleIndex::build(&files);

        assert_eq!(
            index.resolve(0, "pkg/config.py", "config"),
            Resolution::SelfReference
        );
    }

    #[test]
    fn unresolved_import_keeps_normalized_name() {
        let index = ModuleIndex::build(&["main.py"]);
        assert_eq!(
            index.resolve(0, "main.py", "os.path"),
            Resolution::Unresolved("os/path".into())
        );
    }
}
