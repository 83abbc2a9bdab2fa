//! Matching caller-supplied paths to stored file keys.
//!
//! Callers name files in many ways: relative to the repository, absolute,
//! with `\` separators, or by bare filename. Each strategy below returns an
//! optional match and the first success wins. When every strategy fails the
//! input comes back as [`PathMatch::Unresolved`], which callers treat as "no
//! such file" rather than an error.

use std::path::Path;

/// Result of matching a path against the known file keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathMatch {
    /// A stored key was found
    Resolved {
        /// The stored key
        path: String,
        /// Name of the strategy that matched
        strategy: &'static str,
    },
    /// Nothing matched; carries the input unchanged
    Unresolved(String),
}

impl PathMatch {
    /// The stored key, if any.
    #[must_use]
    pub fn resolved(&self) -> Option<&str> {
        match self {
            Self::Resolved { path, .. } => Some(path),
            Self::Unresolved(_) => None,
        }
    }
}

struct Query<'a> {
    /// Input exactly as supplied
    raw: &'a str,
    /// `/`-separated, relative to the root when it was inside it, no leading `./`
    normalized: String,
    known: &'a [String],
}

struct Strategy {
    name: &'static str,
    find: fn(&Query<'_>) -> Option<String>,
}

/// Tried in order; first match wins.
const STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "exact",
        find: find_exact,
    },
    Strategy {
        name: "normalized",
        find: find_normalized,
    },
    Strategy {
        name: "suffix",
        find: find_suffix,
    },
    Strategy {
        name: "filename",
        find: find_filename,
    },
];

/// Match `input` against `known` file keys of a repository rooted at `root`.
#[must_use]
pub fn resolve_path(input: &str, root: &Path, known: &[String]) -> PathMatch {
    let query = Query {
        raw: input,
        normalized: normalize(input, root),
        known,
    };
    for strategy in STRATEGIES {
        if let Some(path) = (strategy.find)(&query) {
            tracing::trace!(input, path = %path, strategy = strategy.name, "resolved path");
            return PathMatch::Resolved {
                path,
                strategy: strategy.name,
            };
        }
    }
    PathMatch::Unresolved(input.to_string())
}

/// Separators to `/`, the root prefix and any leading `./` removed.
fn normalize(input: &str, root: &Path) -> String {
    let slashed = input.trim().replace('\\', "/");
    let root = root.to_string_lossy().replace('\\', "/");
    let root = root.trim_end_matches('/');
    let relative = if root.is_empty() {
        slashed.as_str()
    } else {
        slashed
            .strip_prefix(root)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(&slashed)
    };
    let mut relative = relative;
    while let Some(rest) = relative.strip_prefix("./") {
        relative = rest;
    }
    relative.to_string()
}

fn find_exact(query: &Query<'_>) -> Option<String> {
    query.known.iter().find(|k| *k == query.raw).cloned()
}

fn find_normalized(query: &Query<'_>) -> Option<String> {
    query
        .known
        .iter()
        .find(|k| **k == query.normalized)
        .cloned()
}

/// Longest segment-aligned overlap in either direction.
///
/// Overlap is the length of the shared tail, so a bare `parser.py` overlaps
/// `src/parser.py` and `lib/parser.py` equally. Ties at the longest overlap
/// are ambiguous and match nothing.
fn find_suffix(query: &Query<'_>) -> Option<String> {
    let needle = query.normalized.trim_start_matches('/');
    if needle.is_empty() {
        return None;
    }
    let mut best: Option<(usize, &String)> = None;
    let mut tied = false;
    for known in query.known {
        let overlap = if ends_with_segments(known, needle) {
            needle.len()
        } else if ends_with_segments(needle, known) {
            known.len()
        } else {
            continue;
        };
        match best {
            Some((len, _)) if overlap < len => {}
            Some((len, _)) if overlap == len => tied = true,
            _ => {
                best = Some((overlap, known));
                tied = false;
            }
        }
    }
    best.filter(|_| !tied).map(|(_, known)| known.clone())
}

/// Only a filename that names exactly one known file matches.
fn find_filename(query: &Query<'_>) -> Option<String> {
    let name = query.normalized.rsplit('/').next().filter(|n| !n.is_empty())?;
    let mut candidates = query
        .known
        .iter()
        .filter(|k| k.rsplit('/').next() == Some(name));
    let first = candidates.next()?;
    candidates.next().is_none().then(|| first.clone())
}

/// `path` equals `suffix` or ends with `/` + `suffix`.
fn ends_with_segments(path: &str, suffix: &str) -> bool {
    path == suffix
        || path
            .strip_suffix(suffix)
            .is_some_and(|head| head.ends_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn known() -> Vec<String> {
        ["src/app.py", "src/utils/parser.py", "lib/parser.py", "tests/test_app.py"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[rstest]
    #[case("src/app.py", "src/app.py", "exact")]
    #[case("/work/repo/src/app.py", "src/app.py", "normalized")]
    #[case("./src/app.py", "src/app.py", "normalized")]
    #[case("src\\utils\\parser.py", "src/utils/parser.py", "normalized")]
    #[case("C:/checkout/repo/src/utils/parser.py", "src/utils/parser.py", "suffix")]
    #[case("utils/parser.py", "src/utils/parser.py", "suffix")]
    #[case("test_app.py", "tests/test_app.py", "suffix")]
    #[case("moved/elsewhere/app.py", "src/app.py", "filename")]
    fn layered_strategies(
        #[case] input: &str,
        #[case] expected: &str,
        #[case] strategy: &'static str,
    ) {
        let matched = resolve_path(input, Path::new("/work/repo"), &known());
        assert_eq!(
            matched,
            PathMatch::Resolved {
                path: expected.to_string(),
                strategy,
            }
        );
    }

    #[test]
    fn filename_shared_by_two_files_is_ambiguous() {
        let matched = resolve_path("parser.py", Path::new("/work/repo"), &known());
        assert_eq!(matched, PathMatch::Unresolved("parser.py".into()));
    }

    #[test]
    fn longest_overlap_wins_when_unique() {
        let known: Vec<String> = vec!["utils/parser.py".into(), "src/utils/parser.py".into()];
        let matched = resolve_path("/elsewhere/src/utils/parser.py", Path::new("/work/repo"), &known);
        assert_eq!(matched.resolved(), Some("src/utils/parser.py"));
    }

    #[test]
    fn ambiguous_filename_and_unknown_paths_are_unresolved() {
        let matched = resolve_path("moved/parser.py", Path::new("/work/repo"), &known());
        assert_eq!(matched, PathMatch::Unresolved("moved/parser.py".into()));

        let matched = resolve_path("nowhere/else.py", Path::new("/work/repo"), &known());
        assert_eq!(matched.resolved(), None);
    }

    #[test]
    fn partial_segment_does_not_match() {
        let matched = resolve_path("app.py", Path::new("/work/repo"), &["src/myapp.py".into()]);
        assert_eq!(matched.resolved(), None);
    }
}
