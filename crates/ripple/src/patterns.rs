//! Architecture pattern heuristics.
//!
//! Patterns are guessed from file paths alone: a file whose lowercase path
//! contains a role keyword plays that role. These are cheap signals for
//! summaries and snapshot comparisons, not a classification anyone should
//! rely on.

use serde::{Deserialize, Serialize};

/// Architectural styles Ripple looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    /// Presentation, business and data layers
    Layered,
    /// Controllers (or routes) plus models
    Mvc,
    /// Ports plus adapters
    Hexagonal,
}

impl PatternKind {
    /// Lowercase name used in output.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Layered => "layered",
            Self::Mvc => "mvc",
            Self::Hexagonal => "hexagonal",
        }
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detection result for one pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    /// Pattern examined
    pub pattern: PatternKind,
    /// Whether the evidence is sufficient
    pub detected: bool,
    /// Fixed confidence for the detected/not-detected outcome
    pub confidence: f64,
    /// Roles or counts that were found, e.g. `layer:business`, `models:3`
    pub evidence: Vec<String>,
}

/// A pattern whose detection flipped between two analyses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternChange {
    /// Pattern that changed
    pub pattern: PatternKind,
    /// Detected in the older analysis
    pub before: bool,
    /// Detected in the newer analysis
    pub after: bool,
}

impl std::fmt::Display for PatternChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.before, self.after) {
            (false, true) => write!(f, "{} pattern emerged", self.pattern),
            (true, false) => write!(f, "{} pattern disappeared", self.pattern),
            _ => write!(f, "{} pattern unchanged", self.pattern),
        }
    }
}

const PRESENTATION: &[&str] = &["controller", "api", "route"];
const BUSINESS: &[&str] = &["service", "business"];
const DATA: &[&str] = &["repository", "dao", "db"];
const CONTROLLERS: &[&str] = &["controller", "route"];
const MODELS: &[&str] = &["model", "entity"];
const PORTS: &[&str] = &["port", "interface"];
const ADAPTERS: &[&str] = &["adapter", "repository"];

fn matches_any(path: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| path.contains(k))
}

/// Keyword-based pattern detection over file paths.
pub struct PatternDetector;

impl PatternDetector {
    /// Evaluate every pattern, in [`PatternKind`] order.
    #[must_use]
    pub fn detect<S: AsRef<str>>(files: &[S]) -> Vec<PatternMatch> {
        let lowered: Vec<String> = files.iter().map(|f| f.as_ref().to_lowercase()).collect();
        vec![
            Self::layered(&lowered),
            Self::mvc(&lowered),
            Self::hexagonal(&lowered),
        ]
    }

    fn layered(files: &[String]) -> PatternMatch {
        // A file counts toward the first layer whose keywords it matches
        let mut layers: Vec<&str> = Vec::new();
        for file in files {
            let layer = if matches_any(file, PRESENTATION) {
                "presentation"
            } else if matches_any(file, BUSINESS) {
                "business"
            } else if matches_any(file, DATA) {
                "data"
            } else {
                continue;
            };
            if !layers.contains(&layer) {
                layers.push(layer);
            }
        }
        layers.sort_unstable();
        let detected = layers.len() >= 3;
        PatternMatch {
            pattern: PatternKind::Layered,
            detected,
            confidence: if detected { 0.8 } else { 0.3 },
            evidence: layers.iter().map(|l| format!("layer:{l}")).collect(),
        }
    }

    fn mvc(files: &[String]) -> PatternMatch {
        let controllers = files.iter().filter(|f| matches_any(f, CONTROLLERS)).count();
        let models = files.iter().filter(|f| matches_any(f, MODELS)).count();
        let detected = controllers > 0 && models > 0;
        PatternMatch {
            pattern: PatternKind::Mvc,
            detected,
            confidence: if detected { 0.9 } else { 0.2 },
            evidence: vec![format!("controllers:{controllers}"), format!("models:{models}")],
        }
    }

    fn hexagonal(files: &[String]) -> PatternMatch {
        let ports = files.iter().filter(|f| matches_any(f, PORTS)).count();
        let adapters = files.iter().filter(|f| matches_any(f, ADAPTERS)).count();
        let detected = ports > 0 && adapters > 0;
        PatternMatch {
            pattern: PatternKind::Hexagonal,
            detected,
            confidence: if detected { 0.7 } else { 0.1 },
            evidence: vec![format!("ports:{ports}"), format!("adapters:{adapters}")],
        }
    }
}

/// Patterns whose `detected` flag differs between `before` and `after`.
///
/// A pattern missing on one side counts as not detected there.
#[must_use]
pub fn pattern_changes(before: &[PatternMatch], after: &[PatternMatch]) -> Vec<PatternChange> {
    let detected = |list: &[PatternMatch], kind: PatternKind| {
        list.iter().any(|m| m.pattern == kind && m.detected)
    };
    [PatternKind::Layered, PatternKind::Mvc, PatternKind::Hexagonal]
        .into_iter()
        .map(|kind| PatternChange {
            pattern: kind,
            before: detected(before, kind),
            after: detected(after, kind),
        })
        .filter(|change| change.before != change.after)
        .collect()
}
