//! Confidence report for architectural claims.
//!
//! Every claim Ripple makes about a repository's structure rests on a
//! heuristic. The report states each claim with its confidence, the evidence
//! behind it and the situation in which it is known to be wrong.

use serde::Serialize;

use crate::graph::{GraphMetrics, HIGH_COUPLING_THRESHOLD};
use crate::patterns::{PatternKind, PatternMatch};

/// Claims listed in a report; `total_claims` counts all of them.
pub const MAX_CLAIMS: usize = 10;

/// Confidence at or above which a claim counts as high confidence.
pub const HIGH_CONFIDENCE: f64 = 0.8;

const COUPLING_CONFIDENCE: f64 = 0.92;
const CYCLE_CONFIDENCE: f64 = 1.0;
const MAX_EVIDENCE: usize = 5;

/// One architectural claim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Claim {
    /// Statement being made
    pub claim: String,
    /// Confidence in `0.0..=1.0`
    pub confidence: f64,
    /// What the confidence rests on
    pub reasoning: String,
    /// When the heuristic behind the claim fails
    pub failure_scenario: String,
    /// Files or counts backing the claim
    pub evidence: Vec<String>,
}

/// Claims about one repository's structure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceReport {
    /// Up to [`MAX_CLAIMS`] claims, patterns first
    pub claims: Vec<Claim>,
    /// Claims made before truncation
    pub total_claims: usize,
    /// One-line description of the claims
    pub summary: String,
}

impl ConfidenceReport {
    /// Claims for the detected patterns, the most coupled file and the first cycle.
    #[must_use]
    pub fn build(patterns: &[PatternMatch], metrics: &GraphMetrics) -> Self {
        let mut claims: Vec<Claim> = patterns
            .iter()
            .filter(|m| m.detected)
            .map(pattern_claim)
            .collect();
        claims.extend(coupling_claim(metrics));
        claims.extend(cycle_claim(metrics));

        let summary = summarize(&claims);
        let total_claims = claims.len();
        claims.truncate(MAX_CLAIMS);
        Self {
            claims,
            total_claims,
            summary,
        }
    }
}

fn pattern_claim(found: &PatternMatch) -> Claim {
    let (reasoning, failure) = match found.pattern {
        PatternKind::Layered => {
            let layers = found
                .evidence
                .iter()
                .filter_map(|e| e.strip_prefix("layer:"))
                .collect::<Vec<_>>();
            (
                format!("Found {} keyword layers: {}", layers.len(), layers.join(", ")),
                "Fails when layers are not separated by directory or file naming; logical layering without physical separation is invisible",
            )
        }
        PatternKind::Mvc => {
            let controllers = count(&found.evidence, "controllers");
            let models = count(&found.evidence, "models");
            let strength = if controllers + models >= 10 {
                "strong"
            } else if controllers + models >= 5 {
                "moderate"
            } else {
                "limited"
            };
            (
                format!("Found {controllers} controller and {models} model files, a {strength} MVC structure"),
                "Misses controllers or models with other names such as handlers, and single-file components",
            )
        }
        PatternKind::Hexagonal => {
            let ports = count(&found.evidence, "ports");
            let adapters = count(&found.evidence, "adapters");
            let extent = if ports >= 3 && adapters >= 3 {
                "a ports-and-adapters structure"
            } else {
                "a partial ports-and-adapters structure"
            };
            (
                format!("Found {ports} port and {adapters} adapter files, {extent}"),
                "Keyword matching misses other naming schemes and cannot verify that dependencies are actually inverted",
            )
        }
    };
    Claim {
        claim: format!("System follows the {} architecture pattern", found.pattern),
        confidence: round2(found.confidence),
        reasoning,
        failure_scenario: failure.to_string(),
        evidence: found.evidence.iter().take(MAX_EVIDENCE).cloned().collect(),
    }
}

fn coupling_claim(metrics: &GraphMetrics) -> Option<Claim> {
    let top = metrics.high_coupling.first()?;
    Some(Claim {
        claim: format!("{} has high coupling", file_name(&top.file)),
        confidence: COUPLING_CONFIDENCE,
        reasoning: format!(
            "Fan-in={}, fan-out={}, total={} exceeds the threshold ({HIGH_COUPLING_THRESHOLD})",
            top.fan_in,
            top.fan_out,
            top.total()
        ),
        failure_scenario: "Utility modules and central coordinators are coupled by design; dependency injection and tight coupling look the same".to_string(),
        evidence: vec![top.file.clone()],
    })
}

fn cycle_claim(metrics: &GraphMetrics) -> Option<Claim> {
    let cycle = metrics.cycles.first()?;
    let first = cycle.first()?;
    Some(Claim {
        claim: format!("Circular dependency detected in {}", file_name(first)),
        confidence: CYCLE_CONFIDENCE,
        reasoning: format!(
            "Static imports form a cycle of {} files; {} cycles found in total",
            cycle.len(),
            metrics.cycle_count
        ),
        failure_scenario: "Runtime and dynamic imports are not seen, so cycles created through them are missed".to_string(),
        evidence: cycle.iter().take(MAX_EVIDENCE).cloned().collect(),
    })
}

fn summarize(claims: &[Claim]) -> String {
    if claims.is_empty() {
        return "No architectural claims to report".to_string();
    }
    #[allow(clippy::cast_precision_loss)]
    let average = claims.iter().map(|c| c.confidence).sum::<f64>() / claims.len() as f64;
    let high = claims
        .iter()
        .filter(|c| c.confidence >= HIGH_CONFIDENCE)
        .count();
    format!(
        "Generated {} architectural claims with average confidence {average:.2}. {high} claims have high confidence (>= {HIGH_CONFIDENCE}).",
        claims.len()
    )
}

/// Value of a `name:count` evidence entry, 0 when absent.
fn count(evidence: &[String], name: &str) -> usize {
    evidence
        .iter()
        .filter_map(|e| e.split_once(':'))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(0)
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::CouplingEntry;
    use crate::patterns::PatternDetector;

    fn metrics() -> GraphMetrics {
        GraphMetrics {
            total_files: 4,
            total_dependencies: 7,
            avg_coupling: 1.75,
            cycle_count: 1,
            cycles: vec![vec!["src/a.py".into(), "src/b.py".into()]],
            high_coupling: vec![CouplingEntry {
                file: "src/hub.py".into(),
                fan_in: 4,
                fan_out: 3,
            }],
        }
    }

    fn quiet() -> GraphMetrics {
        GraphMetrics {
            total_files: 1,
            total_dependencies: 0,
            avg_coupling: 0.0,
            cycle_count: 0,
            cycles: Vec::new(),
            high_coupling: Vec::new(),
        }
    }

    #[test]
    fn claims_cover_patterns_coupling_and_cycles() {
        let patterns = PatternDetector::detect(&[
            "app/controllers/orders.py",
            "app/models/order.py",
            "app/models/invoice.py",
        ]);

        let report = ConfidenceReport::build(&patterns, &metrics());

        let statements: Vec<_> = report.claims.iter().map(|c| c.claim.as_str()).collect();
        assert_eq!(
            statements,
            vec![
                "System follows the mvc architecture pattern",
                "hub.py has high coupling",
                "Circular dependency detected in a.py",
            ]
        );
        assert!((report.claims[0].confidence - 0.9).abs() < f64::EPSILON);
        assert!(report.claims[0].reasoning.contains("1 controller and 2 model files"));
        assert!(report.claims[1].reasoning.contains("total=7"));
        assert_eq!(report.claims[2].evidence, vec!["src/a.py", "src/b.py"]);
        assert_eq!(report.total_claims, 3);
        assert!(report.summary.starts_with("Generated 3 architectural claims"));
        assert!(report.summary.contains("3 claims have high confidence"));
    }

    #[test]
    fn undetected_patterns_make_no_claims() {
        let patterns = PatternDetector::detect(&["main.py", "util.py"]);

        let report = ConfidenceReport::build(&patterns, &quiet());

        assert!(report.claims.is_empty());
        assert_eq!(report.total_claims, 0);
        assert_eq!(report.summary, "No architectural claims to report");
    }

    #[test]
    fn evidence_counts_default_to_zero() {
        let evidence = vec!["ports:2".to_string(), "garbage".to_string()];
        assert_eq!(count(&evidence, "ports"), 2);
        assert_eq!(count(&evidence, "adapters"), 0);
    }
}
