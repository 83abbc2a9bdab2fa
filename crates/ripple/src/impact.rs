//! Blast-radius analysis.
//!
//! Given a target file and a kind of change, finds the files that depend on it
//! directly (one `depends_on` hop) and indirectly (two or three hops), the
//! external callers of each function it declares, and turns those counts into
//! a bounded risk score.
//!
//! ## Traversal bound
//!
//! Indirect dependents are those whose shortest dependency path into the
//! target has [`INDIRECT_MIN_HOPS`] to [`INDIRECT_MAX_HOPS`] edges. Files four
//! or more hops away are never reported: past that point a dependency is
//! rarely affected by a change in practice, and the traversal cost grows with
//! every extra hop.
//!
//! ## Function callers
//!
//! A file that calls a function of the target usually also depends on it, so
//! function callers overlap with direct dependents. [`CallerPolicy`] decides
//! whether that overlap counts twice when scoring a delete.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::graph::{Direction, EdgeKind, GraphStore, NodeKey, NodeKind};
use crate::types::{ChangeType, RiskLevel};

/// Fewest hops for an indirect dependent.
pub const INDIRECT_MIN_HOPS: u32 = 2;

/// Most hops explored for indirect dependents.
pub const INDIRECT_MAX_HOPS: u32 = 3;

const MAX_SCORE: u32 = 100;

/// How external function callers enter the delete score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallerPolicy {
    /// Every calling file counts, even when it is also a direct dependent
    #[default]
    Additive,
    /// Calling files that are already direct dependents are not counted again
    DedupAgainstDirect,
}

impl CallerPolicy {
    /// Name used in configuration.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Additive => "additive",
            Self::DedupAgainstDirect => "dedup-against-direct",
        }
    }
}

/// External callers of one function declared in the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionImpact {
    /// Function name
    pub name: String,
    /// Declaration line, when known
    pub line: Option<u32>,
    /// Other files calling it, sorted
    pub callers: Vec<String>,
    /// `callers.len()`
    pub caller_count: usize,
}

/// Function-level part of an impact result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionsAffected {
    /// Every function declared in the target, by name
    pub functions: Vec<FunctionImpact>,
    /// Distinct files calling any of them, sorted
    pub callers: Vec<String>,
    /// `functions.len()`
    pub total_functions: usize,
}

/// Counts that went into the score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactBreakdown {
    /// Direct dependents
    pub direct_count: usize,
    /// Indirect dependents
    pub indirect_count: usize,
    /// Calling files counted under the active [`CallerPolicy`]
    pub function_callers: usize,
    /// Functions declared in the target
    pub function_count: usize,
}

/// Blast radius of one simulated change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactResult {
    /// Target file
    pub file: String,
    /// Simulated change
    pub change_type: ChangeType,
    /// Files one hop away, sorted
    pub direct_dependents: Vec<String>,
    /// Files two or three hops away and not direct, sorted
    pub indirect_dependents: Vec<String>,
    /// `direct + indirect`
    pub total_affected: usize,
    /// External callers of the target's functions
    pub functions_affected: FunctionsAffected,
    /// Bucketed score
    pub risk_level: RiskLevel,
    /// Score in `0..=100`
    pub risk_score: u32,
    /// Inputs to the score
    pub impact_breakdown: ImpactBreakdown,
}

/// Blast-radius queries over a [`GraphStore`].
pub struct ImpactAnalyzer<'a> {
    store: &'a dyn GraphStore,
    policy: CallerPolicy,
}

impl<'a> ImpactAnalyzer<'a> {
    /// Create an analyzer with the given caller policy.
    #[must_use]
    pub fn new(store: &'a dyn GraphStore, policy: CallerPolicy) -> Self {
        Self { store, policy }
    }

    /// Compute the blast radius of changing `file`.
    ///
    /// A file absent from the graph has no dependents and scores zero.
    ///
    /// # Errors
    ///
    /// Propagates store failures, so an unreachable store is never mistaken
    /// for a file nobody depends on.
    pub fn analyze(&self, file: &str, change_type: ChangeType) -> Result<ImpactResult> {
        let target = NodeKey::file(file);

        let reached = self.store.reachable(
            &target,
            EdgeKind::DependsOn,
            Direction::Incoming,
            1,
            INDIRECT_MAX_HOPS,
        )?;
        let mut direct = BTreeSet::new();
        let mut indirect = BTreeSet::new();
        for hit in reached {
            let Some(path) = hit.node.owning_file() else {
                continue;
            };
            if path == file {
                continue;
            }
            if hit.hops < INDIRECT_MIN_HOPS {
                direct.insert(path.to_string());
            } else {
                indirect.insert(path.to_string());
            }
        }
        indirect.retain(|path| !direct.contains(path));

        let functions_affected = self.functions_affected(file)?;
        let function_callers = match self.policy {
            CallerPolicy::Additive => functions_affected.callers.len(),
            CallerPolicy::DedupAgainstDirect => functions_affected
                .callers
                .iter()
                .filter(|caller| !direct.contains(*caller))
                .count(),
        };

        let breakdown = ImpactBreakdown {
            direct_count: direct.len(),
            indirect_count: indirect.len(),
            function_callers,
            function_count: functions_affected.total_functions,
        };
        let (risk_score, risk_level) = score(change_type, &breakdown);

        debug!(
            file,
            change = change_type.as_str(),
            direct = breakdown.direct_count,
            indirect = breakdown.indirect_count,
            callers = breakdown.function_callers,
            score = risk_score,
            "computed impact"
        );

        Ok(ImpactResult {
            file: file.to_string(),
            change_type,
            total_affected: direct.len() + indirect.len(),
            direct_dependents: direct.into_iter().collect(),
            indirect_dependents: indirect.into_iter().collect(),
            functions_affected,
            risk_level,
            risk_score,
            impact_breakdown: breakdown,
        })
    }

    fn functions_affected(&self, file: &str) -> Result<FunctionsAffected> {
        let mut functions = Vec::new();
        let mut all_callers = BTreeSet::new();

        for node in self.store.nodes(NodeKind::Function)? {
            let NodeKey::Function { file: owner, name } = &node.key else {
                continue;
            };
            if owner != file {
                continue;
            }
            let callers: BTreeSet<String> = self
                .store
                .neighbors(&node.key, EdgeKind::Calls, Direction::Incoming)?
                .iter()
                .filter_map(NodeKey::owning_file)
                .filter(|caller| *caller != file)
                .map(String::from)
                .collect();
            all_callers.extend(callers.iter().cloned());
            functions.push(FunctionImpact {
                name: name.clone(),
                line: node.line,
                caller_count: callers.len(),
                callers: callers.into_iter().collect(),
            });
        }

        Ok(FunctionsAffected {
            total_functions: functions.len(),
            functions,
            callers: all_callers.into_iter().collect(),
        })
    }
}

/// Score and level for a change, from the counts in `breakdown`.
#[must_use]
pub fn score(change_type: ChangeType, breakdown: &ImpactBreakdown) -> (u32, RiskLevel) {
    let count = |n: usize| u32::try_from(n).unwrap_or(u32::MAX);
    let direct = count(breakdown.direct_count);

    match change_type {
        ChangeType::Delete => {
            let raw = direct
                .saturating_mul(30)
                .saturating_add(count(breakdown.function_callers).saturating_mul(20))
                .saturating_add(count(breakdown.function_count).saturating_mul(10));
            let score = raw.min(MAX_SCORE);
            let level = match score {
                100.. => RiskLevel::Critical,
                60.. => RiskLevel::High,
                30.. => RiskLevel::Medium,
                _ => RiskLevel::Low,
            };
            (score, level)
        }
        ChangeType::Move => {
            let score = direct.saturating_mul(8).min(MAX_SCORE);
            let level = if score > 80 {
                RiskLevel::High
            } else if score > 40 {
                RiskLevel::Medium
            } else {
                RiskLevel::Low
            };
            (score, level)
        }
        ChangeType::Modify => {
            let total = direct.saturating_add(count(breakdown.indirect_count));
            let score = total.saturating_mul(5).min(MAX_SCORE);
            let level = if total > 15 {
                RiskLevel::High
            } else if total > 8 {
                RiskLevel::Medium
            } else {
                RiskLevel::Low
            };
            (score, level)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, MemoryGraph, Node};
    use rstest::rstest;

    fn depends(store: &MemoryGraph, from: &str, to: &str) {
        store
            .add_edge(&Edge {
                from: NodeKey::file(from),
                to: NodeKey::file(to),
                kind: EdgeKind::DependsOn,
            })
            .expect("edge");
    }

    fn calls(store: &MemoryGraph, from_file: &str, to_file: &str, function: &str) {
        store
            .add_edge(&Edge {
                from: NodeKey::file(from_file),
                to: NodeKey::function(to_file, function),
                kind: EdgeKind::Calls,
            })
            .expect("edge");
    }

    fn breakdown(direct: usize, indirect: usize, callers: usize, functions: usize) -> ImpactBreakdown {
        ImpactBreakdown {
            direct_count: direct,
            indirect_count: indirect,
            function_callers: callers,
            function_count: functions,
        }
    }

    // === Scoring ===

    #[rstest]
    #[case(ChangeType::Modify, breakdown(8, 0, 3, 2), 40, RiskLevel::Low)]
    #[case(ChangeType::Modify, breakdown(9, 0, 0, 0), 45, RiskLevel::Medium)]
    #[case(ChangeType::Modify, breakdown(10, 6, 0, 0), 80, RiskLevel::High)]
    #[case(ChangeType::Modify, breakdown(30, 0, 0, 0), 100, RiskLevel::High)]
    #[case(ChangeType::Delete, breakdown(8, 0, 3, 2), 100, RiskLevel::Critical)]
    #[case(ChangeType::Delete, breakdown(2, 0, 0, 0), 60, RiskLevel::High)]
    #[case(ChangeType::Delete, breakdown(1, 0, 0, 0), 30, RiskLevel::Medium)]
    #[case(ChangeType::Delete, breakdown(0, 0, 1, 0), 20, RiskLevel::Low)]
    #[case(ChangeType::Move, breakdown(5, 0, 0, 0), 40, RiskLevel::Low)]
    #[case(ChangeType::Move, breakdown(6, 0, 0, 0), 48, RiskLevel::Medium)]
    #[case(ChangeType::Move, breakdown(11, 0, 0, 0), 88, RiskLevel::High)]
    #[case(ChangeType::Move, breakdown(40, 9, 9, 9), 100, RiskLevel::High)]
    fn scores_follow_change_type_formula(
        #[case] change: ChangeType,
        #[case] counts: ImpactBreakdown,
        #[case] expected_score: u32,
        #[case] expected_level: RiskLevel,
    ) {
        assert_eq!(score(change, &counts), (expected_score, expected_level));
    }

    // === Traversal ===

    #[test]
    fn direct_and_indirect_are_disjoint_and_bounded() {
        // e -> d -> c -> b -> target, and b also depends on target directly via a
        let store = MemoryGraph::new();
        depends(&store, "b.py", "target.py");
        depends(&store, "c.py", "b.py");
        depends(&store, "d.py", "c.py");
        depends(&store, "e.py", "d.py");
        depends(&store, "c.py", "target.py");

        let result = ImpactAnalyzer::new(&store, CallerPolicy::Additive)
            .analyze("target.py", ChangeType::Modify)
            .expect("impact");

        assert_eq!(result.direct_dependents, vec!["b.py", "c.py"]);
        assert_eq!(result.indirect_dependents, vec!["d.py", "e.py"]);
        assert_eq!(result.total_affected, 4);
    }

    #[test]
    fn files_four_hops_away_are_not_reported() {
        let store = MemoryGraph::new();
        depends(&store, "a.py", "t.py");
        depends(&store, "b.py", "a.py");
        depends(&store, "c.py", "b.py");
        depends(&store, "d.py", "c.py");

        let result = ImpactAnalyzer::new(&store, CallerPolicy::Additive)
            .analyze("t.py", ChangeType::Modify)
            .expect("impact");

        assert!(!result.indirect_dependents.contains(&"d.py".to_string()));
        assert_eq!(result.indirect_dependents, vec!["b.py", "c.py"]);
    }

    #[test]
    fn cycle_back_to_target_does_not_list_target() {
        let store = MemoryGraph::new();
        depends(&store, "a.py", "t.py");
        depends(&store, "t.py", "a.py");

        let result = ImpactAnalyzer::new(&store, CallerPolicy::Additive)
            .analyze("t.py", ChangeType::Delete)
            .expect("impact");

        assert_eq!(result.direct_dependents, vec!["a.py"]);
        assert!(result.indirect_dependents.is_empty());
    }

    #[test]
    fn unknown_file_has_empty_low_risk_result() {
        let store = MemoryGraph::new();
        let result = ImpactAnalyzer::new(&store, CallerPolicy::Additive)
            .analyze("missing.py", ChangeType::Delete)
            .expect("impact");

        assert_eq!(result.total_affected, 0);
        assert_eq!(result.risk_score, 0);
        assert_eq!(result.risk_level, RiskLevel::Low);
    }

    // === Function callers ===

    #[test]
    fn self_calls_are_not_callers() {
        let store = MemoryGraph::new();
        store
            .add_node(&Node {
                key: NodeKey::function("util.py", "helper"),
                language: None,
                line: Some(3),
            })
            .expect("node");
        calls(&store, "util.py", "util.py", "helper");

        let result = ImpactAnalyzer::new(&store, CallerPolicy::Additive)
            .analyze("util.py", ChangeType::Delete)
            .expect("impact");

        let helper = &result.functions_affected.functions[0];
        assert_eq!(helper.name, "helper");
        assert_eq!(helper.line, Some(3));
        assert!(helper.callers.is_empty());
        assert!(result.functions_affected.callers.is_empty());
    }

    #[test]
    fn function_to_function_calls_count_the_calling_file() {
        let store = MemoryGraph::new();
        store
            .add_edge(&Edge {
                from: NodeKey::function("app.py", "main"),
                to: NodeKey::function("util.py", "helper"),
                kind: EdgeKind::Calls,
            })
            .expect("edge");

        let result = ImpactAnalyzer::new(&store, CallerPolicy::Additive)
            .analyze("util.py", ChangeType::Modify)
            .expect("impact");

        assert_eq!(result.functions_affected.callers, vec!["app.py"]);
    }

    #[rstest]
    #[case(CallerPolicy::Additive, 2, 80)]
    #[case(CallerPolicy::DedupAgainstDirect, 1, 60)]
    fn caller_policy_decides_overlap_counting(
        #[case] policy: CallerPolicy,
        #[case] counted: usize,
        #[case] expected_score: u32,
    ) {
        // app.py both imports and calls; job.py only calls
        let store = MemoryGraph::new();
        depends(&store, "app.py", "util.py");
        calls(&store, "app.py", "util.py", "helper");
        calls(&store, "job.py", "util.py", "helper");

        let result = ImpactAnalyzer::new(&store, policy)
            .analyze("util.py", ChangeType::Delete)
            .expect("impact");

        // Both policies report every caller
        assert_eq!(result.functions_affected.callers, vec!["app.py", "job.py"]);
        assert_eq!(result.impact_breakdown.function_callers, counted);
        // 30 * 1 direct + 20 * counted + 10 * 1 function
        assert_eq!(result.risk_score, expected_score);
    }

    #[test]
    fn caller_policy_uses_kebab_case_names() {
        let policy: CallerPolicy =
            serde_json::from_str("\"dedup-against-direct\"").expect("deserialize");
        assert_eq!(policy, CallerPolicy::DedupAgainstDirect);
        assert_eq!(CallerPolicy::default().as_str(), "additive");
    }
}
