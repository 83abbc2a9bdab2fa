//! Derived metrics over the file dependency graph.
//!
//! Works against any [`GraphStore`]: the `depends_on` edges are copied into a
//! compact petgraph `DiGraph` and analyzed there.

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use super::GraphStore;
use super::types::{EdgeKind, NodeKey, NodeKind};
use crate::error::Result;

/// Cycles listed in [`GraphMetrics::cycles`]; `cycle_count` may be larger.
pub const MAX_REPORTED_CYCLES: usize = 100;

/// Enumeration stops after this many cycles.
const MAX_ENUMERATED_CYCLES: usize = 10_000;

/// Files with `fan_in + fan_out` above this are reported as highly coupled.
pub(crate) const HIGH_COUPLING_THRESHOLD: usize = 5;

/// Fan-in and fan-out of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouplingEntry {
    /// Repository-relative path
    pub file: String,
    /// Files depending on this one
    pub fan_in: usize,
    /// Files this one depends on
    pub fan_out: usize,
}

impl CouplingEntry {
    /// Sum of fan-in and fan-out.
    #[must_use]
    pub fn total(&self) -> usize {
        self.fan_in + self.fan_out
    }
}

/// Summary numbers for one dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMetrics {
    /// Number of file nodes
    pub total_files: usize,
    /// Number of `depends_on` edges
    pub total_dependencies: usize,
    /// `total_dependencies / max(total_files, 1)`
    pub avg_coupling: f64,
    /// Number of elementary cycles found (capped at an enumeration limit)
    pub cycle_count: usize,
    /// Up to [`MAX_REPORTED_CYCLES`] cycles, each starting at its smallest path
    pub cycles: Vec<Vec<String>>,
    /// Files above the coupling threshold, most coupled first
    pub high_coupling: Vec<CouplingEntry>,
}

impl GraphMetrics {
    /// Compute metrics for the graph held by `store`.
    ///
    /// # Errors
    ///
    /// Propagates failures of the underlying store.
    pub fn compute(store: &dyn GraphStore) -> Result<Self> {
        let files: Vec<String> = store
            .nodes(NodeKind::File)?
            .into_iter()
            .filter_map(|node| match node.key {
                NodeKey::File { path } => Some(path),
                _ => None,
            })
            .collect();
        let edges = store.edges(EdgeKind::DependsOn)?;

        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        for (position, path) in files.iter().enumerate() {
            index.insert(path.as_str(), graph.add_node(position));
        }
        let mut fan: Vec<(usize, usize)> = vec![(0, 0); files.len()];
        for edge in &edges {
            let (Some(from), Some(to)) = (
                edge.from.owning_file().and_then(|p| index.get(p)),
                edge.to.owning_file().and_then(|p| index.get(p)),
            ) else {
                continue;
            };
            graph.add_edge(*from, *to, ());
            fan[from.index()].1 += 1;
            fan[to.index()].0 += 1;
        }

        let cycles = elementary_cycles(&graph);
        let mut high_coupling: Vec<CouplingEntry> = files
            .iter()
            .zip(&fan)
            .map(|(file, &(fan_in, fan_out))| CouplingEntry {
                file: file.clone(),
                fan_in,
                fan_out,
            })
            .filter(|entry| entry.total() > HIGH_COUPLING_THRESHOLD)
            .collect();
        high_coupling.sort_by(|a, b| b.total().cmp(&a.total()).then_with(|| a.file.cmp(&b.file)));

        #[allow(clippy::cast_precision_loss)]
        let avg_coupling = edges.len() as f64 / files.len().max(1) as f64;

        Ok(Self {
            total_files: files.len(),
            total_dependencies: edges.len(),
            avg_coupling,
            cycle_count: cycles.len(),
            cycles: cycles
                .into_iter()
                .take(MAX_REPORTED_CYCLES)
                .map(|cycle| cycle.into_iter().map(|i| files[i].clone()).collect())
                .collect(),
            high_coupling,
        })
    }
}

/// Enumerate elementary cycles, each rooted at its smallest node.
///
/// Within every strongly connected component, a cycle is found from its
/// smallest member `s` by only stepping through members greater than `s`,
/// so each cycle is produced exactly once.
fn elementary_cycles(graph: &DiGraph<usize, ()>) -> Vec<Vec<usize>> {
    let mut cycles = Vec::new();
    let mut components = tarjan_scc(graph);
    for component in &mut components {
        component.sort_by_key(|n| graph[*n]);
    }
    components.sort_by_key(|c| c.first().map(|n| graph[*n]));

    for component in components.iter().filter(|c| c.len() > 1) {
        for &root in component {
            let root_value = graph[root];
            let mut stack: Vec<(NodeIndex, Vec<NodeIndex>)> = vec![(root, vec![root])];
            while let Some((current, path)) = stack.pop() {
                let mut successors: Vec<NodeIndex> = graph.neighbors(current).collect();
                successors.sort_by_key(|n| std::cmp::Reverse(graph[*n]));
                successors.dedup();
                for next in successors {
                    if next == root {
                        cycles.push(path.iter().map(|n| graph[*n]).collect());
                        if cycles.len() >= MAX_ENUMERATED_CYCLES {
                            return cycles;
                        }
                    } else if graph[next] > root_value
                        && component.contains(&next)
                        && !path.contains(&next)
                    {
                        let mut extended = path.clone();
                        extended.push(next);
                        stack.push((next, extended));
                    }
                }
            }
        }
    }
    cycles.sort();
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, MemoryGraph, Node};

    fn graph_with(edges: &[(&str, &str)], isolated: &[&str]) -> MemoryGraph {
        let graph = MemoryGraph::new();
        for path in isolated {
            graph.add_node(&Node::bare(NodeKey::file(*path))).expect("node");
        }
        for (from, to) in edges {
            graph
                .add_edge(&Edge {
                    from: NodeKey::file(*from),
                    to: NodeKey::file(*to),
                    kind: EdgeKind::DependsOn,
                })
                .expect("edge");
        }
        graph
    }

    #[test]
    fn empty_graph_has_zero_coupling() {
        let metrics = GraphMetrics::compute(&MemoryGraph::new()).expect("metrics");
        assert_eq!(metrics.total_files, 0);
        assert!(metrics.avg_coupling.abs() < f64::EPSILON);
        assert_eq!(metrics.cycle_count, 0);
    }

    #[test]
    fn average_coupling_counts_isolated_files() {
        let graph = graph_with(&[("a", "b"), ("b", "c")], &["d"]);
        let metrics = GraphMetrics::compute(&graph).expect("metrics");

        assert_eq!(metrics.total_files, 4);
        assert_eq!(metrics.total_dependencies, 2);
        assert!((metrics.avg_coupling - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn cycles_are_found_once_and_start_at_smallest_path() {
        // Two cycles sharing b: a->b->a and b->c->d->b
        let graph = graph_with(&[("a", "b"), ("b", "a"), ("b", "c"), ("c", "d"), ("d", "b")], &[]);
        let metrics = GraphMetrics::compute(&graph).expect("metrics");

        assert_eq!(metrics.cycle_count, 2);
        assert_eq!(
            metrics.cycles,
            vec![vec!["a".to_string(), "b".into()], vec!["b".into(), "c".into(), "d".into()]]
        );
    }

    #[test]
    fn hub_file_is_reported_as_highly_coupled() {
        let edges: Vec<(String, String)> = (0..6).map(|i| (format!("user{i}"), "hub".to_string())).collect();
        let borrowed: Vec<(&str, &str)> = edges.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let metrics = GraphMetrics::compute(&graph_with(&borrowed, &[])).expect("metrics");

        assert_eq!(metrics.high_coupling.len(), 1);
        assert_eq!(metrics.high_coupling[0].file, "hub");
        assert_eq!(metrics.high_coupling[0].fan_in, 6);
    }
}
