//! In-process graph backend using petgraph.
//!
//! Nodes live in a `StableDiGraph` so removals keep the remaining indices
//! valid; a `HashMap<NodeKey, NodeIndex>` is the reverse lookup from keys to
//! indices. Fan-in comes from walking `Direction::Incoming` edges, which
//! petgraph keeps linked per node.
//!
//! # Edge Direction Reminder
//!
//! Edges point from **dependent → dependency**: `a.py → b.py` means `a.py`
//! imports `b.py`. Blast-radius queries therefore walk incoming edges.

use std::collections::{HashMap, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use petgraph::Direction as PetDirection;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;

use super::types::{Direction, Edge, EdgeKind, Node, NodeKey, NodeKind, Reached};
use super::{GraphStore, sort_paths};
use crate::error::{Error, Result};

#[derive(Default)]
struct Inner {
    graph: StableDiGraph<Node, EdgeKind>,
    node_map: HashMap<NodeKey, NodeIndex>,
}

impl Inner {
    fn ensure(&mut self, key: &NodeKey) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(key) {
            return idx;
        }
        let idx = self.graph.add_node(Node::bare(key.clone()));
        self.node_map.insert(key.clone(), idx);
        idx
    }

    fn step(&self, idx: NodeIndex, kind: EdgeKind, direction: Direction) -> Vec<NodeIndex> {
        let pet = match direction {
            Direction::Outgoing => PetDirection::Outgoing,
            Direction::Incoming => PetDirection::Incoming,
        };
        self.graph
            .edges_directed(idx, pet)
            .filter(|edge| *edge.weight() == kind)
            .map(|edge| match direction {
                Direction::Outgoing => edge.target(),
                Direction::Incoming => edge.source(),
            })
            .collect()
    }

    fn key(&self, idx: NodeIndex) -> &NodeKey {
        &self.graph[idx].key
    }
}

/// Thread-safe in-memory [`GraphStore`].
#[derive(Default)]
pub struct MemoryGraph {
    inner: RwLock<Inner>,
}

impl MemoryGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes of every kind.
    ///
    /// # Errors
    ///
    /// Fails only if a writer panicked while holding the lock.
    pub fn node_count(&self) -> Result<usize> {
        Ok(self.read()?.graph.node_count())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| Error::Internal(format!("graph lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| Error::Internal(format!("graph lock poisoned: {e}")))
    }
}

impl GraphStore for MemoryGraph {
    fn add_node(&self, node: &Node) -> Result<()> {
        let mut inner = self.write()?;
        let idx = inner.ensure(&node.key);
        inner.graph[idx] = node.clone();
        Ok(())
    }

    fn add_edge(&self, edge: &Edge) -> Result<()> {
        if edge.from == edge.to {
            return Ok(());
        }
        let mut inner = self.write()?;
        let from = inner.ensure(&edge.from);
        let to = inner.ensure(&edge.to);
        let exists = inner
            .graph
            .edges_directed(from, PetDirection::Outgoing)
            .any(|e| e.target() == to && *e.weight() == edge.kind);
        if !exists {
            inner.graph.add_edge(from, to, edge.kind);
        }
        Ok(())
    }

    fn contains(&self, key: &NodeKey) -> Result<bool> {
        Ok(self.read()?.node_map.contains_key(key))
    }

    fn nodes(&self, kind: NodeKind) -> Result<Vec<Node>> {
        let inner = self.read()?;
        let mut nodes: Vec<Node> = inner
            .graph
            .node_indices()
            .map(|idx| &inner.graph[idx])
            .filter(|n| n.key.kind() == kind)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(nodes)
    }

    fn edges(&self, kind: EdgeKind) -> Result<Vec<Edge>> {
        let inner = self.read()?;
        let mut edges: Vec<Edge> = inner
            .graph
            .edge_indices()
            .filter(|&e| inner.graph[e] == kind)
            .filter_map(|e| inner.graph.edge_endpoints(e))
            .map(|(source, target)| Edge {
                from: inner.key(source).clone(),
                to: inner.key(target).clone(),
                kind,
            })
            .collect();
        edges.sort();
        Ok(edges)
    }

    fn neighbors(
        &self,
        key: &NodeKey,
        kind: EdgeKind,
        direction: Direction,
    ) -> Result<Vec<NodeKey>> {
        let inner = self.read()?;
        let Some(&idx) = inner.node_map.get(key) else {
            return Ok(Vec::new());
        };
        let mut keys: Vec<NodeKey> = inner
            .step(idx, kind, direction)
            .into_iter()
            .map(|n| inner.key(n).clone())
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    fn reachable(
        &self,
        key: &NodeKey,
        kind: EdgeKind,
        direction: Direction,
        min_hops: u32,
        max_hops: u32,
    ) -> Result<Vec<Reached>> {
        let inner = self.read()?;
        let Some(&start) = inner.node_map.get(key) else {
            return Ok(Vec::new());
        };

        // BFS visits each node first at its minimum hop count
        let mut hops_to: HashMap<NodeIndex, u32> = HashMap::from([(start, 0)]);
        let mut queue: VecDeque<(NodeIndex, u32)> = VecDeque::from([(start, 0)]);
        while let Some((current, hops)) = queue.pop_front() {
            if hops >= max_hops {
                continue;
            }
            for next in inner.step(current, kind, direction) {
                if !hops_to.contains_key(&next) {
                    hops_to.insert(next, hops + 1);
                    queue.push_back((next, hops + 1));
                }
            }
        }

        let mut reached: Vec<Reached> = hops_to
            .into_iter()
            .filter(|&(idx, hops)| idx != start && (min_hops..=max_hops).contains(&hops))
            .map(|(idx, hops)| Reached {
                hops,
                node: inner.key(idx).clone(),
            })
            .collect();
        reached.sort();
        Ok(reached)
    }

    fn bounded_paths(
        &self,
        from: &NodeKey,
        to: &NodeKey,
        kind: EdgeKind,
        min_hops: u32,
        max_hops: u32,
    ) -> Result<Vec<Vec<NodeKey>>> {
        let inner = self.read()?;
        let (Some(&start), Some(&goal)) = (inner.node_map.get(from), inner.node_map.get(to))
        else {
            return Ok(Vec::new());
        };

        let mut found: Vec<Vec<NodeKey>> = Vec::new();
        let mut stack: Vec<(NodeIndex, Vec<NodeIndex>)> = vec![(start, vec![start])];
        while let Some((current, path)) = stack.pop() {
            let hops = u32::try_from(path.len() - 1).unwrap_or(u32::MAX);
            if current == goal && hops > 0 {
                if hops >= min_hops {
                    found.push(path.iter().map(|&n| inner.key(n).clone()).collect());
                }
                continue;
            }
            if hops >= max_hops {
                continue;
            }
            for next in inner.step(current, kind, Direction::Outgoing) {
                if !path.contains(&next) || (next == goal && start == goal) {
                    let mut extended = path.clone();
                    extended.push(next);
                    stack.push((next, extended));
                }
            }
        }

        sort_paths(&mut found);
        found.dedup();
        Ok(found)
    }

    fn remove_file(&self, path: &str) -> Result<()> {
        let mut inner = self.write()?;
        let doomed: Vec<NodeKey> = inner
            .node_map
            .keys()
            .filter(|key| {
                matches!(key, NodeKey::File { .. } | NodeKey::Function { .. })
                    && key.owning_file() == Some(path)
            })
            .cloned()
            .collect();
        for key in doomed {
            if let Some(idx) = inner.node_map.remove(&key) {
                inner.graph.remove_node(idx);
            }
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self.write()?;
        inner.graph.clear();
        inner.node_map.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depends(graph: &MemoryGraph, from: &str, to: &str) {
        graph
            .add_edge(&Edge {
                from: NodeKey::file(from),
                to: NodeKey::file(to),
                kind: EdgeKind::DependsOn,
            })
            .expect("add edge");
    }

    #[test]
    fn edges_are_deduplicated_and_self_loops_ignored() {
        let graph = MemoryGraph::new();
        depends(&graph, "a", "b");
        depends(&graph, "a", "b");
        depends(&graph, "a", "a");

        assert_eq!(graph.edges(EdgeKind::DependsOn).expect("edges").len(), 1);
    }

    #[test]
    fn add_node_updates_attributes_of_existing_node() {
        let graph = MemoryGraph::new();
        depends(&graph, "a.py", "b.py");
        graph
            .add_node(&Node {
                key: NodeKey::file("b.py"),
                language: Some(crate::types::Language::Python),
                line: None,
            })
            .expect("add node");

        let nodes = graph.nodes(NodeKind::File).expect("nodes");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].language, Some(crate::types::Language::Python));
    }

    #[test]
    fn reachable_reports_minimum_hops_and_excludes_start_in_cycle() {
        // d -> c -> b -> a, and a -> d closes a cycle
        let graph = MemoryGraph::new();
        depends(&graph, "b", "a");
        depends(&graph, "c", "b");
        depends(&graph, "d", "c");
        depends(&graph, "a", "d");
        depends(&graph, "d", "a");

        let reached = graph
            .reachable(&NodeKey::file("a"), EdgeKind::DependsOn, Direction::Incoming, 1, 3)
            .expect("reachable");

        let summary: Vec<(u32, String)> = reached
            .iter()
            .map(|r| (r.hops, r.node.encode()))
            .collect();
        assert_eq!(
            summary,
            vec![(1, "b".into()), (1, "d".into()), (2, "c".into())]
        );
    }

    #[test]
    fn bounded_paths_respects_hop_window() {
        let graph = MemoryGraph::new();
        depends(&graph, "a", "b");
        depends(&graph, "b", "c");
        depends(&graph, "a", "c");
        depends(&graph, "c", "d");

        let paths = graph
            .bounded_paths(&NodeKey::file("a"), &NodeKey::file("d"), EdgeKind::DependsOn, 2, 3)
            .expect("paths");

        let rendered: Vec<Vec<String>> = paths
            .iter()
            .map(|p| p.iter().map(NodeKey::encode).collect())
            .collect();
        assert_eq!(
            rendered,
            vec![vec!["a", "c", "d"], vec!["a", "b", "c", "d"]]
        );

        let too_short = graph
            .bounded_paths(&NodeKey::file("a"), &NodeKey::file("d"), EdgeKind::DependsOn, 4, 5)
            .expect("paths");
        assert!(too_short.is_empty());
    }

    #[test]
    fn remove_file_drops_its_functions_and_edges() {
        let graph = MemoryGraph::new();
        depends(&graph, "a.py", "b.py");
        graph
            .add_edge(&Edge {
                from: NodeKey::file("a.py"),
                to: NodeKey::function("b.py", "run"),
                kind: EdgeKind::Calls,
            })
            .expect("add edge");

        graph.remove_file("b.py").expect("remove");

        assert!(!graph.contains(&NodeKey::function("b.py", "run")).expect("contains"));
        assert!(graph.edges(EdgeKind::DependsOn).expect("edges").is_empty());
        assert_eq!(graph.node_count().expect("count"), 1);
    }

    #[test]
    fn unknown_node_has_no_neighbors() {
        let graph = MemoryGraph::new();
        let found = graph
            .neighbors(&NodeKey::file("ghost"), EdgeKind::DependsOn, Direction::Incoming)
            .expect("neighbors");
        assert!(found.is_empty());
        assert_eq!(graph.fan_in(&NodeKey::file("ghost")).expect("fan in"), 0);
    }
}
