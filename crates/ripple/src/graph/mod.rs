//! Dependency graph model.
//!
//! - `types` - node keys, edge kinds, traversal results
//! - `builder` - turns parsed files into a [`DependencyGraph`]
//! - `memory` - in-process [`GraphStore`] backed by petgraph
//! - `metrics` - fan-in/out, coupling and cycle detection over any [`GraphStore`]
//!
//! ## Design
//!
//! Every consumer (impact analysis, metrics, snapshots) talks to the
//! [`GraphStore`] trait and never to a backend directly. The persisted
//! backend lives in `db::graph` and answers the same operations with
//! recursive SQL; the in-memory backend mirrors it for the current pass.

mod builder;
mod memory;
mod metrics;
mod types;

pub use builder::{BuildStats, DependencyGraph, GraphBuilder};
pub use memory::MemoryGraph;
pub use metrics::{CouplingEntry, GraphMetrics, MAX_REPORTED_CYCLES};
pub(crate) use metrics::HIGH_COUPLING_THRESHOLD;
pub use types::{Direction, Edge, EdgeKind, Node, NodeKey, NodeKind, Reached};

use crate::error::Result;

/// Typed operations every graph backend provides.
///
/// Writes are upserts: adding an existing node updates its attributes, adding
/// an existing edge is a no-op, and edges create missing endpoints as bare
/// nodes. Self-loops are never stored. All listing operations return results
/// in a stable order so that identical graphs produce identical output.
pub trait GraphStore: Send + Sync {
    /// Insert or update a node.
    fn add_node(&self, node: &Node) -> Result<()>;

    /// Insert an edge if it does not exist.
    fn add_edge(&self, edge: &Edge) -> Result<()>;

    /// Whether a node exists.
    fn contains(&self, key: &NodeKey) -> Result<bool>;

    /// All nodes of a kind, ordered by key.
    fn nodes(&self, kind: NodeKind) -> Result<Vec<Node>>;

    /// All edges of a kind, ordered by (from, to).
    fn edges(&self, kind: EdgeKind) -> Result<Vec<Edge>>;

    /// Nodes one `kind` edge away in `direction`, ordered by key.
    fn neighbors(&self, key: &NodeKey, kind: EdgeKind, direction: Direction)
    -> Result<Vec<NodeKey>>;

    /// Nodes whose minimum distance from `key` along `kind` edges lies in
    /// `min_hops..=max_hops`, ordered by (hops, key). The start node is never
    /// included, even when a cycle leads back to it.
    fn reachable(
        &self,
        key: &NodeKey,
        kind: EdgeKind,
        direction: Direction,
        min_hops: u32,
        max_hops: u32,
    ) -> Result<Vec<Reached>>;

    /// Simple paths `from → … → to` along outgoing `kind` edges whose length
    /// lies in `min_hops..=max_hops`, shortest first.
    fn bounded_paths(
        &self,
        from: &NodeKey,
        to: &NodeKey,
        kind: EdgeKind,
        min_hops: u32,
        max_hops: u32,
    ) -> Result<Vec<Vec<NodeKey>>>;

    /// Remove a file node together with the functions it declares.
    fn remove_file(&self, path: &str) -> Result<()>;

    /// Remove every node and edge.
    fn clear(&self) -> Result<()>;

    /// Insert a whole built graph.
    fn load(&self, graph: &DependencyGraph) -> Result<()> {
        for node in &graph.nodes {
            self.add_node(node)?;
        }
        for edge in &graph.edges {
            self.add_edge(edge)?;
        }
        Ok(())
    }

    /// Number of files depending on `key`.
    fn fan_in(&self, key: &NodeKey) -> Result<usize> {
        Ok(self
            .neighbors(key, EdgeKind::DependsOn, Direction::Incoming)?
            .len())
    }

    /// Number of files `key` depends on.
    fn fan_out(&self, key: &NodeKey) -> Result<usize> {
        Ok(self
            .neighbors(key, EdgeKind::DependsOn, Direction::Outgoing)?
            .len())
    }
}

/// Sort paths shortest first, then lexicographically.
pub(crate) fn sort_paths(paths: &mut [Vec<NodeKey>]) {
    paths.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
}
