//! Graph construction from parsed files.
//!
//! The builder is a pure function of its input list: the same files in the same
//! order always produce the same nodes and edges in the same order. That is what
//! lets a snapshot recorded for a commit stand in for a rebuild of that commit.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{Edge, EdgeKind, Node, NodeKey};
use crate::resolver::{ModuleIndex, Resolution};
use crate::types::ParsedFile;

/// Counters describing one build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    /// File nodes created
    pub files: usize,
    /// Imports that became `depends_on` edges
    pub resolved_imports: usize,
    /// Imports that became `imports` edges to modules
    pub unresolved_imports: usize,
    /// Imports that named their own file and were dropped
    pub self_imports: usize,
    /// `calls` edges created
    pub call_edges: usize,
}

/// Nodes and edges produced by [`GraphBuilder::build`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    /// Nodes in creation order
    pub nodes: Vec<Node>,
    /// Edges in creation order, without duplicates or self-loops
    pub edges: Vec<Edge>,
    /// Build counters
    pub stats: BuildStats,
}

impl DependencyGraph {
    /// `depends_on` edges as (dependent, dependency) path pairs.
    pub fn dependency_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges.iter().filter_map(|edge| match (&edge.from, &edge.to, edge.kind) {
            (NodeKey::File { path: from }, NodeKey::File { path: to }, EdgeKind::DependsOn) => {
                Some((from.as_str(), to.as_str()))
            }
            _ => None,
        })
    }
}

/// Builds a [`DependencyGraph`] from parsed files.
#[derive(Debug, Default, Clone, Copy)]
pub struct GraphBuilder;

impl GraphBuilder {
    /// Build the graph. Later duplicates of a path are ignored.
    #[must_use]
    pub fn build(files: &[ParsedFile]) -> DependencyGraph {
        let mut seen_paths = HashSet::new();
        let files: Vec<&ParsedFile> = files
            .iter()
            .filter(|f| seen_paths.insert(f.path.as_str()))
            .collect();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        let index = ModuleIndex::build(&paths);

        let mut out = Output::default();

        for file in &files {
            out.node(Node {
                key: NodeKey::file(&file.path),
                language: Some(file.language),
                line: None,
            });
        }

        // depends_on / imports
        let mut dependencies: Vec<Vec<usize>> = vec![Vec::new(); files.len()];
        for (position, file) in files.iter().enumerate() {
            for raw in &file.imports {
                match index.resolve(position, &file.path, raw) {
                    Resolution::File(target) => {
                        out.stats.resolved_imports += 1;
                        if !dependencies[position].contains(&target) {
                            dependencies[position].push(target);
                        }
                        out.edge(
                            NodeKey::file(&file.path),
                            NodeKey::file(paths[target]),
                            EdgeKind::DependsOn,
                        );
                    }
                    Resolution::SelfReference => out.stats.self_imports += 1,
                    Resolution::Unresolved(module) => {
                        out.stats.unresolved_imports += 1;
                        let module = NodeKey::module(module);
                        out.node(Node::bare(module.clone()));
                        out.edge(NodeKey::file(&file.path), module, EdgeKind::Imports);
                    }
                }
            }
        }

        // Function declarations; the first declaration of a name in a file wins
        let mut declared_in: HashMap<&str, Vec<usize>> = HashMap::new();
        for (position, file) in files.iter().enumerate() {
            for function in &file.functions {
                let owners = declared_in.entry(function.name.as_str()).or_default();
                if owners.contains(&position) {
                    continue;
                }
                owners.push(position);
                out.node(Node {
                    key: NodeKey::function(&file.path, &function.name),
                    language: Some(file.language),
                    line: Some(function.line),
                });
            }
        }

        let callee_files = |caller: usize, name: &str| -> Vec<usize> {
            let Some(owners) = declared_in.get(name) else {
                return Vec::new();
            };
            let imported: Vec<usize> = owners
                .iter()
                .copied()
                .filter(|owner| dependencies[caller].contains(owner))
                .collect();
            if !imported.is_empty() {
                imported
            } else if owners.contains(&caller) {
                vec![caller]
            } else if owners.len() == 1 {
                owners.clone()
            } else {
                Vec::new()
            }
        };

        // calls
        for (position, file) in files.iter().enumerate() {
            for name in &file.calls {
                for target in callee_files(position, name) {
                    out.edge(
                        NodeKey::file(&file.path),
                        NodeKey::function(paths[target], name),
                        EdgeKind::Calls,
                    );
                }
            }
            for call in &file.function_calls {
                let declares_caller = declared_in
                    .get(call.caller.as_str())
                    .is_some_and(|owners| owners.contains(&position));
                if !declares_caller {
                    continue;
                }
                for target in callee_files(position, &call.callee) {
                    out.edge(
                        NodeKey::function(&file.path, &call.caller),
                        NodeKey::function(paths[target], &call.callee),
                        EdgeKind::Calls,
                    );
                }
            }
        }

        out.stats.files = files.len();
        debug!(
            files = out.stats.files,
            resolved = out.stats.resolved_imports,
            unresolved = out.stats.unresolved_imports,
            calls = out.stats.call_edges,
            "built dependency graph"
        );
        DependencyGraph {
            nodes: out.nodes,
            edges: out.edges,
            stats: out.stats,
        }
    }
}

#[derive(Default)]
struct Output {
    nodes: Vec<Node>,
    node_keys: HashSet<NodeKey>,
    edges: Vec<Edge>,
    edge_set: HashSet<Edge>,
    stats: BuildStats,
}

impl Output {
    fn node(&mut self, node: Node) {
        if self.node_keys.insert(node.key.clone()) {
            self.nodes.push(node);
        }
    }

    fn edge(&mut self, from: NodeKey, to: NodeKey, kind: EdgeKind) {
        if from == to {
            return;
        }
        let edge = Edge { from, to, kind };
        if self.edge_set.insert(edge.clone()) {
            if kind == EdgeKind::Calls {
                self.stats.call_edges += 1;
            }
            self.edges.push(edge);
        }
    }
}
