//! Function-level call queries.
//!
//! The graph records a `calls` edge from a calling file to each function it
//! calls, and from a calling function to each function called in its body.
//! Functions are looked up by bare name, so a name declared in several files
//! yields one answer per declaration.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::graph::{Direction, EdgeKind, GraphStore, NodeKey, NodeKind};

/// Most hops a call chain follows.
pub const MAX_CALL_CHAIN_DEPTH: u32 = 10;

/// A declared function.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct FunctionRef {
    /// Declaring file
    pub file: String,
    /// Function name
    pub name: String,
    /// Declaration line, when known
    pub line: Option<u32>,
}

/// Direct callers of one declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionCallers {
    /// The function called
    pub function: FunctionRef,
    /// Files calling it, the declaring file included
    pub file_callers: Vec<String>,
    /// Functions calling it from their bodies
    pub function_callers: Vec<FunctionRef>,
}

impl FunctionCallers {
    /// Whether nothing calls the function.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.file_callers.is_empty() && self.function_callers.is_empty()
    }
}

/// One caller found by a call-chain query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainLink {
    /// Fewest `calls` edges between the caller and the function
    pub hops: u32,
    /// File of the caller
    pub file: String,
    /// Calling function; `None` for a file-level caller
    pub function: Option<String>,
}

/// Transitive callers of one declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallChain {
    /// The function called
    pub function: FunctionRef,
    /// Hops followed
    pub depth: u32,
    /// Callers ordered by (hops, caller)
    pub callers: Vec<ChainLink>,
}

/// Call queries over any [`GraphStore`].
pub struct CallGraph<'a> {
    graph: &'a dyn GraphStore,
}

impl<'a> CallGraph<'a> {
    /// Query `graph`.
    #[must_use]
    pub fn new(graph: &'a dyn GraphStore) -> Self {
        Self { graph }
    }

    /// Direct callers of every function named `name`, ordered by declaring file.
    ///
    /// # Errors
    ///
    /// Propagates failures of the underlying store.
    pub fn callers(&self, name: &str) -> Result<Vec<FunctionCallers>> {
        let lines = self.declaration_lines()?;
        let mut results = Vec::new();
        for key in Self::named(&lines, name) {
            let mut file_callers = Vec::new();
            let mut function_callers = Vec::new();
            for caller in self.graph.neighbors(&key, EdgeKind::Calls, Direction::Incoming)? {
                match caller {
                    NodeKey::File { path } => file_callers.push(path),
                    NodeKey::Function { .. } => function_callers.push(reference(&caller, &lines)),
                    NodeKey::Module { .. } => {}
                }
            }
            function_callers.sort();
            results.push(FunctionCallers {
                function: reference(&key, &lines),
                file_callers,
                function_callers,
            });
        }
        debug!(function = name, declarations = results.len(), "collected callers");
        Ok(results)
    }

    /// Callers of every function named `name` up to `depth` hops away.
    ///
    /// `depth` is clamped to `1..=`[`MAX_CALL_CHAIN_DEPTH`].
    ///
    /// # Errors
    ///
    /// Propagates failures of the underlying store.
    pub fn call_chain(&self, name: &str, depth: u32) -> Result<Vec<CallChain>> {
        let depth = depth.clamp(1, MAX_CALL_CHAIN_DEPTH);
        let lines = self.declaration_lines()?;
        let mut chains = Vec::new();
        for key in Self::named(&lines, name) {
            let callers = self
                .graph
                .reachable(&key, EdgeKind::Calls, Direction::Incoming, 1, depth)?
                .into_iter()
                .filter_map(|reached| match reached.node {
                    NodeKey::File { path } => Some(ChainLink {
                        hops: reached.hops,
                        file: path,
                        function: None,
                    }),
                    NodeKey::Function { file, name } => Some(ChainLink {
                        hops: reached.hops,
                        file,
                        function: Some(name),
                    }),
                    NodeKey::Module { .. } => None,
                })
                .collect();
            chains.push(CallChain {
                function: reference(&key, &lines),
                depth,
                callers,
            });
        }
        Ok(chains)
    }

    fn declaration_lines(&self) -> Result<HashMap<NodeKey, Option<u32>>> {
        Ok(self
            .graph
            .nodes(NodeKind::Function)?
            .into_iter()
            .map(|node| (node.key, node.line))
            .collect())
    }

    fn named(lines: &HashMap<NodeKey, Option<u32>>, name: &str) -> Vec<NodeKey> {
        let mut keys: Vec<NodeKey> = lines
            .keys()
            .filter(|key| matches!(key, NodeKey::Function { name: n, .. } if n == name))
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

fn reference(key: &NodeKey, lines: &HashMap<NodeKey, Option<u32>>) -> FunctionRef {
    let (file, name) = match key {
        NodeKey::Function { file, name } => (file.clone(), name.clone()),
        other => (other.owning_file().unwrap_or_default().to_string(), other.encode()),
    };
    FunctionRef {
        file,
        name,
        line: lines.get(key).copied().flatten(),
    }
}
