//! Node and edge types shared by every graph backend.

use serde::{Deserialize, Serialize};

use crate::types::Language;

/// Category of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A source file of the repository
    File,
    /// A function or method declared in a file
    Function,
    /// An import target that is not a file of the repository
    Module,
}

impl NodeKind {
    /// Database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Function => "function",
            Self::Module => "module",
        }
    }

    /// Parse the database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "file" => Some(Self::File),
            "function" => Some(Self::Function),
            "module" => Some(Self::Module),
            _ => None,
        }
    }
}

/// Identity of a node. Equal keys always denote the same node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeKey {
    /// A file, by repository-relative path
    File {
        /// Repository-relative path
        path: String,
    },
    /// A function, by declaring file and name
    Function {
        /// Declaring file
        file: String,
        /// Function name
        name: String,
    },
    /// An external module, by normalized name
    Module {
        /// Normalized module name
        name: String,
    },
}

impl NodeKey {
    /// Key for a file node.
    #[must_use]
    pub fn file(path: impl Into<String>) -> Self {
        Self::File { path: path.into() }
    }

    /// Key for a function node.
    #[must_use]
    pub fn function(file: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Function {
            file: file.into(),
            name: name.into(),
        }
    }

    /// Key for a module node.
    #[must_use]
    pub fn module(name: impl Into<String>) -> Self {
        Self::Module { name: name.into() }
    }

    /// Node category.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::File { .. } => NodeKind::File,
            Self::Function { .. } => NodeKind::Function,
            Self::Module { .. } => NodeKind::Module,
        }
    }

    /// Unique text form within a kind: the path, `path#name`, or the module name.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::File { path } => path.clone(),
            Self::Function { file, name } => format!("{file}#{name}"),
            Self::Module { name } => name.clone(),
        }
    }

    /// Inverse of [`encode`](Self::encode).
    #[must_use]
    pub fn decode(kind: NodeKind, encoded: &str) -> Option<Self> {
        match kind {
            NodeKind::File => Some(Self::file(encoded)),
            NodeKind::Module => Some(Self::module(encoded)),
            NodeKind::Function => encoded
                .rsplit_once('#')
                .map(|(file, name)| Self::function(file, name)),
        }
    }

    /// File a node belongs to: the file itself or a function's declaring file.
    #[must_use]
    pub fn owning_file(&self) -> Option<&str> {
        match self {
            Self::File { path } => Some(path),
            Self::Function { file, .. } => Some(file),
            Self::Module { .. } => None,
        }
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File { path } => f.write_str(path),
            Self::Function { file, name } => write!(f, "{file}::{name}"),
            Self::Module { name } => write!(f, "<{name}>"),
        }
    }
}

/// A node with its attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Identity
    pub key: NodeKey,
    /// Source language (files only)
    pub language: Option<Language>,
    /// Declaration line (functions only)
    pub line: Option<u32>,
}

impl Node {
    /// A node with no attributes.
    #[must_use]
    pub fn bare(key: NodeKey) -> Self {
        Self {
            key,
            language: None,
            line: None,
        }
    }
}

/// Relationship carried by an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// File → Module: an import that names no file of the repository
    Imports,
    /// File → File: an import resolved to a concrete file
    DependsOn,
    /// File → Function or Function → Function
    Calls,
}

impl EdgeKind {
    /// Database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imports => "imports",
            Self::DependsOn => "depends_on",
            Self::Calls => "calls",
        }
    }

    /// Parse the database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "imports" => Some(Self::Imports),
            "depends_on" => Some(Self::DependsOn),
            "calls" => Some(Self::Calls),
            _ => None,
        }
    }
}

/// A directed edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    /// Source node
    pub from: NodeKey,
    /// Target node
    pub to: NodeKey,
    /// Relationship
    pub kind: EdgeKind,
}

/// Which way to follow edges from a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow edges leaving the node (what it depends on)
    Outgoing,
    /// Follow edges entering the node (what depends on it)
    Incoming,
}

/// A node found by a bounded traversal and its minimum hop count.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Reached {
    /// Fewest edges between the start and this node
    pub hops: u32,
    /// The node
    pub node: NodeKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_keys_survive_encode_decode_with_hash_in_path() {
        let key = NodeKey::function("docs/#drafts/a.py", "run");
        let decoded = NodeKey::decode(NodeKind::Function, &key.encode());
        assert_eq!(decoded, Some(key));
    }

    #[test]
    fn owning_file_of_module_is_none() {
        assert_eq!(NodeKey::module("os").owning_file(), None);
        assert_eq!(NodeKey::function("a.py", "f").owning_file(), Some("a.py"));
    }

    #[test]
    fn edge_kind_strings_match_database_values() {
        for kind in [EdgeKind::Imports, EdgeKind::DependsOn, EdgeKind::Calls] {
            assert_eq!(EdgeKind::parse(kind.as_str()), Some(kind));
        }
    }
}
