//! Similarity search used to enrich explanation prompts.
//!
//! Nothing in graph construction or impact scoring depends on this module.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::ParsedFile;

/// An indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique id; adding an existing id replaces the document
    pub id: String,
    /// Searchable text
    pub text: String,
    /// Free-form attributes returned with hits
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    /// Describe a parsed file: its path, declarations and imports.
    #[must_use]
    pub fn for_file(file: &ParsedFile) -> Self {
        let mut text = file.path.clone();
        for decl in file.classes.iter().chain(&file.functions) {
            text.push(' ');
            text.push_str(&decl.name);
        }
        for import in &file.imports {
            text.push(' ');
            text.push_str(import);
        }
        let mut metadata = BTreeMap::new();
        metadata.insert("language".to_string(), file.language.as_str().to_string());
        metadata.insert("functions".to_string(), file.functions.len().to_string());
        Self {
            id: file.path.clone(),
            text,
            metadata,
        }
    }
}

/// A search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document id
    pub id: String,
    /// Document text
    pub text: String,
    /// Document metadata
    pub metadata: BTreeMap<String, String>,
    /// `0.0` is identical, `1.0` shares nothing
    pub distance: f32,
}

/// Nearest-neighbour document search.
pub trait VectorIndex: Send + Sync {
    /// Add or replace a document.
    fn add(&self, document: Document) -> Result<()>;

    /// Up to `k` closest documents, nearest first.
    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;

    /// Remove every document.
    fn clear(&self) -> Result<()>;
}

/// In-process index scoring by token overlap (Jaccard distance).
#[derive(Default)]
pub struct KeywordIndex {
    docs: RwLock<Vec<(Document, HashSet<String>)>>,
}

impl KeywordIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed documents.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the index lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.docs.read().map_err(poisoned)?.len())
    }

    /// Whether the index is empty.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the index lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> Error {
    Error::Internal(format!("search index lock poisoned: {e}"))
}

/// Lowercase alphanumeric tokens of two or more characters.
fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_lowercase)
        .collect()
}

impl VectorIndex for KeywordIndex {
    fn add(&self, document: Document) -> Result<()> {
        let tokens = tokenize(&document.text);
        let mut docs = self.docs.write().map_err(poisoned)?;
        docs.retain(|(existing, _)| existing.id != document.id);
        docs.push((document, tokens));
        Ok(())
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let query = tokenize(query);
        if query.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let docs = self.docs.read().map_err(poisoned)?;
        let mut hits: Vec<SearchHit> = docs
            .iter()
            .filter_map(|(doc, tokens)| {
                let shared = query.intersection(tokens).count();
                if shared == 0 {
                    return None;
                }
                let union = query.union(tokens).count();
                #[allow(clippy::cast_precision_loss)]
                let distance = 1.0 - shared as f32 / union as f32;
                Some(SearchHit {
                    id: doc.id.clone(),
                    text: doc.text.clone(),
                    metadata: doc.metadata.clone(),
                    distance,
                })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(k);
        Ok(hits)
    }

    fn clear(&self) -> Result<()> {
        self.docs.write().map_err(poisoned)?.clear();
        Ok(())
    }
}
