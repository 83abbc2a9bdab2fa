//! Persisted graph backend.
//!
//! Implements [`GraphStore`] over the `nodes` and `edges` tables. Bounded
//! traversals use recursive CTEs; the hop bound in the recursive term is what
//! guarantees termination on cyclic graphs.

use std::collections::HashMap;
use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension, params};

use super::Database;
use crate::error::{Error, Result};
use crate::graph::{
    DependencyGraph, Direction, Edge, EdgeKind, GraphStore, Node, NodeKey, NodeKind, Reached,
    sort_paths,
};
use crate::types::{Language, RepoId};

/// [`GraphStore`] backed by the `SQLite` database, scoped to one repository.
///
/// The repository must be registered before nodes are written.
#[derive(Clone)]
pub struct SqliteGraph {
    db: Arc<Database>,
    repo_id: RepoId,
}

impl SqliteGraph {
    /// Graph of `repo_id` inside `db`.
    #[must_use]
    pub fn new(db: Arc<Database>, repo_id: RepoId) -> Self {
        Self { db, repo_id }
    }

    /// Repository this graph belongs to.
    #[must_use]
    pub fn repo_id(&self) -> &RepoId {
        &self.repo_id
    }

    /// Replace the repository's whole graph in one transaction.
    ///
    /// Old nodes are deleted first, which also drops the live file links of
    /// every snapshot computed from them.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; the previous graph is then kept.
    pub fn replace(&self, graph: &DependencyGraph) -> Result<()> {
        let mut conn = self.db.connection()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM nodes WHERE repo_id = ?1", [self.repo_id.as_str()])?;
        self.insert_all(&tx, graph)?;
        tx.execute(
            "UPDATE repositories SET graph_generation = graph_generation + 1 WHERE repo_id = ?1",
            [self.repo_id.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn insert_all(&self, conn: &Connection, graph: &DependencyGraph) -> Result<()> {
        let mut ids: HashMap<&NodeKey, i64> = HashMap::with_capacity(graph.nodes.len());
        for node in &graph.nodes {
            ids.insert(&node.key, self.upsert_node(conn, node)?);
        }
        for edge in &graph.edges {
            let from = match ids.get(&edge.from) {
                Some(&id) => id,
                None => self.upsert_node(conn, &Node::bare(edge.from.clone()))?,
            };
            let to = match ids.get(&edge.to) {
                Some(&id) => id,
                None => self.upsert_node(conn, &Node::bare(edge.to.clone()))?,
            };
            self.insert_edge(conn, from, to, edge.kind)?;
        }
        Ok(())
    }

    fn upsert_node(&self, conn: &Connection, node: &Node) -> Result<i64> {
        let id = conn.query_row(
            "INSERT INTO nodes (repo_id, kind, key, file_path, language, line)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(repo_id, kind, key) DO UPDATE SET
                language = COALESCE(excluded.language, nodes.language),
                line = COALESCE(excluded.line, nodes.line)
             RETURNING id",
            params![
                self.repo_id.as_str(),
                node.key.kind().as_str(),
                node.key.encode(),
                node.key.owning_file(),
                node.language.map(|l| l.as_str()),
                node.line,
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn insert_edge(&self, conn: &Connection, from: i64, to: i64, kind: EdgeKind) -> Result<()> {
        if from == to {
            return Ok(());
        }
        conn.execute(
            "INSERT OR IGNORE INTO edges (repo_id, from_id, to_id, kind) VALUES (?1, ?2, ?3, ?4)",
            params![self.repo_id.as_str(), from, to, kind.as_str()],
        )?;
        Ok(())
    }

    fn node_id(&self, conn: &Connection, key: &NodeKey) -> Result<Option<i64>> {
        let id = conn
            .query_row(
                "SELECT id FROM nodes WHERE repo_id = ?1 AND kind = ?2 AND key = ?3",
                params![self.repo_id.as_str(), key.kind().as_str(), key.encode()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn key_for_id(conn: &Connection, id: i64) -> Result<NodeKey> {
        let (kind, key): (String, String) = conn.query_row(
            "SELECT kind, key FROM nodes WHERE id = ?1",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        decode_key(&kind, &key)
    }
}

fn decode_key(kind: &str, key: &str) -> Result<NodeKey> {
    NodeKind::parse(kind)
        .and_then(|kind| NodeKey::decode(kind, key))
        .ok_or_else(|| {
            Error::Internal(format!(
                "invalid node '{kind}:{key}' in database (possible corruption)"
            ))
        })
}

fn parse_path_ids(path: &str) -> Result<Vec<i64>> {
    path.split(',')
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse().map_err(|e| {
                Error::Internal(format!(
                    "failed to parse ID '{id}' in path '{path}': {e} (possible database corruption)"
                ))
            })
        })
        .collect()
}

/// Column pair `(follow, arrive)` for walking edges in `direction`.
fn walk_columns(direction: Direction) -> (&'static str, &'static str) {
    match direction {
        // Arrive at the dependency
        Direction::Outgoing => ("from_id", "to_id"),
        // Arrive at the dependent
        Direction::Incoming => ("to_id", "from_id"),
    }
}

impl GraphStore for SqliteGraph {
    fn add_node(&self, node: &Node) -> Result<()> {
        let conn = self.db.connection()?;
        self.upsert_node(&conn, node)?;
        Ok(())
    }

    fn add_edge(&self, edge: &Edge) -> Result<()> {
        if edge.from == edge.to {
            return Ok(());
        }
        let conn = self.db.connection()?;
        let from = self.upsert_node(&conn, &Node::bare(edge.from.clone()))?;
        let to = self.upsert_node(&conn, &Node::bare(edge.to.clone()))?;
        self.insert_edge(&conn, from, to, edge.kind)
    }

    fn contains(&self, key: &NodeKey) -> Result<bool> {
        let conn = self.db.connection()?;
        Ok(self.node_id(&conn, key)?.is_some())
    }

    fn nodes(&self, kind: NodeKind) -> Result<Vec<Node>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(
            "SELECT key, language, line FROM nodes WHERE repo_id = ?1 AND kind = ?2",
        )?;
        let rows = stmt.query_map(params![self.repo_id.as_str(), kind.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<u32>>(2)?,
            ))
        })?;

        let mut nodes = Vec::new();
        for row in rows {
            let (key, language, line) = row?;
            nodes.push(Node {
                key: decode_key(kind.as_str(), &key)?,
                language: language.as_deref().and_then(Language::parse),
                line,
            });
        }
        nodes.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(nodes)
    }

    fn edges(&self, kind: EdgeKind) -> Result<Vec<Edge>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(
            "SELECT a.kind, a.key, b.kind, b.key
             FROM edges e
             JOIN nodes a ON a.id = e.from_id
             JOIN nodes b ON b.id = e.to_id
             WHERE e.repo_id = ?1 AND e.kind = ?2",
        )?;
        let rows = stmt.query_map(params![self.repo_id.as_str(), kind.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut edges = Vec::new();
        for row in rows {
            let (from_kind, from_key, to_kind, to_key) = row?;
            edges.push(Edge {
                from: decode_key(&from_kind, &from_key)?,
                to: decode_key(&to_kind, &to_key)?,
                kind,
            });
        }
        edges.sort();
        Ok(edges)
    }

    fn neighbors(
        &self,
        key: &NodeKey,
        kind: EdgeKind,
        direction: Direction,
    ) -> Result<Vec<NodeKey>> {
        let conn = self.db.connection()?;
        let Some(id) = self.node_id(&conn, key)? else {
            return Ok(Vec::new());
        };
        let (follow, arrive) = walk_columns(direction);
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT n.kind, n.key
             FROM edges e JOIN nodes n ON n.id = e.{arrive}
             WHERE e.{follow} = ?1 AND e.kind = ?2"
        ))?;
        let rows = stmt.query_map(params![id, kind.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut keys = Vec::new();
        for row in rows {
            let (kind, key) = row?;
            keys.push(decode_key(&kind, &key)?);
        }
        keys.sort();
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
        let conn = self.db.connection()?;
        let Some(id) = self.node_id(&conn, key)? else {
            return Ok(Vec::new());
        };
        let (follow, arrive) = walk_columns(direction);
        let mut stmt = conn.prepare(&format!(
            "WITH RECURSIVE walk(node_id, hops) AS (
                SELECT ?1, 0

                UNION

                SELECT e.{arrive}, w.hops + 1
                FROM edges e
                JOIN walk w ON e.{follow} = w.node_id
                WHERE e.kind = ?2 AND w.hops < ?3
            )
            SELECT n.kind, n.key, MIN(w.hops) AS min_hops
            FROM walk w
            JOIN nodes n ON n.id = w.node_id
            WHERE w.node_id != ?1
            GROUP BY w.node_id
            HAVING min_hops >= ?4"
        ))?;
        let rows = stmt.query_map(params![id, kind.as_str(), max_hops, min_hops], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
            ))
        })?;

        let mut reached = Vec::new();
        for row in rows {
            let (kind, key, hops) = row?;
            reached.push(Reached {
                hops,
                node: decode_key(&kind, &key)?,
            });
        }
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
        let conn = self.db.connection()?;
        let (Some(start), Some(goal)) = (self.node_id(&conn, from)?, self.node_id(&conn, to)?)
        else {
            return Ok(Vec::new());
        };

        // Paths are stored as ",id,id,...," so membership is an instr() check
        let mut stmt = conn.prepare(
            "WITH RECURSIVE walk(node_id, hops, path) AS (
                SELECT ?1, 0, ',' || ?1 || ','

                UNION ALL

                SELECT e.to_id, w.hops + 1, w.path || e.to_id || ','
                FROM edges e
                JOIN walk w ON e.from_id = w.node_id
                WHERE e.kind = ?3
                  AND w.hops < ?5
                  AND (w.hops = 0 OR w.node_id != ?2)
                  AND (instr(w.path, ',' || e.to_id || ',') = 0 OR (e.to_id = ?2 AND ?1 = ?2))
            )
            SELECT path FROM walk
            WHERE node_id = ?2 AND hops >= MAX(?4, 1)",
        )?;
        let raw_paths = stmt
            .query_map(params![start, goal, kind.as_str(), min_hops, max_hops], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut keys: HashMap<i64, NodeKey> = HashMap::new();
        let mut paths = Vec::with_capacity(raw_paths.len());
        for raw in raw_paths {
            let mut path = Vec::new();
            for id in parse_path_ids(&raw)? {
                if let Some(key) = keys.get(&id) {
                    path.push(key.clone());
                } else {
                    let key = Self::key_for_id(&conn, id)?;
                    keys.insert(id, key.clone());
                    path.push(key);
                }
            }
            paths.push(path);
        }
        sort_paths(&mut paths);
        paths.dedup();
        Ok(paths)
    }

    fn remove_file(&self, path: &str) -> Result<()> {
        let conn = self.db.connection()?;
        conn.execute(
            "DELETE FROM nodes WHERE repo_id = ?1 AND file_path = ?2 AND kind IN ('file', 'function')",
            params![self.repo_id.as_str(), path],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let conn = self.db.connection()?;
        conn.execute("DELETE FROM nodes WHERE repo_id = ?1", [self.repo_id.as_str()])?;
        Ok(())
    }

    fn load(&self, graph: &DependencyGraph) -> Result<()> {
        let mut conn = self.db.connection()?;
        let tx = conn.transaction()?;
        self.insert_all(&tx, graph)?;
        tx.commit()?;
        Ok(())
    }
}
