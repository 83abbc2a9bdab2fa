//! Snapshot rows, live file links and preserved file lists.
//!
//! Payload columns hold JSON produced by the `snapshot` module; this layer
//! stores and returns them verbatim.

use rusqlite::{OptionalExtension, params};

use super::Database;
use crate::error::Result;
use crate::types::{CommitHash, RepoId, SnapshotId};

/// A snapshot row as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SnapshotRow {
    pub id: SnapshotId,
    pub repo_id: RepoId,
    pub commit: Option<CommitHash>,
    pub dirty: bool,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
    pub complete: bool,
    pub metrics: Option<String>,
    pub patterns: Option<String>,
    pub summary: Option<String>,
    pub edges: Option<String>,
    pub file_list: Option<String>,
    /// Number of live links to file nodes
    pub live_files: usize,
}

/// Payloads written when a snapshot is completed.
#[derive(Debug, Clone)]
pub(crate) struct SnapshotRecord<'a> {
    pub metrics: &'a str,
    pub patterns: &'a str,
    pub summary: &'a str,
    pub edges: &'a str,
    pub file_list: &'a str,
}

const SNAPSHOT_COLUMNS: &str = "s.id, s.repo_id, s.commit_hash, s.dirty, s.created_at, s.complete,
    s.metrics, s.patterns, s.summary, s.edges, s.file_list,
    (SELECT COUNT(*) FROM snapshot_files f WHERE f.snapshot_id = s.id)";

fn row_to_snapshot(row: &rusqlite::Row<'_>) -> rusqlite::Result<SnapshotRow> {
    Ok(SnapshotRow {
        id: SnapshotId::new(row.get::<_, String>(0)?),
        repo_id: RepoId::new(row.get::<_, String>(1)?),
        commit: row.get::<_, Option<String>>(2)?.map(CommitHash::new),
        dirty: row.get(3)?,
        created_at: row.get(4)?,
        complete: row.get(5)?,
        metrics: row.get(6)?,
        patterns: row.get(7)?,
        summary: row.get(8)?,
        edges: row.get(9)?,
        file_list: row.get(10)?,
        live_files: usize::try_from(row.get::<_, i64>(11)?).unwrap_or(0),
    })
}

#[allow(clippy::missing_errors_doc)]
impl Database {
    /// The reusable-candidate snapshot of a clean commit, if any.
    pub(crate) fn find_snapshot_for_commit(
        &self,
        repo_id: &RepoId,
        commit: &CommitHash,
    ) -> Result<Option<SnapshotRow>> {
        let conn = self.connection()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {SNAPSHOT_COLUMNS} FROM snapshots s
                     WHERE s.repo_id = ?1 AND s.commit_hash = ?2 AND s.dirty = 0"
                ),
                params![repo_id.as_str(), commit.as_str()],
                row_to_snapshot,
            )
            .optional()?;
        Ok(row)
    }

    /// Look up a snapshot by id.
    pub(crate) fn get_snapshot(&self, id: &SnapshotId) -> Result<Option<SnapshotRow>> {
        let conn = self.connection()?;
        let row = conn
            .query_row(
                &format!("SELECT {SNAPSHOT_COLUMNS} FROM snapshots s WHERE s.id = ?1"),
                [id.as_str()],
                row_to_snapshot,
            )
            .optional()?;
        Ok(row)
    }

    /// Snapshots of a repository, newest first.
    pub(crate) fn list_snapshots(&self, repo_id: &RepoId) -> Result<Vec<SnapshotRow>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM snapshots s
             WHERE s.repo_id = ?1 ORDER BY s.created_at DESC, s.rowid DESC"
        ))?;
        let rows = stmt
            .query_map([repo_id.as_str()], row_to_snapshot)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Insert an empty, incomplete snapshot.
    ///
    /// Returns `false` when a clean snapshot for the same commit already exists.
    pub(crate) fn insert_snapshot_shell(
        &self,
        id: &SnapshotId,
        repo_id: &RepoId,
        commit: Option<&CommitHash>,
        dirty: bool,
        created_at: i64,
    ) -> Result<bool> {
        let conn = self.connection()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO snapshots (id, repo_id, commit_hash, dirty, created_at, complete)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![
                id.as_str(),
                repo_id.as_str(),
                commit.map(CommitHash::as_str),
                dirty,
                created_at,
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Flag a snapshot for regeneration.
    pub(crate) fn mark_snapshot_incomplete(&self, id: &SnapshotId) -> Result<()> {
        let conn = self.connection()?;
        conn.execute("UPDATE snapshots SET complete = 0 WHERE id = ?1", [id.as_str()])?;
        Ok(())
    }

    /// Write payloads and live file links, then mark the snapshot complete.
    ///
    /// `files` are (path, content hash) pairs; paths without a file node in
    /// the repository graph get no live link.
    pub(crate) fn complete_snapshot(
        &self,
        id: &SnapshotId,
        repo_id: &RepoId,
        record: &SnapshotRecord<'_>,
        files: &[(String, String)],
    ) -> Result<()> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE snapshots SET metrics = ?2, patterns = ?3, summary = ?4, edges = ?5,
                file_list = ?6, complete = 1
             WHERE id = ?1",
            params![
                id.as_str(),
                record.metrics,
                record.patterns,
                record.summary,
                record.edges,
                record.file_list,
            ],
        )?;
        tx.execute("DELETE FROM snapshot_files WHERE snapshot_id = ?1", [id.as_str()])?;
        {
            let mut link = tx.prepare(
                "INSERT OR IGNORE INTO snapshot_files (snapshot_id, node_id, content_hash)
                 SELECT ?1, n.id, ?4 FROM nodes n
                 WHERE n.repo_id = ?2 AND n.kind = 'file' AND n.key = ?3",
            )?;
            for (path, hash) in files {
                link.execute(params![id.as_str(), repo_id.as_str(), path, hash])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Files linked live to a snapshot, ordered by path.
    pub(crate) fn snapshot_live_files(&self, id: &SnapshotId) -> Result<Vec<(String, String)>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT n.key, f.content_hash FROM snapshot_files f
             JOIN nodes n ON n.id = f.node_id
             WHERE f.snapshot_id = ?1 ORDER BY n.key",
        )?;
        let files = stmt
            .query_map([id.as_str()], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }

    /// Give every snapshot of the repository that still has live links but no
    /// preserved list a preserved copy of those links.
    ///
    /// Runs before the repository graph is rebuilt, since the rebuild deletes
    /// the nodes the links point at.
    pub(crate) fn preserve_file_lists(&self, repo_id: &RepoId) -> Result<usize> {
        let pending: Vec<SnapshotId> = {
            let conn = self.connection()?;
            let mut stmt = conn.prepare(
                "SELECT s.id FROM snapshots s
                 WHERE s.repo_id = ?1 AND s.file_list IS NULL
                   AND EXISTS (SELECT 1 FROM snapshot_files f WHERE f.snapshot_id = s.id)",
            )?;
            stmt.query_map([repo_id.as_str()], |row| {
                row.get::<_, String>(0).map(SnapshotId::new)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        for id in &pending {
            let files = self.snapshot_live_files(id)?;
            let payload: Vec<serde_json::Value> = files
                .into_iter()
                .map(|(path, hash)| serde_json::json!({ "path": path, "hash": hash }))
                .collect();
            let conn = self.connection()?;
            conn.execute(
                "UPDATE snapshots SET file_list = ?2 WHERE id = ?1",
                params![id.as_str(), serde_json::to_string(&payload)?],
            )?;
        }
        Ok(pending.len())
    }

    /// Delete a snapshot and its live links.
    pub(crate) fn delete_snapshot(&self, id: &SnapshotId) -> Result<bool> {
        let conn = self.connection()?;
        Ok(conn.execute("DELETE FROM snapshots WHERE id = ?1", [id.as_str()])? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteGraph;
    use crate::graph::{GraphStore, Node, NodeKey};
    use crate::types::Repository;
    use std::sync::Arc;

    fn db() -> Arc<Database> {
        let db = Arc::new(Database::in_memory().expect("db"));
        db.upsert_repository(&Repository {
            repo_id: RepoId::new("r"),
            url: None,
            local_path: "/r".into(),
            current_commit: None,
        })
        .expect("register");
        db
    }

    fn record() -> SnapshotRecord<'static> {
        SnapshotRecord {
            metrics: "{}",
            patterns: "[]",
            summary: "ok",
            edges: "[]",
            file_list: r#"[{"path":"a.py","hash":"h"}]"#,
        }
    }

    #[test]
    fn only_one_clean_snapshot_per_commit() {
        let db = db();
        let repo = RepoId::new("r");
        let commit = CommitHash::new("c1");

        assert!(db
            .insert_snapshot_shell(&SnapshotId::new("s1"), &repo, Some(&commit), false, 1)
            .expect("first"));
        assert!(!db
            .insert_snapshot_shell(&SnapshotId::new("s2"), &repo, Some(&commit), false, 2)
            .expect("duplicate"));
        // Dirty snapshots of the same commit are allowed alongside
        assert!(db
            .insert_snapshot_shell(&SnapshotId::new("s3"), &repo, Some(&commit), true, 3)
            .expect("dirty"));

        let found = db
            .find_snapshot_for_commit(&repo, &commit)
            .expect("find")
            .expect("present");
        assert_eq!(found.id.as_str(), "s1");
        assert!(!found.complete);
    }

    #[test]
    fn live_links_disappear_when_graph_is_replaced() {
        let db = db();
        let repo = RepoId::new("r");
        let graph = SqliteGraph::new(Arc::clone(&db), repo.clone());
        graph.add_node(&Node::bare(NodeKey::file("a.py"))).expect("node");

        let id = SnapshotId::new("s1");
        db.insert_snapshot_shell(&id, &repo, None, false, 1).expect("shell");
        db.complete_snapshot(&id, &repo, &record(), &[("a.py".into(), "h".into())])
            .expect("complete");
        assert_eq!(db.get_snapshot(&id).expect("get").expect("row").live_files, 1);

        graph.clear().expect("clear");

        let row = db.get_snapshot(&id).expect("get").expect("row");
        assert_eq!(row.live_files, 0);
        assert!(row.file_list.is_some());
        assert!(row.complete);
    }

    #[test]
    fn preserve_copies_live_links_into_missing_file_list() {
        let db = db();
        let repo = RepoId::new("r");
        let graph = SqliteGraph::new(Arc::clone(&db), repo.clone());
        graph.add_node(&Node::bare(NodeKey::file("a.py"))).expect("node");

        let id = SnapshotId::new("s1");
        db.insert_snapshot_shell(&id, &repo, None, false, 1).expect("shell");
        db.complete_snapshot(&id, &repo, &record(), &[("a.py".into(), "h".into())])
            .expect("complete");
        {
            let conn = db.connection().expect("conn");
            conn.execute("UPDATE snapshots SET file_list = NULL", [])
                .expect("strip payload");
        }

        assert_eq!(db.preserve_file_lists(&repo).expect("preserve"), 1);
        let row = db.get_snapshot(&id).expect("get").expect("row");
        let payload: serde_json::Value =
            serde_json::from_str(row.file_list.as_deref().expect("list")).expect("json");
        assert_eq!(payload[0]["path"], "a.py");
        assert_eq!(payload[0]["hash"], "h");
    }
}
