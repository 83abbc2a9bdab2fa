//! Commit chain and per-file version chain.
//!
//! Both chains only ever link a new row to the immediately preceding existing
//! row of the same kind (ordered by timestamp, then insertion order), so each
//! chain is a single list walkable from newest to oldest.

use rusqlite::{OptionalExtension, params};

use super::{Database, datetime_from_secs};
use crate::error::Result;
use crate::types::{Commit, CommitHash, ContentHash, Contribution, HistoryEntry, RepoId};

/// A stored version row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VersionRow {
    pub content_hash: ContentHash,
    pub commit: CommitHash,
}

/// Data for a version about to be recorded.
#[derive(Debug, Clone)]
pub(crate) struct NewVersion<'a> {
    pub file: &'a str,
    pub content_hash: &'a ContentHash,
    pub commit: &'a CommitHash,
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    pub author: &'a str,
}

#[allow(clippy::missing_errors_doc)]
impl Database {
    // === Commits ===

    /// Record a commit, linking it to the latest earlier commit of the repository.
    ///
    /// Returns `false` if the commit was already recorded.
    pub(crate) fn record_commit(&self, repo_id: &RepoId, commit: &Commit) -> Result<bool> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM commits WHERE repo_id = ?1 AND hash = ?2)",
            params![repo_id.as_str(), commit.hash.as_str()],
            |row| row.get(0),
        )?;
        if exists {
            return Ok(false);
        }

        let previous: Option<String> = tx
            .query_row(
                "SELECT hash FROM commits
                 WHERE repo_id = ?1 AND timestamp <= ?2
                 ORDER BY timestamp DESC, rowid DESC LIMIT 1",
                params![repo_id.as_str(), commit.timestamp.timestamp()],
                |row| row.get(0),
            )
            .optional()?;
        tx.execute(
            "INSERT INTO commits (repo_id, hash, message, author, timestamp, previous_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                repo_id.as_str(),
                commit.hash.as_str(),
                commit.message,
                commit.author,
                commit.timestamp.timestamp(),
                previous,
            ],
        )?;
        tx.commit()?;
        Ok(true)
    }

    /// Commits of a repository, newest first, each with its predecessor.
    pub(crate) fn commit_chain(&self, repo_id: &RepoId) -> Result<Vec<(Commit, Option<CommitHash>)>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT hash, message, author, timestamp, previous_hash FROM commits
             WHERE repo_id = ?1 ORDER BY timestamp DESC, rowid DESC",
        )?;
        let chain = stmt
            .query_map([repo_id.as_str()], |row| {
                Ok((
                    Commit {
                        hash: CommitHash::new(row.get::<_, String>(0)?),
                        message: row.get(1)?,
                        author: row.get(2)?,
                        timestamp: datetime_from_secs(row.get(3)?),
                    },
                    row.get::<_, Option<String>>(4)?.map(CommitHash::new),
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(chain)
    }

    // === Versions ===

    /// Record a version unless its (file, hash, commit) triple exists.
    ///
    /// A new row is linked to the file's immediately preceding version.
    /// Returns the row id and whether it was created.
    pub(crate) fn insert_version(
        &self,
        repo_id: &RepoId,
        version: &NewVersion<'_>,
    ) -> Result<(i64, bool)> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO versions
                (repo_id, file_path, content_hash, commit_hash, timestamp, author)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                repo_id.as_str(),
                version.file,
                version.content_hash.as_str(),
                version.commit.as_str(),
                version.timestamp,
                version.author,
            ],
        )? > 0;
        let id: i64 = tx.query_row(
            "SELECT id FROM versions
             WHERE repo_id = ?1 AND file_path = ?2 AND content_hash = ?3 AND commit_hash = ?4",
            params![
                repo_id.as_str(),
                version.file,
                version.content_hash.as_str(),
                version.commit.as_str(),
            ],
            |row| row.get(0),
        )?;

        if inserted {
            let previous: Option<i64> = tx
                .query_row(
                    "SELECT id FROM versions
                     WHERE repo_id = ?1 AND file_path = ?2 AND id != ?3
                       AND (timestamp < ?4 OR (timestamp = ?4 AND id < ?3))
                     ORDER BY timestamp DESC, id DESC LIMIT 1",
                    params![repo_id.as_str(), version.file, id, version.timestamp],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(previous) = previous {
                tx.execute(
                    "UPDATE versions SET previous_id = ?2 WHERE id = ?1",
                    params![id, previous],
                )?;
            }
        }
        tx.commit()?;
        Ok((id, inserted))
    }

    /// Latest recorded version of a file.
    pub(crate) fn latest_version(&self, repo_id: &RepoId, file: &str) -> Result<Option<VersionRow>> {
        let conn = self.connection()?;
        let row = conn
            .query_row(
                "SELECT content_hash, commit_hash FROM versions
                 WHERE repo_id = ?1 AND file_path = ?2
                 ORDER BY timestamp DESC, id DESC LIMIT 1",
                params![repo_id.as_str(), file],
                |row| {
                    Ok(VersionRow {
                        content_hash: ContentHash::new(row.get::<_, String>(0)?),
                        commit: CommitHash::new(row.get::<_, String>(1)?),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Versions of a file, newest first, with the hash of each predecessor.
    pub(crate) fn file_history(&self, repo_id: &RepoId, file: &str) -> Result<Vec<HistoryEntry>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT v.content_hash, v.commit_hash, v.timestamp, v.author, p.content_hash
             FROM versions v
             LEFT JOIN versions p ON p.id = v.previous_id
             WHERE v.repo_id = ?1 AND v.file_path = ?2
             ORDER BY v.timestamp DESC, v.id DESC",
        )?;
        let history = stmt
            .query_map(params![repo_id.as_str(), file], |row| {
                Ok(HistoryEntry {
                    hash: ContentHash::new(row.get::<_, String>(0)?),
                    commit: CommitHash::new(row.get::<_, String>(1)?),
                    timestamp: datetime_from_secs(row.get(2)?),
                    author: row.get(3)?,
                    previous_hash: row.get::<_, Option<String>>(4)?.map(ContentHash::new),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(history)
    }

    /// Number of version rows of a repository.
    pub(crate) fn version_count(&self, repo_id: &RepoId) -> Result<u64> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM versions WHERE repo_id = ?1",
            [repo_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Distinct paths with at least one version.
    pub(crate) fn tracked_files(&self, repo_id: &RepoId) -> Result<Vec<String>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT file_path FROM versions WHERE repo_id = ?1 ORDER BY file_path",
        )?;
        let files = stmt
            .query_map([repo_id.as_str()], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(files)
    }

    /// Per-author activity, most versions first.
    pub(crate) fn contributions(&self, repo_id: &RepoId) -> Result<Vec<Contribution>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT author, COUNT(*), COUNT(DISTINCT file_path), MIN(timestamp), MAX(timestamp)
             FROM versions WHERE repo_id = ?1
             GROUP BY author
             ORDER BY COUNT(*) DESC, author",
        )?;
        let contributions = stmt
            .query_map([repo_id.as_str()], |row| {
                Ok(Contribution {
                    author: row.get(0)?,
                    versions: u64::try_from(row.get::<_, i64>(1)?).unwrap_or(0),
                    files: u64::try_from(row.get::<_, i64>(2)?).unwrap_or(0),
                    first_seen: datetime_from_secs(row.get(3)?),
                    last_seen: datetime_from_secs(row.get(4)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(contributions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Repository;

    fn db() -> Database {
        let db = Database::in_memory().expect("db");
        db.upsert_repository(&Repository {
            repo_id: RepoId::new("r"),
            url: None,
            local_path: "/r".into(),
            current_commit: None,
        })
        .expect("register");
        db
    }

    fn commit(hash: &str, secs: i64) -> Commit {
        Commit {
            hash: CommitHash::new(hash),
            message: format!("commit {hash}"),
            author: "dev".into(),
            timestamp: datetime_from_secs(secs),
        }
    }

    #[test]
    fn commits_link_to_latest_earlier_commit() {
        let db = db();
        let repo = RepoId::new("r");
        assert!(db.record_commit(&repo, &commit("c1", 100)).expect("c1"));
        assert!(db.record_commit(&repo, &commit("c2", 200)).expect("c2"));
        assert!(!db.record_commit(&repo, &commit("c2", 200)).expect("c2 again"));

        let chain = db.commit_chain(&repo).expect("chain");
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].0.hash.as_str(), "c2");
        assert_eq!(chain[0].1, Some(CommitHash::new("c1")));
        assert_eq!(chain[1].1, None);
    }

    #[test]
    fn version_triple_is_unique_and_chain_links_predecessor() {
        let db = db();
        let repo = RepoId::new("r");
        let h1 = ContentHash::new("h1");
        let h2 = ContentHash::new("h2");
        let c1 = CommitHash::new("c1");
        let c2 = CommitHash::new("c2");

        let first = NewVersion {
            file: "a.py",
            content_hash: &h1,
            commit: &c1,
            timestamp: 100,
            author: "dev",
        };
        let (id1, created) = db.insert_version(&repo, &first).expect("v1");
        assert!(created);
        let (again, created) = db.insert_version(&repo, &first).expect("v1 again");
        assert!(!created);
        assert_eq!(again, id1);

        let second = NewVersion {
            content_hash: &h2,
            commit: &c2,
            timestamp: 200,
            ..first
        };
        db.insert_version(&repo, &second).expect("v2");

        let history = db.file_history(&repo, "a.py").expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].hash, h2);
        assert_eq!(history[0].previous_hash, Some(h1.clone()));
        assert_eq!(history[1].previous_hash, None);
        assert_eq!(db.version_count(&repo).expect("count"), 2);
    }

    #[test]
    fn contributions_group_by_author() {
        let db = db();
        let repo = RepoId::new("r");
        let hash = ContentHash::new("h");
        let commit = CommitHash::new("c");
        for (file, author, ts) in [("a.py", "ana", 10), ("b.py", "ana", 20), ("a.py", "bo", 30)] {
            let other = ContentHash::new(format!("{file}{author}"));
            db.insert_version(
                &repo,
                &NewVersion {
                    file,
                    content_hash: if author == "bo" { &other } else { &hash },
                    commit: &commit,
                    timestamp: ts,
                    author,
                },
            )
            .expect("insert");
        }

        let contributions = db.contributions(&repo).expect("contributions");
        assert_eq!(contributions[0].author, "ana");
        assert_eq!(contributions[0].versions, 2);
        assert_eq!(contributions[0].files, 2);
        assert_eq!(contributions[1].author, "bo");
        assert_eq!(contributions[1].last_seen.timestamp(), 30);
    }
}
