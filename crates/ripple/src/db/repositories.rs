//! Repository registry operations.

use rusqlite::{OptionalExtension, params};

use super::{Database, now_millis};
use crate::error::Result;
use crate::types::{CommitHash, RepoId, Repository};

const REPO_COLUMNS: &str = "repo_id, url, local_path, current_commit";

fn row_to_repository(row: &rusqlite::Row<'_>) -> rusqlite::Result<Repository> {
    Ok(Repository {
        repo_id: RepoId::new(row.get::<_, String>(0)?),
        url: row.get(1)?,
        local_path: row.get(2)?,
        current_commit: row.get::<_, Option<String>>(3)?.map(CommitHash::new),
    })
}

#[allow(clippy::missing_errors_doc)]
impl Database {
    /// Register a repository or refresh its URL and local path.
    ///
    /// An existing `current_commit` is kept unless the new record carries one.
    pub fn upsert_repository(&self, repo: &Repository) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO repositories (repo_id, url, local_path, current_commit, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(repo_id) DO UPDATE SET
                url = COALESCE(excluded.url, repositories.url),
                local_path = excluded.local_path,
                current_commit = COALESCE(excluded.current_commit, repositories.current_commit),
                updated_at = excluded.updated_at",
            params![
                repo.repo_id.as_str(),
                repo.url,
                repo.local_path,
                repo.current_commit.as_ref().map(CommitHash::as_str),
                now_millis(),
            ],
        )?;
        Ok(())
    }

    /// Look up a repository.
    pub fn get_repository(&self, repo_id: &RepoId) -> Result<Option<Repository>> {
        let conn = self.connection()?;
        let repo = conn
            .query_row(
                &format!("SELECT {REPO_COLUMNS} FROM repositories WHERE repo_id = ?1"),
                [repo_id.as_str()],
                row_to_repository,
            )
            .optional()?;
        Ok(repo)
    }

    /// All repositories, most recently updated first.
    pub fn list_repositories(&self) -> Result<Vec<Repository>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPO_COLUMNS} FROM repositories ORDER BY updated_at DESC, repo_id"
        ))?;
        let repos = stmt
            .query_map([], row_to_repository)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(repos)
    }

    /// Record the commit analyzed most recently (`None` clears it).
    pub fn set_current_commit(&self, repo_id: &RepoId, commit: Option<&CommitHash>) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "UPDATE repositories SET current_commit = ?2, updated_at = ?3 WHERE repo_id = ?1",
            params![repo_id.as_str(), commit.map(CommitHash::as_str), now_millis()],
        )?;
        Ok(())
    }

    /// How many times the repository's graph has been replaced, by any process.
    pub fn graph_generation(&self, repo_id: &RepoId) -> Result<u64> {
        let conn = self.connection()?;
        let generation: Option<i64> = conn
            .query_row(
                "SELECT graph_generation FROM repositories WHERE repo_id = ?1",
                [repo_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(generation.map_or(0, |g| u64::try_from(g).unwrap_or(0)))
    }

    /// Delete a repository and everything it owns.
    ///
    /// Returns `false` if the repository was not registered.
    pub fn delete_repository(&self, repo_id: &RepoId) -> Result<bool> {
        let conn = self.connection()?;
        let deleted = conn.execute(
            "DELETE FROM repositories WHERE repo_id = ?1",
            [repo_id.as_str()],
        )?;
        Ok(deleted > 0)
    }
}
