//! `SQLite` storage layer for Ripple.
//!
//! `SQLite` is the system of record: repositories, the persisted dependency
//! graph, commits, versions and snapshots all live in one database file.
//!
//! ## Module Structure
//!
//! - `schema` - Database schema (DDL)
//! - `repositories` - Repository registry
//! - `graph` - Persisted [`GraphStore`](crate::graph::GraphStore) backend
//! - `versions` - Commit chain and per-file version chain
//! - `snapshots` - Snapshot rows, live file links and preserved file lists
//!
//! Every write is an upsert keyed on a natural key, so concurrent passes over
//! the same repository converge on the same rows.

mod graph;
mod repositories;
mod schema;
mod snapshots;
mod versions;

pub use graph::SqliteGraph;
pub(crate) use schema::SCHEMA;
pub(crate) use snapshots::{SnapshotRecord, SnapshotRow};
pub(crate) use versions::NewVersion;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::error::{Error, Result};

/// `SQLite` database shared by every store in a session.
///
/// The connection is wrapped in a `Mutex`; callers hold the guard only for
/// the duration of one statement or transaction.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open or create the database file.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreUnavailable` if the file cannot be opened or the
    /// schema cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| {
            Error::StoreUnavailable(format!("cannot open {}: {e}", path.display()))
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::StoreUnavailable(format!("cannot open in-memory store: {e}")))?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Location of the database file, `None` for in-memory databases.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Acquire the connection lock.
    ///
    /// A poisoned lock means a thread panicked mid-statement; the store is
    /// reported as unavailable rather than trusted.
    pub(crate) fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            Error::StoreUnavailable(format!(
                "database connection mutex poisoned (a thread panicked while holding the lock): {e}"
            ))
        })
    }
}

/// Current time as milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert stored seconds to a timestamp; out-of-range values map to the epoch.
pub(crate) fn datetime_from_secs(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// Convert stored milliseconds to a timestamp; out-of-range values map to the epoch.
pub(crate) fn datetime_from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_creates_parent_directories() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("nested").join("ripple.db");

        let db = Database::open(&path).expect("open");

        assert!(path.exists());
        assert_eq!(db.path(), Some(path.as_path()));
    }

    #[test]
    fn open_fails_as_store_unavailable_when_path_is_a_directory() {
        let dir = TempDir::new().expect("temp dir");
        let err = Database::open(dir.path()).err().expect("should fail");
        assert!(err.is_store_failure(), "unexpected error: {err}");
    }

    #[test]
    fn schema_is_idempotent() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("ripple.db");
        drop(Database::open(&path).expect("first open"));
        Database::open(&path).expect("second open");
    }

    #[test]
    fn timestamps_out_of_range_fall_back_to_epoch() {
        assert_eq!(datetime_from_secs(i64::MAX).timestamp(), 0);
        assert_eq!(datetime_from_millis(1_500).timestamp_millis(), 1_500);
    }
}
