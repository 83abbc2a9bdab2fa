//! Snapshot lineage: one cached analysis per repository state.
//!
//! A clean commit has at most one reusable snapshot. Before expensive work
//! starts, [`SnapshotManager::get_or_create`] either returns that snapshot or
//! hands out the id of an empty placeholder the caller must fill. The whole
//! check-then-create sequence, and the work that follows it, runs under a
//! per-(repository, commit) lock taken from [`SnapshotManager::key_lock`], so
//! concurrent passes over the same commit do the work once.
//!
//! ## Completeness
//!
//! A snapshot is trusted only when its flag is set, its metric, pattern and
//! summary payloads are present, and it still has files: live links to file
//! nodes, or the preserved file list. Anything else is regenerated in place.
//!
//! ## Preserved file lists
//!
//! Live links die when a later pass rebuilds the repository graph. Each
//! snapshot therefore also carries an immutable `(path, hash)` list so two
//! snapshots stay comparable after their nodes are gone.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::db::{Database, SnapshotRecord, SnapshotRow, datetime_from_millis, now_millis};
use crate::error::{Error, Result};
use crate::graph::{CouplingEntry, GraphMetrics};
use crate::patterns::{PatternChange, PatternMatch, pattern_changes};
use crate::types::{CommitHash, ContentHash, RepoId, RiskLevel, SnapshotId};
use crate::versioning::to_hex;

/// Length of snapshot ids, in hex characters.
const SNAPSHOT_ID_LEN: usize = 16;

/// Disambiguates ids generated within the same clock tick.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One entry of a snapshot's preserved file list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileEntry {
    /// Repository-relative path
    pub path: String,
    /// Content fingerprint at analysis time
    pub hash: ContentHash,
}

/// A cached analysis of one repository state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Identity
    pub id: SnapshotId,
    /// Owning repository
    pub repo_id: RepoId,
    /// Commit analyzed; `None` without version control
    pub commit: Option<CommitHash>,
    /// Working tree had uncommitted changes
    pub dirty: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Completion flag as stored
    pub complete: bool,
    /// Graph metrics
    pub metrics: Option<GraphMetrics>,
    /// Architecture pattern heuristics
    pub patterns: Option<Vec<PatternMatch>>,
    /// Architecture summary
    pub summary: Option<String>,
    /// `depends_on` edges as (dependent, dependency)
    pub edges: Vec<(String, String)>,
    /// Preserved file list
    pub file_list: Vec<FileEntry>,
    /// Files still linked live to graph nodes
    pub live_files: usize,
}

impl Snapshot {
    /// Whether the snapshot can be reused as-is.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
            && self.metrics.is_some()
            && self.patterns.is_some()
            && self.summary.is_some()
            && (self.live_files > 0 || !self.file_list.is_empty())
    }

    /// Reusable by later passes over the same commit.
    #[must_use]
    pub fn is_reusable(&self) -> bool {
        !self.dirty && self.commit.is_some() && self.is_complete()
    }

    fn from_row(row: SnapshotRow) -> Self {
        let id = row.id;
        Self {
            metrics: decode_payload(&id, "metrics", row.metrics.as_deref()),
            patterns: decode_payload(&id, "patterns", row.patterns.as_deref()),
            edges: decode_payload(&id, "edges", row.edges.as_deref()).unwrap_or_default(),
            file_list: decode_payload(&id, "file_list", row.file_list.as_deref())
                .unwrap_or_default(),
            id,
            repo_id: row.repo_id,
            commit: row.commit,
            dirty: row.dirty,
            created_at: datetime_from_millis(row.created_at),
            complete: row.complete,
            summary: row.summary,
            live_files: row.live_files,
        }
    }
}

/// A corrupt payload counts as missing, which makes the snapshot incomplete.
fn decode_payload<T: DeserializeOwned>(id: &SnapshotId, field: &str, raw: Option<&str>) -> Option<T> {
    let raw = raw?;
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(snapshot = %id, field, error = %e, "ignoring unreadable snapshot payload");
            None
        }
    }
}

/// Listing entry for a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotInfo {
    /// Identity
    pub id: SnapshotId,
    /// Commit analyzed
    pub commit: Option<CommitHash>,
    /// Working tree had uncommitted changes
    pub dirty: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Passes the completeness check
    pub complete: bool,
    /// File count
    pub total_files: usize,
    /// Dependency count
    pub total_dependencies: usize,
    /// Average coupling
    pub avg_coupling: f64,
    /// Cycle count
    pub cycle_count: usize,
}

impl From<&Snapshot> for SnapshotInfo {
    fn from(s: &Snapshot) -> Self {
        let metrics = MetricsView::of(s);
        Self {
            id: s.id.clone(),
            commit: s.commit.clone(),
            dirty: s.dirty,
            created_at: s.created_at,
            complete: s.is_complete(),
            total_files: metrics.files,
            total_dependencies: metrics.dependencies,
            avg_coupling: metrics.avg_coupling,
            cycle_count: metrics.cycles,
        }
    }
}

/// Outcome of [`SnapshotManager::get_or_create`].
#[derive(Debug, Clone)]
pub enum SnapshotLookup {
    /// A complete snapshot exists for the commit
    Reused(Box<Snapshot>),
    /// The caller must run the analysis and finalize this placeholder
    Fresh(SnapshotId),
}

/// Payloads written when an analysis finishes.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotPayload<'a> {
    /// Graph metrics
    pub metrics: &'a GraphMetrics,
    /// Pattern heuristics
    pub patterns: &'a [PatternMatch],
    /// Architecture summary
    pub summary: &'a str,
    /// `depends_on` edges
    pub edges: &'a [(String, String)],
    /// Files analyzed
    pub files: &'a [FileEntry],
}

/// Creates, reuses and compares snapshots.
pub struct SnapshotManager {
    db: Arc<Database>,
    key_locks: Mutex<HashMap<(RepoId, CommitHash), Arc<Mutex<()>>>>,
}

#[allow(clippy::missing_errors_doc)]
impl SnapshotManager {
    /// Create a manager over the shared database.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Lock serializing analysis passes over one (repository, commit).
    ///
    /// Callers hold the returned mutex from before
    /// [`get_or_create`](Self::get_or_create) until the snapshot is finalized,
    /// then hand it back through [`release_key`](Self::release_key).
    pub fn key_lock(&self, repo_id: &RepoId, commit: &CommitHash) -> Arc<Mutex<()>> {
        // The table only maps keys to locks; a panic elsewhere leaves it consistent
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            locks
                .entry((repo_id.clone(), commit.clone()))
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Return a lock from [`key_lock`](Self::key_lock), dropping its table
    /// entry once no other pass holds it.
    pub fn release_key(&self, repo_id: &RepoId, commit: &CommitHash, lock: Arc<Mutex<()>>) {
        drop(lock);
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (repo_id.clone(), commit.clone());
        if locks.get(&key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&key);
        }
    }

    #[cfg(test)]
    fn held_keys(&self) -> usize {
        self.key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Reuse the complete snapshot of a clean commit, or create a placeholder.
    ///
    /// Dirty trees and untracked directories always get a new placeholder.
    /// A stored snapshot that fails the completeness check is flagged
    /// incomplete and its id handed back for regeneration.
    pub fn get_or_create(
        &self,
        repo_id: &RepoId,
        commit: Option<&CommitHash>,
        dirty: bool,
    ) -> Result<SnapshotLookup> {
        let reusable_commit = commit.filter(|_| !dirty);

        if let Some(commit) = reusable_commit {
            if let Some(row) = self.db.find_snapshot_for_commit(repo_id, commit)? {
                let snapshot = Snapshot::from_row(row);
                if snapshot.is_complete() {
                    info!(repo_id = %repo_id, snapshot = %snapshot.id, commit = commit.short(), "reusing snapshot");
                    return Ok(SnapshotLookup::Reused(Box::new(snapshot)));
                }
                debug!(snapshot = %snapshot.id, "stored snapshot incomplete, regenerating");
                self.db.mark_snapshot_incomplete(&snapshot.id)?;
                return Ok(SnapshotLookup::Fresh(snapshot.id));
            }
        }

        let created_at = now_millis();
        let id = new_snapshot_id(repo_id, commit, created_at);
        let inserted = self
            .db
            .insert_snapshot_shell(&id, repo_id, commit, dirty, created_at)?;
        if !inserted {
            // Another process created the clean snapshot between our check and insert
            if let Some(commit) = reusable_commit {
                if let Some(row) = self.db.find_snapshot_for_commit(repo_id, commit)? {
                    let snapshot = Snapshot::from_row(row);
                    if snapshot.is_complete() {
                        return Ok(SnapshotLookup::Reused(Box::new(snapshot)));
                    }
                    return Ok(SnapshotLookup::Fresh(snapshot.id));
                }
            }
            return Err(Error::Internal(format!("could not create snapshot {id}")));
        }
        debug!(snapshot = %id, dirty, "created snapshot placeholder");
        Ok(SnapshotLookup::Fresh(id))
    }

    /// Write payloads and mark a placeholder complete.
    pub fn finalize(&self, id: &SnapshotId, repo_id: &RepoId, payload: &SnapshotPayload<'_>) -> Result<()> {
        let metrics = serde_json::to_string(payload.metrics)?;
        let patterns = serde_json::to_string(payload.patterns)?;
        let edges = serde_json::to_string(payload.edges)?;
        let file_list = serde_json::to_string(payload.files)?;
        let links: Vec<(String, String)> = payload
            .files
            .iter()
            .map(|f| (f.path.clone(), f.hash.as_str().to_string()))
            .collect();
        self.db.complete_snapshot(
            id,
            repo_id,
            &SnapshotRecord {
                metrics: &metrics,
                patterns: &patterns,
                summary: payload.summary,
                edges: &edges,
                file_list: &file_list,
            },
            &links,
        )?;
        info!(snapshot = %id, files = payload.files.len(), "snapshot complete");
        Ok(())
    }

    /// Copy live links into preserved lists ahead of a graph rebuild.
    pub fn preserve_file_lists(&self, repo_id: &RepoId) -> Result<usize> {
        self.db.preserve_file_lists(repo_id)
    }

    /// Look up a snapshot.
    pub fn get(&self, id: &SnapshotId) -> Result<Option<Snapshot>> {
        Ok(self.db.get_snapshot(id)?.map(Snapshot::from_row))
    }

    /// Snapshots of a repository, newest first.
    pub fn list(&self, repo_id: &RepoId) -> Result<Vec<Snapshot>> {
        Ok(self
            .db
            .list_snapshots(repo_id)?
            .into_iter()
            .map(Snapshot::from_row)
            .collect())
    }

    /// Delete a snapshot. Returns `false` if it did not exist.
    pub fn delete(&self, id: &SnapshotId) -> Result<bool> {
        let deleted = self.db.delete_snapshot(id)?;
        if deleted {
            info!(snapshot = %id, "deleted snapshot");
        }
        Ok(deleted)
    }

    /// Find a snapshot of `repo_id` by id, id prefix or commit-hash prefix.
    pub fn resolve(&self, repo_id: &RepoId, reference: &str) -> Result<Snapshot> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(Error::InvalidInput("empty snapshot reference".into()));
        }
        let snapshots = self.list(repo_id)?;
        if let Some(exact) = snapshots.iter().find(|s| s.id.as_str() == reference) {
            return Ok(exact.clone());
        }
        let mut matches: Vec<Snapshot> = snapshots
            .into_iter()
            .filter(|s| {
                s.id.as_str().starts_with(reference)
                    || s.commit.as_ref().is_some_and(|c| c.as_str().starts_with(reference))
            })
            .collect();
        match matches.len() {
            0 => Err(Error::NotFound(format!("snapshot '{reference}'"))),
            1 => Ok(matches.remove(0)),
            n => Err(Error::InvalidInput(format!(
                "snapshot reference '{reference}' is ambiguous ({n} matches)"
            ))),
        }
    }

    /// Files of a snapshot: live links while they cover the preserved list,
    /// the preserved list otherwise.
    pub fn files_of(&self, snapshot: &Snapshot) -> Result<Vec<FileEntry>> {
        if snapshot.live_files > 0 && snapshot.live_files >= snapshot.file_list.len() {
            return Ok(self
                .db
                .snapshot_live_files(&snapshot.id)?
                .into_iter()
                .map(|(path, hash)| FileEntry {
                    path,
                    hash: ContentHash::new(hash),
                })
                .collect());
        }
        Ok(snapshot.file_list.clone())
    }

    /// Differences going from snapshot `before` to snapshot `after`.
    pub fn compare(&self, before: &Snapshot, after: &Snapshot) -> Result<SnapshotDiff> {
        if before.repo_id != after.repo_id {
            return Err(Error::InvalidInput(
                "cannot compare snapshots of different repositories".into(),
            ));
        }
        let old: BTreeMap<String, ContentHash> = self
            .files_of(before)?
            .into_iter()
            .map(|f| (f.path, f.hash))
            .collect();
        let new: BTreeMap<String, ContentHash> = self
            .files_of(after)?
            .into_iter()
            .map(|f| (f.path, f.hash))
            .collect();
        Ok(SnapshotDiff::between(before, after, &old, &new))
    }
}

fn new_snapshot_id(repo_id: &RepoId, commit: Option<&CommitHash>, created_at: i64) -> SnapshotId {
    let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let seed = format!(
        "{}|{}|{created_at}|{}|{seq}",
        repo_id,
        commit.map_or("", CommitHash::as_str),
        std::process::id(),
    );
    let digest = to_hex(&Sha256::digest(seed.as_bytes()));
    SnapshotId::new(&digest[..SNAPSHOT_ID_LEN])
}

// ============================================================================
// Comparison
// ============================================================================

/// Headline numbers of one side of a comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricsView {
    /// File count
    pub files: usize,
    /// Dependency count
    pub dependencies: usize,
    /// Average coupling
    pub avg_coupling: f64,
    /// Cycle count
    pub cycles: usize,
}

impl MetricsView {
    /// Zeros when metrics are missing.
    fn of(snapshot: &Snapshot) -> Self {
        snapshot
            .metrics
            .as_ref()
            .map(|m| Self {
                files: m.total_files,
                dependencies: m.total_dependencies,
                avg_coupling: m.avg_coupling,
                cycles: m.cycle_count,
            })
            .unwrap_or_default()
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotSide {
    /// Snapshot id
    pub id: SnapshotId,
    /// Commit analyzed
    pub commit: Option<CommitHash>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Headline numbers
    pub metrics: MetricsView,
    /// Highly coupled files
    pub high_coupling: Vec<CouplingEntry>,
    /// Architecture summary
    pub summary: Option<String>,
}

impl From<&Snapshot> for SnapshotSide {
    fn from(s: &Snapshot) -> Self {
        Self {
            id: s.id.clone(),
            commit: s.commit.clone(),
            created_at: s.created_at,
            metrics: MetricsView::of(s),
            high_coupling: s
                .metrics
                .as_ref()
                .map(|m| m.high_coupling.clone())
                .unwrap_or_default(),
            summary: s.summary.clone(),
        }
    }
}

/// `after - before` for each headline metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricDeltas {
    /// File count change
    pub files: i64,
    /// Dependency count change
    pub dependencies: i64,
    /// Average coupling change, rounded to two decimals
    pub avg_coupling: f64,
    /// Cycle count change
    pub cycles: i64,
}

/// Differences between two snapshots of one repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotDiff {
    /// Older side
    pub before: SnapshotSide,
    /// Newer side
    pub after: SnapshotSide,
    /// Paths only in `after`
    pub added: Vec<String>,
    /// Paths only in `before`
    pub removed: Vec<String>,
    /// Paths in both with different hashes
    pub modified: Vec<String>,
    /// Paths in both with equal hashes
    pub unchanged: usize,
    /// Metric changes
    pub deltas: MetricDeltas,
    /// Patterns whose detection flipped
    pub pattern_changes: Vec<PatternChange>,
    /// Reasons for concern
    pub risk_areas: Vec<String>,
    /// `high` for two or more risk areas, `medium` for one
    pub risk_level: RiskLevel,
    /// One-line description
    pub summary: String,
}

fn delta(after: usize, before: usize) -> i64 {
    let to_i64 = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);
    to_i64(after) - to_i64(before)
}

impl SnapshotDiff {
    fn between(
        before: &Snapshot,
        after: &Snapshot,
        old: &BTreeMap<String, ContentHash>,
        new: &BTreeMap<String, ContentHash>,
    ) -> Self {
        let mut added = Vec::new();
        let mut modified = Vec::new();
        let mut unchanged = 0;
        for (path, hash) in new {
            match old.get(path) {
                None => added.push(path.clone()),
                Some(previous) if previous != hash => modified.push(path.clone()),
                Some(_) => unchanged += 1,
            }
        }
        let removed: Vec<String> = old.keys().filter(|p| !new.contains_key(*p)).cloned().collect();

        let (b, a) = (MetricsView::of(before), MetricsView::of(after));
        let deltas = MetricDeltas {
            files: delta(a.files, b.files),
            dependencies: delta(a.dependencies, b.dependencies),
            avg_coupling: ((a.avg_coupling - b.avg_coupling) * 100.0).round() / 100.0,
            cycles: delta(a.cycles, b.cycles),
        };

        let pattern_changes = pattern_changes(
            before.patterns.as_deref().unwrap_or_default(),
            after.patterns.as_deref().unwrap_or_default(),
        );

        let mut risk_areas = Vec::new();
        if deltas.avg_coupling > 1.0 {
            risk_areas.push(format!(
                "Significant coupling increase (+{:.2})",
                deltas.avg_coupling
            ));
        }
        if deltas.cycles > 0 {
            risk_areas.push(format!("{} new circular dependencies", deltas.cycles));
        }
        if deltas.files > 20 {
            risk_areas.push(format!("Large file increase (+{} files)", deltas.files));
        }
        let risk_level = match risk_areas.len() {
            0 => RiskLevel::Low,
            1 => RiskLevel::Medium,
            _ => RiskLevel::High,
        };

        let summary = format!(
            "File count changed by {:+}, coupling changed by {:+.2}, {:+} cycle changes, {} pattern changes",
            deltas.files,
            deltas.avg_coupling,
            deltas.cycles,
            pattern_changes.len()
        );

        Self {
            before: before.into(),
            after: after.into(),
            added,
            removed,
            modified,
            unchanged,
            deltas,
            pattern_changes,
            risk_areas,
            risk_level,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteGraph;
    use crate::graph::{GraphStore, Node, NodeKey};
    use crate::patterns::PatternDetector;
    use crate::types::Repository;

    fn setup() -> (Arc<Database>, SnapshotManager, RepoId) {
        let db = Arc::new(Database::in_memory().expect("db"));
        let repo = RepoId::new("r");
        db.upsert_repository(&Repository {
            repo_id: repo.clone(),
            url: None,
            local_path: "/r".into(),
            current_commit: None,
        })
        .expect("register");
        (Arc::clone(&db), SnapshotManager::new(db), repo)
    }

    fn metrics(files: usize, deps: usize, cycles: usize) -> GraphMetrics {
        #[allow(clippy::cast_precision_loss)]
        let avg_coupling = deps as f64 / files.max(1) as f64;
        GraphMetrics {
            total_files: files,
            total_dependencies: deps,
            avg_coupling,
            cycle_count: cycles,
            cycles: Vec::new(),
            high_coupling: Vec::new(),
        }
    }

    fn entry(path: &str, hash: &str) -> FileEntry {
        FileEntry {
            path: path.into(),
            hash: ContentHash::new(hash),
        }
    }

    fn finalize(manager: &SnapshotManager, id: &SnapshotId, repo: &RepoId, m: &GraphMetrics, files: &[FileEntry]) {
        let patterns = PatternDetector::detect(&["a.py"]);
        manager
            .finalize(
                id,
                repo,
                &SnapshotPayload {
                    metrics: m,
                    patterns: &patterns,
                    summary: "summary",
                    edges: &[],
                    files,
                },
            )
            .expect("finalize");
    }

    fn fresh(lookup: SnapshotLookup) -> SnapshotId {
        match lookup {
            SnapshotLookup::Fresh(id) => id,
            SnapshotLookup::Reused(s) => panic!("unexpected reuse of {}", s.id),
        }
    }

    #[test]
    fn complete_snapshot_is_reused_for_same_commit() {
        let (_db, manager, repo) = setup();
        let commit = CommitHash::new("c1");

        let id = fresh(manager.get_or_create(&repo, Some(&commit), false).expect("create"));
        finalize(&manager, &id, &repo, &metrics(1, 0, 0), &[entry("a.py", "h")]);

        match manager.get_or_create(&repo, Some(&commit), false).expect("lookup") {
            SnapshotLookup::Reused(snapshot) => assert_eq!(snapshot.id, id),
            SnapshotLookup::Fresh(_) => panic!("expected reuse"),
        }
    }

    #[test]
    fn placeholder_is_regenerated_under_same_id() {
        let (_db, manager, repo) = setup();
        let commit = CommitHash::new("c1");

        let first = fresh(manager.get_or_create(&repo, Some(&commit), false).expect("create"));
        let second = fresh(manager.get_or_create(&repo, Some(&commit), false).expect("retry"));

        assert_eq!(first, second);
        assert_eq!(manager.list(&repo).expect("list").len(), 1);
    }

    #[test]
    fn snapshot_without_files_is_never_complete() {
        let (_db, manager, repo) = setup();
        let commit = CommitHash::new("c1");

        let id = fresh(manager.get_or_create(&repo, Some(&commit), false).expect("create"));
        finalize(&manager, &id, &repo, &metrics(0, 0, 0), &[]);

        let stored = manager.get(&id).expect("get").expect("row");
        assert!(stored.complete);
        assert!(!stored.is_complete());
        assert_eq!(
            fresh(manager.get_or_create(&repo, Some(&commit), false).expect("lookup")),
            id
        );
    }

    #[test]
    fn dirty_and_untracked_states_are_never_reused() {
        let (_db, manager, repo) = setup();
        let commit = CommitHash::new("c1");

        let dirty = fresh(manager.get_or_create(&repo, Some(&commit), true).expect("dirty"));
        finalize(&manager, &dirty, &repo, &metrics(1, 0, 0), &[entry("a.py", "h")]);
        let again = fresh(manager.get_or_create(&repo, Some(&commit), true).expect("dirty again"));
        assert_ne!(dirty, again);

        let untracked = fresh(manager.get_or_create(&repo, None, false).expect("untracked"));
        finalize(&manager, &untracked, &repo, &metrics(1, 0, 0), &[entry("a.py", "h")]);
        assert!(!manager.get(&untracked).expect("get").expect("row").is_reusable());
        assert_ne!(
            fresh(manager.get_or_create(&repo, None, false).expect("untracked again")),
            untracked
        );
    }

    #[test]
    fn comparison_survives_graph_rebuild() {
        let (db, manager, repo) = setup();
        let graph = SqliteGraph::new(Arc::clone(&db), repo.clone());
        for path in ["a.py", "b.py"] {
            graph.add_node(&Node::bare(NodeKey::file(path))).expect("node");
        }

        let old = fresh(manager.get_or_create(&repo, Some(&CommitHash::new("c1")), false).expect("c1"));
        finalize(&manager, &old, &repo, &metrics(2, 1, 0), &[entry("a.py", "h1"), entry("b.py", "h2")]);

        // The next pass rebuilds the graph, killing the old live links
        manager.preserve_file_lists(&repo).expect("preserve");
        graph.clear().expect("clear");
        for path in ["a.py", "c.py"] {
            graph.add_node(&Node::bare(NodeKey::file(path))).expect("node");
        }
        let new = fresh(manager.get_or_create(&repo, Some(&CommitHash::new("c2")), false).expect("c2"));
        finalize(&manager, &new, &repo, &metrics(2, 4, 1), &[entry("a.py", "h1x"), entry("c.py", "h3")]);

        let before = manager.get(&old).expect("get").expect("old");
        let after = manager.get(&new).expect("get").expect("new");
        assert_eq!(before.live_files, 0);

        let diff = manager.compare(&before, &after).expect("compare");
        assert_eq!(diff.added, vec!["c.py"]);
        assert_eq!(diff.removed, vec!["b.py"]);
        assert_eq!(diff.modified, vec!["a.py"]);
        assert_eq!(diff.unchanged, 0);
        assert_eq!(diff.deltas.cycles, 1);
        assert!((diff.deltas.avg_coupling - 1.5).abs() < 1e-9);
        // Coupling up by more than 1.0 and a new cycle
        assert_eq!(diff.risk_areas.len(), 2);
        assert_eq!(diff.risk_level, RiskLevel::High);
        assert_eq!(
            diff.summary,
            "File count changed by +0, coupling changed by +1.50, +1 cycle changes, 0 pattern changes"
        );
    }

    #[test]
    fn resolve_accepts_id_and_commit_prefixes() {
        let (_db, manager, repo) = setup();
        let id = fresh(
            manager
                .get_or_create(&repo, Some(&CommitHash::new("deadbeef01")), false)
                .expect("create"),
        );

        assert_eq!(manager.resolve(&repo, id.as_str()).expect("id").id, id);
        assert_eq!(manager.resolve(&repo, "deadbeef").expect("commit").id, id);
        assert!(matches!(
            manager.resolve(&repo, "ffff").expect_err("missing"),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn released_key_locks_leave_the_table() {
        let (_db, manager, repo) = setup();
        let first = CommitHash::new("c1");
        let second = CommitHash::new("c2");

        let held = manager.key_lock(&repo, &first);
        let shared = manager.key_lock(&repo, &first);
        let other = manager.key_lock(&repo, &second);
        assert_eq!(manager.held_keys(), 2);

        manager.release_key(&repo, &second, other);
        manager.release_key(&repo, &first, shared);
        assert_eq!(manager.held_keys(), 1, "first key is still held");

        manager.release_key(&repo, &first, held);
        assert_eq!(manager.held_keys(), 0);
    }

    #[test]
    fn poisoned_key_lock_is_still_usable() {
        let (_db, manager, repo) = setup();
        let commit = CommitHash::new("c1");
        let lock = manager.key_lock(&repo, &commit);

        let poisoner = Arc::clone(&lock);
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.lock().expect("first lock");
            panic!("pass failed");
        })
        .join();
        assert!(joined.is_err());
        assert!(lock.is_poisoned());

        let again = manager.key_lock(&repo, &commit);
        let _guard = again.lock().unwrap_or_else(PoisonError::into_inner);
    }
}
