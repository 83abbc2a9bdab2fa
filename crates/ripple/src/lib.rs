//! # Ripple: Versioned Dependency Graphs and Blast-Radius Analysis
//!
//! Ripple parses a source repository into a dependency graph, records the
//! content of every file against the commit it was seen at, and answers
//! "what breaks if I change this file?" with a bounded risk score. Each
//! analysis of a clean commit is stored as a snapshot that later passes over
//! the same commit reuse instead of rebuilding.
//!
//! ## Design Philosophy
//!
//! - **Same commit, same graph** - Graph construction is deterministic, which is what makes snapshot reuse safe
//! - **Bounded blast radius** - Dependents are explored to three hops and no further
//! - **Degrade, don't fail** - Missing version control, unreadable files and explanation outages reduce what is reported; store failures do not
//! - **Session, not singleton** - All state belongs to a [`Ripple`] value; collaborators are injected
//! - **Library first** - The `ripple` binary is a thin layer over this crate
//!
//! ## Quick Start
//!
//! ```no_run
//! use ripple::{ChangeType, Ripple};
//! use std::path::Path;
//!
//! let ripple = Ripple::open(Path::new("/path/to/repo"))?;
//!
//! // Analyze the working tree (reuses the snapshot of an unchanged commit)
//! let report = ripple.analyze()?;
//! println!("{} files, cached: {}", report.total_files, report.cached);
//!
//! // Blast radius of deleting a file
//! let impact = ripple.get_impact("src/config.py", ChangeType::Delete)?;
//! println!("{} risk ({}/100)", impact.risk_level, impact.risk_score);
//! # Ok::<(), ripple::Error>(())
//! ```

mod analysis;
mod cache;
mod calls;
mod confidence;
mod config;
mod db;
mod error;
mod explain;
mod graph;
mod impact;
mod parser;
mod paths;
mod patterns;
mod resolver;
mod scan;
mod search;
mod snapshot;
mod types;
mod vcs;
mod versioning;

pub use analysis::{AnalysisReport, VersionCounts};
pub use cache::{CacheKey, CachedValue, Purpose, ResultCache};
pub use calls::{
    CallChain, CallGraph, ChainLink, FunctionCallers, FunctionRef, MAX_CALL_CHAIN_DEPTH,
};
pub use confidence::{Claim, ConfidenceReport, HIGH_CONFIDENCE, MAX_CLAIMS};
pub use config::{CONFIG_FILE_NAME, DATA_DIR_NAME, DATABASE_FILE_NAME, RippleConfig};
pub use db::{Database, SqliteGraph};
pub use error::{AnalysisWarning, Error, Result, WarningKind};
pub use explain::{
    CommandExplainer, ExplainError, Explainer, Explanation, NoExplainer, explain_or_fallback,
};
pub use graph::{
    BuildStats, CouplingEntry, DependencyGraph, Direction, Edge, EdgeKind, GraphBuilder,
    GraphMetrics, GraphStore, MAX_REPORTED_CYCLES, MemoryGraph, Node, NodeKey, NodeKind, Reached,
};
pub use impact::{
    CallerPolicy, FunctionImpact, FunctionsAffected, INDIRECT_MAX_HOPS, INDIRECT_MIN_HOPS,
    ImpactAnalyzer, ImpactBreakdown, ImpactResult, score,
};
pub use parser::{HeuristicParser, SourceParser};
pub use paths::{PathMatch, resolve_path};
pub use patterns::{PatternChange, PatternDetector, PatternKind, PatternMatch};
pub use search::{Document, KeywordIndex, SearchHit, VectorIndex};
pub use snapshot::{
    FileEntry, MetricDeltas, MetricsView, Snapshot, SnapshotDiff, SnapshotInfo, SnapshotLookup,
    SnapshotManager, SnapshotPayload, SnapshotSide,
};
pub use types::{
    ChangeType, Commit, CommitHash, ContentHash, Contribution, Declaration, FunctionCall,
    HistoryEntry, IntegrityStatus, Language, ParsedFile, RepoId, Repository, RiskLevel,
    SnapshotId, TrackOutcome, TrackStatus, Version,
};
pub use vcs::{CommitInfo, GitCli, NoSourceControl, SourceControl};
pub use versioning::{
    CommitLink, HistoryImport, VersionTracker, fingerprint_bytes, fingerprint_file, repo_id_for,
};

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use analysis::Collected;

/// Related files added to an impact explanation prompt.
const RELATED_FILES: usize = 5;

/// Collaborators and overrides for a [`Ripple`] session.
///
/// Anything left `None` gets the default: the configuration file, the
/// heuristic parser, git on `PATH`, the configured explanation command and
/// an in-process keyword index.
#[derive(Clone, Default)]
pub struct SessionOptions {
    /// Remote URL identifying the repository, overriding the one git reports
    pub url: Option<String>,
    /// Configuration to use instead of `.ripple/config.yaml`
    pub config: Option<RippleConfig>,
    /// Source parser
    pub parser: Option<Arc<dyn SourceParser>>,
    /// Version control access
    pub source_control: Option<Arc<dyn SourceControl>>,
    /// Explanation service
    pub explainer: Option<Arc<dyn Explainer>>,
    /// Similarity index for explanation prompts
    pub index: Option<Arc<dyn VectorIndex>>,
}

/// State of the working tree at the start of a pass.
struct TreeState {
    head: Option<Commit>,
    dirty: bool,
}

/// Repository-level counts.
#[derive(Debug, Clone, Serialize)]
pub struct RepoStatus {
    /// Registry entry, `None` before the first analysis
    pub repository: Option<Repository>,
    /// Files with at least one recorded version
    pub tracked_files: usize,
    /// Recorded versions
    pub versions: u64,
    /// Recorded commits
    pub commits: usize,
    /// Stored snapshots
    pub snapshots: usize,
    /// Newest complete snapshot
    pub latest_snapshot: Option<SnapshotInfo>,
}

/// An impact result with its natural-language explanation.
#[derive(Debug, Clone, Serialize)]
pub struct ImpactExplanation {
    /// The blast radius explained
    pub impact: ImpactResult,
    /// Explanation text
    pub explanation: Explanation,
    /// Served from the result cache
    pub cached: bool,
}

/// An analysis session over one repository.
///
/// `Ripple` owns the repository identity, the database handle, the result
/// cache and the injected collaborators. It is `Send + Sync`; concurrent
/// [`analyze`](Self::analyze) calls over the same clean commit do the work
/// once.
pub struct Ripple {
    workspace_root: PathBuf,
    repo_id: RepoId,
    url: Option<String>,
    config: RippleConfig,
    db: Arc<Database>,
    cache: ResultCache,
    snapshots: SnapshotManager,
    /// In-memory copy of the graph built by the latest pass of this session,
    /// with the persisted graph generation it mirrors
    mirror: RwLock<Option<(u64, Arc<MemoryGraph>)>>,
    parser: Arc<dyn SourceParser>,
    vcs: Arc<dyn SourceControl>,
    explainer: Arc<dyn Explainer>,
    index: Arc<dyn VectorIndex>,
}

#[allow(clippy::missing_errors_doc)]
impl Ripple {
    /// Open a session with default collaborators.
    ///
    /// Data lives in `.ripple/` under the workspace root:
    /// - `config.yaml` (optional)
    /// - `ripple.db`
    /// - `.gitignore` ignoring the directory itself, so analysis never dirties the tree
    pub fn open(workspace_root: &Path) -> Result<Self> {
        Self::open_with(workspace_root, SessionOptions::default())
    }

    /// Open a session with explicit collaborators.
    pub fn open_with(workspace_root: &Path, mut options: SessionOptions) -> Result<Self> {
        let workspace_root = workspace_root.canonicalize().map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("workspace root not found: {}", workspace_root.display()),
            ))
        })?;

        let data_dir = workspace_root.join(DATA_DIR_NAME);
        std::fs::create_dir_all(&data_dir)?;
        let ignore = data_dir.join(".gitignore");
        if !ignore.exists() {
            std::fs::write(&ignore, "*\n")?;
        }

        let config = match options.config.take() {
            Some(config) => {
                config.validate()?;
                config
            }
            None => RippleConfig::load(&data_dir.join(CONFIG_FILE_NAME))?,
        };
        let db = Arc::new(Database::open(&data_dir.join(DATABASE_FILE_NAME))?);
        Ok(Self::assemble(workspace_root, config, db, options))
    }

    /// Open a session backed by a private in-memory database.
    ///
    /// Nothing is written under the workspace root.
    pub fn open_in_memory(workspace_root: &Path, mut options: SessionOptions) -> Result<Self> {
        let workspace_root = workspace_root.canonicalize().map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("workspace root not found: {}", workspace_root.display()),
            ))
        })?;
        let config = options.config.take().unwrap_or_default();
        config.validate()?;
        let db = Arc::new(Database::in_memory()?);
        Ok(Self::assemble(workspace_root, config, db, options))
    }

    fn assemble(
        workspace_root: PathBuf,
        config: RippleConfig,
        db: Arc<Database>,
        options: SessionOptions,
    ) -> Self {
        let vcs: Arc<dyn SourceControl> = match options.source_control {
            Some(vcs) => vcs,
            None => Arc::new(GitCli::new()),
        };
        let explainer: Arc<dyn Explainer> = match (options.explainer, &config.explain_command) {
            (Some(explainer), _) => explainer,
            (None, Some(command)) => Arc::new(CommandExplainer::new(command.clone())),
            (None, None) => Arc::new(NoExplainer),
        };
        let parser: Arc<dyn SourceParser> = match options.parser {
            Some(parser) => parser,
            None => Arc::new(HeuristicParser),
        };
        let index: Arc<dyn VectorIndex> = match options.index {
            Some(index) => index,
            None => Arc::new(KeywordIndex::new()),
        };
        let url = options.url.or_else(|| match vcs.remote_url(&workspace_root) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "cannot read remote URL, identifying repository by path");
                None
            }
        });
        let repo_id = repo_id_for(url.as_deref(), &workspace_root);
        debug!(repo_id = %repo_id, root = %workspace_root.display(), "opened session");

        Self {
            cache: ResultCache::new(config.cache_capacity),
            snapshots: SnapshotManager::new(Arc::clone(&db)),
            mirror: RwLock::new(None),
            workspace_root,
            repo_id,
            url,
            config,
            db,
            parser,
            vcs,
            explainer,
            index,
        }
    }

    /// Canonical workspace root.
    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Identity of the repository.
    #[must_use]
    pub fn repo_id(&self) -> &RepoId {
        &self.repo_id
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &RippleConfig {
        &self.config
    }

    /// Location of the database file, `None` for in-memory sessions.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db.path()
    }

    /// Version lineage of this repository.
    #[must_use]
    pub fn versions(&self) -> VersionTracker {
        VersionTracker::new(Arc::clone(&self.db), self.repo_id.clone())
    }

    // === Analysis ===

    /// Analyze the working tree.
    ///
    /// A clean commit with a complete snapshot is answered from the snapshot
    /// (`cached = true`). Otherwise the tree is parsed, versions are tracked,
    /// the graph is rebuilt and a new snapshot is finalized. Passes over the
    /// same clean commit are serialized, so concurrent callers share one
    /// snapshot.
    pub fn analyze(&self) -> Result<AnalysisReport> {
        let started = Instant::now();
        let state = self.observe_tree();
        self.register()?;
        self.cache.set_current_repo(&self.repo_id)?;
        info!(
            repo_id = %self.repo_id,
            commit = state.head.as_ref().map_or("none", |c| c.hash.short()),
            dirty = state.dirty,
            "starting analysis"
        );

        let commit = state.head.as_ref().map(|c| &c.hash);
        let key_lock = match commit {
            Some(hash) if !state.dirty => Some(self.snapshots.key_lock(&self.repo_id, hash)),
            _ => None,
        };
        let outcome = {
            // A pass that panicked leaves no state behind the lock itself
            let _pass = key_lock
                .as_ref()
                .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner));
            match self
                .snapshots
                .get_or_create(&self.repo_id, commit, state.dirty)
            {
                Ok(SnapshotLookup::Reused(snapshot)) => self.reuse(&snapshot, &state),
                Ok(SnapshotLookup::Fresh(id)) => self.run_pass(&id, &state),
                Err(e) => Err(e),
            }
        };
        if let (Some(lock), Some(hash)) = (key_lock, commit) {
            self.snapshots.release_key(&self.repo_id, hash, lock);
        }
        let report = outcome?;
        info!(
            repo_id = %self.repo_id,
            snapshot = %report.snapshot_id,
            cached = report.cached,
            files = report.total_files,
            elapsed_ms = started.elapsed().as_millis(),
            "analysis finished"
        );
        Ok(report)
    }

    fn observe_tree(&self) -> TreeState {
        let head = match self.vcs.head(&self.workspace_root) {
            Ok(head) => head,
            Err(e) => {
                warn!(error = %e, "version control unavailable, analysis will not be cached");
                None
            }
        };
        if head.is_none() {
            return TreeState { head, dirty: false };
        }
        let dirty = self.vcs.is_dirty(&self.workspace_root).unwrap_or_else(|e| {
            warn!(error = %e, "cannot tell whether the tree is clean, assuming dirty");
            true
        });
        TreeState { head, dirty }
    }

    fn register(&self) -> Result<()> {
        self.db.upsert_repository(&Repository {
            repo_id: self.repo_id.clone(),
            url: self.url.clone(),
            local_path: self.workspace_root.to_string_lossy().into_owned(),
            current_commit: None,
        })
    }

    fn run_pass(&self, snapshot_id: &SnapshotId, state: &TreeState) -> Result<AnalysisReport> {
        let collected = analysis::collect(&self.workspace_root, &self.config, self.parser.as_ref());

        let versions = match &state.head {
            Some(commit) if !state.dirty => self.track_versions(&collected, commit)?,
            Some(_) => {
                debug!("uncommitted changes, skipping version tracking");
                VersionCounts::default()
            }
            None => VersionCounts::default(),
        };

        let graph = GraphBuilder::build(&collected.parsed);
        let mirror = self.replace_graph(&graph)?;
        let metrics = GraphMetrics::compute(mirror.as_ref())?;
        let paths: Vec<&str> = collected.files.iter().map(|f| f.path.as_str()).collect();
        let patterns = PatternDetector::detect(&paths);
        let prompt_files: Vec<String> = paths.iter().map(ToString::to_string).collect();
        let summary = explain_or_fallback(
            self.explainer.as_ref(),
            &explain::architecture_prompt(&metrics, &patterns, &prompt_files),
            || explain::architecture_fallback(&metrics, &patterns),
        );
        self.fill_index(&collected);

        let edges: Vec<(String, String)> = graph
            .dependency_pairs()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        self.snapshots.finalize(
            snapshot_id,
            &self.repo_id,
            &SnapshotPayload {
                metrics: &metrics,
                patterns: &patterns,
                summary: &summary.text,
                edges: &edges,
                files: &collected.files,
            },
        )?;
        self.cache.insert(
            CacheKey::new(
                Purpose::ArchitectureSummary,
                self.repo_id.clone(),
                snapshot_id.as_str(),
                "",
            ),
            CachedValue::Text(summary.text.clone()),
            None,
        )?;
        let commit = state.head.as_ref().map(|c| c.hash.clone());
        // A graph built from uncommitted content belongs to no commit
        let graph_commit = commit.as_ref().filter(|_| !state.dirty);
        self.db.set_current_commit(&self.repo_id, graph_commit)?;

        Ok(AnalysisReport {
            repo_id: self.repo_id.clone(),
            snapshot_id: snapshot_id.clone(),
            commit,
            dirty: state.dirty,
            cached: false,
            total_files: metrics.total_files,
            metrics,
            patterns,
            architecture: summary.text,
            versions,
            build: Some(graph.stats),
            warnings: collected.warnings,
        })
    }

    /// Answer from a complete snapshot. The persisted graph is rebuilt only
    /// when it was last built for a different commit.
    fn reuse(&self, snapshot: &Snapshot, state: &TreeState) -> Result<AnalysisReport> {
        let (Some(metrics), Some(patterns), Some(summary)) = (
            snapshot.metrics.clone(),
            snapshot.patterns.clone(),
            snapshot.summary.clone(),
        ) else {
            return Err(Error::Internal(format!(
                "snapshot {} reused without payloads",
                snapshot.id
            )));
        };

        let current = self
            .db
            .get_repository(&self.repo_id)?
            .and_then(|r| r.current_commit);
        let (build, warnings) = if current.is_some() && current == snapshot.commit {
            (None, Vec::new())
        } else {
            info!(
                snapshot = %snapshot.id,
                "persisted graph belongs to another commit, rebuilding it"
            );
            let collected =
                analysis::collect(&self.workspace_root, &self.config, self.parser.as_ref());
            let graph = GraphBuilder::build(&collected.parsed);
            self.replace_graph(&graph)?;
            self.fill_index(&collected);
            self.db
                .set_current_commit(&self.repo_id, snapshot.commit.as_ref())?;
            (Some(graph.stats), collected.warnings)
        };

        self.cache.insert(
            CacheKey::new(
                Purpose::ArchitectureSummary,
                self.repo_id.clone(),
                snapshot.id.as_str(),
                "",
            ),
            CachedValue::Text(summary.clone()),
            None,
        )?;

        Ok(AnalysisReport {
            repo_id: self.repo_id.clone(),
            snapshot_id: snapshot.id.clone(),
            commit: snapshot.commit.clone(),
            dirty: state.dirty,
            cached: true,
            total_files: metrics.total_files,
            metrics,
            patterns,
            architecture: summary,
            versions: VersionCounts::default(),
            build,
            warnings,
        })
    }

    /// Record every collected file at `commit`, one file at a time.
    fn track_versions(&self, collected: &Collected, commit: &Commit) -> Result<VersionCounts> {
        let tracker = self.versions();
        let mut counts = VersionCounts::default();
        for file in &collected.files {
            match tracker.track_file_version(&file.path, &file.hash, commit)?.status {
                TrackStatus::NewVersion => counts.new_versions += 1,
                TrackStatus::Unchanged => counts.unchanged += 1,
            }
        }
        debug!(
            new_versions = counts.new_versions,
            unchanged = counts.unchanged,
            "tracked file versions"
        );
        Ok(counts)
    }

    /// Persist `graph` as the repository's graph and mirror it in memory.
    ///
    /// Snapshots lose their live links here, so their file lists are
    /// preserved first.
    fn replace_graph(&self, graph: &DependencyGraph) -> Result<Arc<MemoryGraph>> {
        let preserved = self.snapshots.preserve_file_lists(&self.repo_id)?;
        if preserved > 0 {
            debug!(preserved, "preserved snapshot file lists before rebuild");
        }
        SqliteGraph::new(Arc::clone(&self.db), self.repo_id.clone()).replace(graph)?;
        let generation = self.db.graph_generation(&self.repo_id)?;

        let mirror = Arc::new(MemoryGraph::new());
        mirror.load(graph)?;
        *self
            .mirror
            .write()
            .map_err(|e| Error::Internal(format!("graph mirror lock poisoned: {e}")))? =
            Some((generation, Arc::clone(&mirror)));
        self.cache.invalidate_purpose(&self.repo_id, Purpose::Impact)?;
        Ok(mirror)
    }

    /// Replace the search index contents. Failures only cost explanation context.
    fn fill_index(&self, collected: &Collected) {
        let result = self.index.clear().and_then(|()| {
            collected
                .parsed
                .iter()
                .try_for_each(|file| self.index.add(Document::for_file(file)))
        });
        if let Err(e) = result {
            warn!(error = %e, "failed to index files for search");
        }
    }

    // === Impact Queries ===

    /// Graph for queries: this session's mirror, else the persisted graph.
    fn graph(&self) -> Result<Arc<dyn GraphStore>> {
        Ok(self.current_graph()?.1)
    }

    /// Persisted graph generation and the graph to query for it.
    ///
    /// The mirror is used only while no other session has replaced the
    /// persisted graph since this session built it.
    fn current_graph(&self) -> Result<(u64, Arc<dyn GraphStore>)> {
        let generation = self.db.graph_generation(&self.repo_id)?;
        let mirror = self
            .mirror
            .read()
            .map_err(|e| Error::Internal(format!("graph mirror lock poisoned: {e}")))?;
        Ok(match mirror.as_ref() {
            Some((built, mirror)) if *built == generation => {
                (generation, Arc::clone(mirror) as Arc<dyn GraphStore>)
            }
            _ => (
                generation,
                Arc::new(SqliteGraph::new(Arc::clone(&self.db), self.repo_id.clone())),
            ),
        })
    }

    /// Match a caller-supplied path against the files of the graph.
    pub fn resolve_file(&self, input: &str) -> Result<PathMatch> {
        let graph = self.graph()?;
        Self::resolve_in(graph.as_ref(), &self.workspace_root, input)
    }

    fn resolve_in(graph: &dyn GraphStore, root: &Path, input: &str) -> Result<PathMatch> {
        let known = file_paths(graph)?;
        Ok(resolve_path(input, root, &known))
    }

    /// Blast radius of changing `file`.
    ///
    /// A path matching no file yields an empty result for the input as given.
    pub fn get_impact(&self, file: &str, change_type: ChangeType) -> Result<ImpactResult> {
        let (generation, graph) = self.current_graph()?;
        let target = match Self::resolve_in(graph.as_ref(), &self.workspace_root, file)? {
            PathMatch::Resolved { path, .. } => path,
            PathMatch::Unresolved(raw) => {
                debug!(file = %raw, "file not in graph");
                raw
            }
        };

        // Results of an older persisted graph never match
        let key = CacheKey::new(
            Purpose::Impact,
            self.repo_id.clone(),
            target.clone(),
            format!("{}@{generation}", change_type.as_str()),
        );
        if let Some(CachedValue::Impact(result)) = self.cache.get(&key)? {
            return Ok((*result).clone());
        }
        let result = ImpactAnalyzer::new(graph.as_ref(), self.config.caller_policy)
            .analyze(&target, change_type)?;
        self.cache.insert(
            key,
            CachedValue::Impact(Arc::new(result.clone())),
            Some(result.total_affected),
        )?;
        Ok(result)
    }

    /// Blast radius of changing `file`, explained in prose.
    ///
    /// Explanations are cached per (file, change type) and discarded once the
    /// blast-radius total changes. A failing explanation service yields the
    /// template text and is never cached.
    pub fn explain_impact(&self, file: &str, change_type: ChangeType) -> Result<ImpactExplanation> {
        let impact = self.get_impact(file, change_type)?;
        let key = CacheKey::new(
            Purpose::ImpactExplanation,
            self.repo_id.clone(),
            impact.file.clone(),
            change_type.as_str(),
        );
        if let Some(CachedValue::Text(text)) = self.cache.get_fresh(&key, impact.total_affected)? {
            return Ok(ImpactExplanation {
                impact,
                explanation: Explanation {
                    text,
                    fallback: false,
                },
                cached: true,
            });
        }

        let related = match self.index.search(&impact.file, RELATED_FILES + 1) {
            Ok(hits) => hits
                .into_iter()
                .filter(|hit| hit.id != impact.file)
                .take(RELATED_FILES)
                .collect(),
            Err(e) => {
                warn!(error = %e, "search index unavailable");
                Vec::new()
            }
        };
        let explanation = explain_or_fallback(
            self.explainer.as_ref(),
            &explain::impact_prompt(&impact, &related),
            || explain::impact_fallback(&impact),
        );
        if !explanation.fallback {
            self.cache.insert(
                key,
                CachedValue::Text(explanation.text.clone()),
                Some(impact.total_affected),
            )?;
        }
        Ok(ImpactExplanation {
            impact,
            explanation,
            cached: false,
        })
    }

    /// Dependency chains from `from` to `to` of one to three hops, shortest first.
    pub fn dependency_paths(&self, from: &str, to: &str) -> Result<Vec<Vec<String>>> {
        let graph = self.graph()?;
        let resolve = |input: &str| -> Result<String> {
            Self::resolve_in(graph.as_ref(), &self.workspace_root, input)?
                .resolved()
                .map(str::to_string)
                .ok_or_else(|| Error::NotFound(format!("file '{input}' is not in the graph")))
        };
        let (from, to) = (resolve(from)?, resolve(to)?);
        let paths = graph.bounded_paths(
            &NodeKey::file(from),
            &NodeKey::file(to),
            EdgeKind::DependsOn,
            1,
            INDIRECT_MAX_HOPS,
        )?;
        Ok(paths
            .into_iter()
            .map(|path| {
                path.iter()
                    .filter_map(NodeKey::owning_file)
                    .map(str::to_string)
                    .collect()
            })
            .collect())
    }

    /// Metrics of the current graph.
    pub fn metrics(&self) -> Result<GraphMetrics> {
        let graph = self.graph()?;
        GraphMetrics::compute(graph.as_ref())
    }

    /// Summary of the latest complete snapshot.
    pub fn architecture_summary(&self) -> Result<String> {
        let snapshot = self.latest_snapshot()?.ok_or_else(|| {
            Error::NotFound("no complete analysis; run `ripple analyze` first".into())
        })?;
        let key = CacheKey::new(
            Purpose::ArchitectureSummary,
            self.repo_id.clone(),
            snapshot.id.as_str(),
            "",
        );
        if let Some(CachedValue::Text(text)) = self.cache.get(&key)? {
            return Ok(text);
        }
        let text = snapshot.summary.unwrap_or_default();
        self.cache.insert(key, CachedValue::Text(text.clone()), None)?;
        Ok(text)
    }

    /// Claims about the repository's structure with their confidence.
    ///
    /// Patterns and metrics are derived from the current graph.
    pub fn confidence_report(&self) -> Result<ConfidenceReport> {
        let graph = self.graph()?;
        let metrics = GraphMetrics::compute(graph.as_ref())?;
        let patterns = PatternDetector::detect(&file_paths(graph.as_ref())?);
        Ok(ConfidenceReport::build(&patterns, &metrics))
    }

    // === Function Calls ===

    /// Direct callers of every function named `name`.
    pub fn function_callers(&self, name: &str) -> Result<Vec<FunctionCallers>> {
        let graph = self.graph()?;
        CallGraph::new(graph.as_ref()).callers(name)
    }

    /// Callers of every function named `name` up to `depth` hops away.
    pub fn function_call_chain(&self, name: &str, depth: u32) -> Result<Vec<CallChain>> {
        let graph = self.graph()?;
        CallGraph::new(graph.as_ref()).call_chain(name, depth)
    }

    // === Snapshots ===

    fn latest_snapshot(&self) -> Result<Option<Snapshot>> {
        Ok(self
            .snapshots
            .list(&self.repo_id)?
            .into_iter()
            .find(Snapshot::is_complete))
    }

    /// Snapshots of this repository, newest first.
    pub fn get_snapshot_list(&self) -> Result<Vec<SnapshotInfo>> {
        Ok(self
            .snapshots
            .list(&self.repo_id)?
            .iter()
            .map(SnapshotInfo::from)
            .collect())
    }

    /// Compare two snapshots given by id, id prefix or commit prefix.
    pub fn compare_snapshots(&self, before: &str, after: &str) -> Result<SnapshotDiff> {
        let before = self.snapshots.resolve(&self.repo_id, before)?;
        let after = self.snapshots.resolve(&self.repo_id, after)?;
        self.snapshots.compare(&before, &after)
    }

    /// Delete a snapshot. Returns the id deleted.
    pub fn delete_snapshot(&self, reference: &str) -> Result<SnapshotId> {
        let snapshot = self.snapshots.resolve(&self.repo_id, reference)?;
        self.snapshots.delete(&snapshot.id)?;
        self.cache.invalidate(&CacheKey::new(
            Purpose::ArchitectureSummary,
            self.repo_id.clone(),
            snapshot.id.as_str(),
            "",
        ))?;
        Ok(snapshot.id)
    }

    // === Versioning ===

    /// Match a path against the files with recorded versions.
    fn tracked_path(&self, tracker: &VersionTracker, input: &str) -> Result<String> {
        let tracked = tracker.tracked_files()?;
        Ok(match resolve_path(input, &self.workspace_root, &tracked) {
            PathMatch::Resolved { path, .. } => path,
            PathMatch::Unresolved(raw) => raw,
        })
    }

    /// Record the current content of `file` at the checked-out commit.
    ///
    /// `Ok(None)` when the file does not exist.
    pub fn track_file_version(&self, file: &str) -> Result<Option<TrackOutcome>> {
        let commit = self
            .vcs
            .head(&self.workspace_root)?
            .ok_or_else(|| Error::InvalidInput("workspace is not under version control".into()))?;
        self.register()?;
        let path = Path::new(file);
        let relative = if path.is_absolute() {
            scan::relative_path(&self.workspace_root, path)
        } else {
            file.replace('\\', "/")
        };
        self.versions()
            .track_file(&self.workspace_root, &relative, &commit)
    }

    /// Versions of a file, newest first.
    pub fn get_file_history(&self, file: &str) -> Result<Vec<HistoryEntry>> {
        let tracker = self.versions();
        let path = self.tracked_path(&tracker, file)?;
        tracker.file_history(&path)
    }

    /// Compare a file on disk with its latest recorded version.
    pub fn check_integrity(&self, file: &str) -> Result<IntegrityStatus> {
        let tracker = self.versions();
        let path = self.tracked_path(&tracker, file)?;
        tracker.check_integrity(&self.workspace_root, &path)
    }

    /// Import up to `max_commits` commits (default: `history-depth`).
    pub fn import_history(&self, max_commits: Option<usize>) -> Result<HistoryImport> {
        self.register()?;
        self.versions().import_history(
            self.vcs.as_ref(),
            &self.workspace_root,
            max_commits.unwrap_or(self.config.history_depth),
            &self.config.languages,
        )
    }

    /// Recorded commits, newest first.
    pub fn commit_history(&self) -> Result<Vec<CommitLink>> {
        self.versions().commit_chain()
    }

    /// Per-author activity in this repository.
    pub fn contributions(&self) -> Result<Vec<Contribution>> {
        self.versions().contributions()
    }

    /// Registry entry and lineage counts.
    pub fn status(&self) -> Result<RepoStatus> {
        let tracker = self.versions();
        let snapshots = self.snapshots.list(&self.repo_id)?;
        Ok(RepoStatus {
            repository: self.db.get_repository(&self.repo_id)?,
            tracked_files: tracker.tracked_files()?.len(),
            versions: tracker.version_count()?,
            commits: tracker.commit_chain()?.len(),
            latest_snapshot: snapshots
                .iter()
                .find(|s| s.is_complete())
                .map(SnapshotInfo::from),
            snapshots: snapshots.len(),
        })
    }

    // === Repositories ===

    /// Every registered repository.
    pub fn list_repositories(&self) -> Result<Vec<Repository>> {
        self.db.list_repositories()
    }

    /// Delete a repository with its graph, lineage and snapshots.
    pub fn delete_repository(&self, repo_id: &RepoId) -> Result<bool> {
        let deleted = self.db.delete_repository(repo_id)?;
        self.cache.invalidate_repo(repo_id)?;
        if repo_id == &self.repo_id {
            *self
                .mirror
                .write()
                .map_err(|e| Error::Internal(format!("graph mirror lock poisoned: {e}")))? = None;
        }
        if deleted {
            info!(repo_id = %repo_id, "deleted repository");
        }
        Ok(deleted)
    }
}

/// Paths of the file nodes of `graph`, in key order.
fn file_paths(graph: &dyn GraphStore) -> Result<Vec<String>> {
    Ok(graph
        .nodes(NodeKind::File)?
        .into_iter()
        .filter_map(|node| match node.key {
            NodeKey::File { path } => Some(path),
            _ => None,
        })
        .collect())
}
