//! Database schema definition for Ripple.

/// Database schema definition.
pub(crate) const SCHEMA: &str = r"
-- Registered repositories
CREATE TABLE IF NOT EXISTS repositories (
    repo_id TEXT PRIMARY KEY,
    url TEXT,
    local_path TEXT NOT NULL,
    current_commit TEXT,
    -- bumped whenever the persisted graph is replaced
    graph_generation INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL
);

-- Persisted dependency graph (one graph per repository)
-- key: path for files, path#name for functions, module name for modules
CREATE TABLE IF NOT EXISTS nodes (
    id INTEGER PRIMARY KEY,
    repo_id TEXT NOT NULL REFERENCES repositories(repo_id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    key TEXT NOT NULL,
    file_path TEXT,
    language TEXT,
    line INTEGER,
    UNIQUE (repo_id, kind, key)
);

CREATE INDEX IF NOT EXISTS idx_nodes_file ON nodes(repo_id, file_path);

CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY,
    repo_id TEXT NOT NULL REFERENCES repositories(repo_id) ON DELETE CASCADE,
    from_id INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    to_id INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    UNIQUE (from_id, to_id, kind)
);

CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_id, kind);
CREATE INDEX IF NOT EXISTS idx_edges_from ON edges(from_id, kind);

-- Commit chain: previous_hash links to the immediately preceding commit
-- timestamp is seconds since the Unix epoch
CREATE TABLE IF NOT EXISTS commits (
    repo_id TEXT NOT NULL REFERENCES repositories(repo_id) ON DELETE CASCADE,
    hash TEXT NOT NULL,
    message TEXT NOT NULL,
    author TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    previous_hash TEXT,
    PRIMARY KEY (repo_id, hash)
);

CREATE INDEX IF NOT EXISTS idx_commits_time ON commits(repo_id, timestamp);

-- Per-file version chain: at most one row per (file, content hash, commit)
CREATE TABLE IF NOT EXISTS versions (
    id INTEGER PRIMARY KEY,
    repo_id TEXT NOT NULL REFERENCES repositories(repo_id) ON DELETE CASCADE,
    file_path TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    commit_hash TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    author TEXT NOT NULL,
    previous_id INTEGER REFERENCES versions(id) ON DELETE SET NULL,
    UNIQUE (repo_id, file_path, content_hash, commit_hash)
);

CREATE INDEX IF NOT EXISTS idx_versions_file ON versions(repo_id, file_path, timestamp);
CREATE INDEX IF NOT EXISTS idx_versions_author ON versions(repo_id, author);

-- Cached analysis results
-- created_at is milliseconds since the Unix epoch
-- metrics/patterns/edges/file_list are JSON payloads
CREATE TABLE IF NOT EXISTS snapshots (
    id TEXT PRIMARY KEY,
    repo_id TEXT NOT NULL REFERENCES repositories(repo_id) ON DELETE CASCADE,
    commit_hash TEXT,
    dirty INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    complete INTEGER NOT NULL DEFAULT 0,
    metrics TEXT,
    patterns TEXT,
    summary TEXT,
    edges TEXT,
    file_list TEXT
);

-- Only one reusable snapshot per clean commit
CREATE UNIQUE INDEX IF NOT EXISTS idx_snapshots_commit
    ON snapshots(repo_id, commit_hash)
    WHERE dirty = 0 AND commit_hash IS NOT NULL;

-- Live links from a snapshot to the file nodes it was computed from.
-- Rebuilding a repository's graph deletes the old nodes and, with them, these links.
CREATE TABLE IF NOT EXISTS snapshot_files (
    snapshot_id TEXT NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
    node_id INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    content_hash TEXT NOT NULL,
    PRIMARY KEY (snapshot_id, node_id)
);
";
