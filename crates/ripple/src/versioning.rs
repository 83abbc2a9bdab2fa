//! Content fingerprints and per-file version lineage.
//!
//! A version is the triple (file, content hash, commit). Tracking the same
//! triple twice is a no-op; anything else appends to the file's chain, linked
//! to the immediately preceding version.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::db::{Database, NewVersion};
use crate::error::Result;
use crate::types::{
    Commit, CommitHash, ContentHash, Contribution, HistoryEntry, IntegrityStatus, Language,
    RepoId, TrackOutcome, TrackStatus,
};
use crate::vcs::SourceControl;

const READ_CHUNK: usize = 8192;

/// Length of repository ids, in hex characters.
const REPO_ID_LEN: usize = 16;

/// Lowercase hex encoding.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// SHA-256 of a byte slice.
#[must_use]
pub fn fingerprint_bytes(bytes: &[u8]) -> ContentHash {
    ContentHash::new(to_hex(&Sha256::digest(bytes)))
}

/// SHA-256 of a file's raw bytes, read in chunks.
///
/// Returns `Ok(None)` when the path does not exist or is not a regular file.
///
/// # Errors
///
/// Returns `Error::Io` if the file exists but cannot be read.
pub fn fingerprint_file(path: &Path) -> Result<Option<ContentHash>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if !file.metadata()?.is_file() {
        return Ok(None);
    }

    let mut hasher = Sha256::new();
    let mut buf = [0u8; READ_CHUNK];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(Some(ContentHash::new(to_hex(&hasher.finalize()))))
}

/// Repository identity: derived from the remote URL when known, else from the
/// local path.
#[must_use]
pub fn repo_id_for(url: Option<&str>, local_path: &Path) -> RepoId {
    let source = match url {
        Some(url) if !url.trim().is_empty() => url.trim().to_string(),
        _ => local_path
            .canonicalize()
            .unwrap_or_else(|_| local_path.to_path_buf())
            .to_string_lossy()
            .into_owned(),
    };
    let digest = to_hex(&Sha256::digest(source.as_bytes()));
    RepoId::new(&digest[..REPO_ID_LEN])
}

/// Counts from a history import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct HistoryImport {
    /// Commits walked
    pub commits: usize,
    /// Commits not seen before
    pub new_commits: usize,
    /// Versions created
    pub new_versions: usize,
}

/// A recorded commit and the commit it follows.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CommitLink {
    /// The commit
    pub commit: Commit,
    /// Immediately preceding recorded commit
    pub previous: Option<CommitHash>,
}

/// Version lineage of one repository.
pub struct VersionTracker {
    db: Arc<Database>,
    repo_id: RepoId,
}

#[allow(clippy::missing_errors_doc)]
impl VersionTracker {
    /// Create a tracker for a registered repository.
    #[must_use]
    pub fn new(db: Arc<Database>, repo_id: RepoId) -> Self {
        Self { db, repo_id }
    }

    /// Record that `file` had content `hash` at `commit`.
    ///
    /// The commit is recorded first so the commit chain always covers every
    /// commit a version refers to.
    pub fn track_file_version(
        &self,
        file: &str,
        hash: &ContentHash,
        commit: &Commit,
    ) -> Result<TrackOutcome> {
        self.db.record_commit(&self.repo_id, commit)?;
        let (_, created) = self.db.insert_version(
            &self.repo_id,
            &NewVersion {
                file,
                content_hash: hash,
                commit: &commit.hash,
                timestamp: commit.timestamp.timestamp(),
                author: &commit.author,
            },
        )?;
        let status = if created {
            debug!(file, hash = %hash, commit = commit.hash.short(), "recorded new version");
            TrackStatus::NewVersion
        } else {
            TrackStatus::Unchanged
        };
        Ok(TrackOutcome {
            status,
            hash: hash.clone(),
            commit: commit.hash.short().to_string(),
        })
    }

    /// Fingerprint `root/file` and track it. `Ok(None)` if the file is gone.
    pub fn track_file(&self, root: &Path, file: &str, commit: &Commit) -> Result<Option<TrackOutcome>> {
        match fingerprint_file(&root.join(file))? {
            Some(hash) => self.track_file_version(file, &hash, commit).map(Some),
            None => Ok(None),
        }
    }

    /// Versions of a file, newest first.
    pub fn file_history(&self, file: &str) -> Result<Vec<HistoryEntry>> {
        self.db.file_history(&self.repo_id, file)
    }

    /// Recorded commits, newest first.
    pub fn commit_chain(&self) -> Result<Vec<CommitLink>> {
        Ok(self
            .db
            .commit_chain(&self.repo_id)?
            .into_iter()
            .map(|(commit, previous)| CommitLink { commit, previous })
            .collect())
    }

    /// Number of recorded versions.
    pub fn version_count(&self) -> Result<u64> {
        self.db.version_count(&self.repo_id)
    }

    /// Paths with at least one recorded version.
    pub fn tracked_files(&self) -> Result<Vec<String>> {
        self.db.tracked_files(&self.repo_id)
    }

    /// Per-author activity, most versions first.
    pub fn contributions(&self) -> Result<Vec<Contribution>> {
        self.db.contributions(&self.repo_id)
    }

    /// Compare the file on disk with its latest recorded version.
    pub fn check_integrity(&self, root: &Path, file: &str) -> Result<IntegrityStatus> {
        let Some(latest) = self.db.latest_version(&self.repo_id, file)? else {
            return Ok(IntegrityStatus::NotTracked);
        };
        let current = fingerprint_file(&root.join(file))?;
        match current {
            Some(hash) if hash == latest.content_hash => Ok(IntegrityStatus::Intact { hash }),
            Some(hash) => Ok(IntegrityStatus::Tampered {
                message: format!(
                    "content differs from version recorded at {}",
                    latest.commit.short()
                ),
                stored_hash: latest.content_hash,
                current_hash: Some(hash),
            }),
            None => Ok(IntegrityStatus::Tampered {
                message: format!(
                    "file missing; last recorded at {}",
                    latest.commit.short()
                ),
                stored_hash: latest.content_hash,
                current_hash: None,
            }),
        }
    }

    /// Walk up to `max_commits` commits oldest first, recording each commit
    /// and a version of every changed file in `languages` as it was at that
    /// commit.
    pub fn import_history(
        &self,
        vcs: &dyn SourceControl,
        root: &Path,
        max_commits: usize,
        languages: &[Language],
    ) -> Result<HistoryImport> {
        let mut history = vcs.history(root, max_commits)?;
        history.reverse();

        let mut import = HistoryImport::default();
        for info in &history {
            import.commits += 1;
            if self.db.record_commit(&self.repo_id, &info.commit)? {
                import.new_commits += 1;
            }
            for file in &info.changed_files {
                let supported = Path::new(file)
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .and_then(Language::from_extension)
                    .is_some_and(|lang| languages.contains(&lang));
                if !supported {
                    continue;
                }
                let content = match vcs.file_at(root, &info.commit.hash, file) {
                    Ok(Some(content)) => content,
                    // Deleted by this commit
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(file, commit = info.commit.hash.short(), error = %e, "cannot read file at commit");
                        continue;
                    }
                };
                let outcome =
                    self.track_file_version(file, &fingerprint_bytes(&content), &info.commit)?;
                if outcome.status == TrackStatus::NewVersion {
                    import.new_versions += 1;
                }
            }
        }
        info!(
            repo_id = %self.repo_id,
            commits = import.commits,
            new_versions = import.new_versions,
            "imported commit history"
        );
        Ok(import)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::datetime_from_secs;
    use crate::types::{CommitHash, Repository};
    use std::fs;
    use tempfile::TempDir;

    fn tracker() -> VersionTracker {
        let db = Arc::new(Database::in_memory().expect("db"));
        db.upsert_repository(&Repository {
            repo_id: RepoId::new("r"),
            url: None,
            local_path: "/r".into(),
            current_commit: None,
        })
        .expect("register");
        VersionTracker::new(db, RepoId::new("r"))
    }

    fn commit(hash: &str, secs: i64) -> Commit {
        Commit {
            hash: CommitHash::new(hash),
            message: "msg".into(),
            author: "dev".into(),
            timestamp: datetime_from_secs(secs),
        }
    }

    #[test]
    fn fingerprint_is_sha256_hex() {
        assert_eq!(
            fingerprint_bytes(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn file_fingerprint_matches_byte_fingerprint_across_chunks() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("big.py");
        let content = vec![b'x'; READ_CHUNK * 3 + 17];
        fs::write(&path, &content).expect("write");

        assert_eq!(
            fingerprint_file(&path).expect("hash"),
            Some(fingerprint_bytes(&content))
        );
    }

    #[test]
    fn fingerprint_of_missing_or_directory_is_none() {
        let dir = TempDir::new().expect("temp dir");
        assert_eq!(fingerprint_file(&dir.path().join("nope")).expect("missing"), None);
        assert_eq!(fingerprint_file(dir.path()).expect("dir"), None);
    }

    #[test]
    fn repo_id_prefers_url_and_has_fixed_length() {
        let a = repo_id_for(Some("https://example.com/a.git"), Path::new("/x"));
        let b = repo_id_for(Some("https://example.com/a.git"), Path::new("/y"));
        let c = repo_id_for(None, Path::new("/x"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), REPO_ID_LEN);
    }

    #[test]
    fn tracking_same_triple_twice_is_unchanged() {
        let tracker = tracker();
        let hash = fingerprint_bytes(b"print(1)");
        let c1 = commit("c1aaaaaaaaaa", 100);

        let first = tracker.track_file_version("a.py", &hash, &c1).expect("first");
        let second = tracker.track_file_version("a.py", &hash, &c1).expect("second");

        assert_eq!(first.status, TrackStatus::NewVersion);
        assert_eq!(second.status, TrackStatus::Unchanged);
        assert_eq!(second.commit, "c1aaaaaa");
        assert_eq!(tracker.file_history("a.py").expect("history").len(), 1);
    }

    #[test]
    fn commits_link_to_their_predecessor() {
        let tracker = tracker();
        let hash = fingerprint_bytes(b"x");
        tracker.track_file_version("a.py", &hash, &commit("c1", 100)).expect("c1");
        tracker.track_file_version("b.py", &hash, &commit("c2", 200)).expect("c2");

        let chain = tracker.commit_chain().expect("chain");
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].commit.hash.as_str(), "c2");
        assert_eq!(chain[0].previous, Some(CommitHash::new("c1")));
        assert_eq!(chain[1].previous, None);
        assert_eq!(tracker.version_count().expect("count"), 2);
        assert_eq!(tracker.tracked_files().expect("files"), vec!["a.py", "b.py"]);
    }

    #[test]
    fn integrity_reports_all_three_states() {
        let dir = TempDir::new().expect("temp dir");
        let tracker = tracker();
        fs::write(dir.path().join("a.py"), "x = 1\n").expect("write");

        assert_eq!(
            tracker.check_integrity(dir.path(), "a.py").expect("check"),
            IntegrityStatus::NotTracked
        );

        tracker
            .track_file(dir.path(), "a.py", &commit("c1", 100))
            .expect("track");
        assert!(matches!(
            tracker.check_integrity(dir.path(), "a.py").expect("check"),
            IntegrityStatus::Intact { .. }
        ));

        fs::write(dir.path().join("a.py"), "x = 2\n").expect("rewrite");
        let IntegrityStatus::Tampered { current_hash, .. } =
            tracker.check_integrity(dir.path(), "a.py").expect("check")
        else {
            panic!("expected tampered");
        };
        assert_eq!(current_hash, Some(fingerprint_bytes(b"x = 2\n")));

        fs::remove_file(dir.path().join("a.py")).expect("remove");
        assert!(matches!(
            tracker.check_integrity(dir.path(), "a.py").expect("check"),
            IntegrityStatus::Tampered { current_hash: None, .. }
        ));
    }
}
