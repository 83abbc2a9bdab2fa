//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use ripple::{
    Commit, CommitHash, CommitInfo, Error, Result, Ripple, RippleConfig, SessionOptions,
    SourceControl,
};

/// URL every scripted repository reports.
pub const REPO_URL: &str = "https://example.com/acme/shop.git";

#[derive(Default)]
struct VcsState {
    head: Option<Commit>,
    dirty: bool,
    history: Vec<CommitInfo>,
    contents: HashMap<(String, String), Vec<u8>>,
}

/// Version control whose answers are set by the test.
#[derive(Default)]
pub struct ScriptedVcs {
    state: Mutex<VcsState>,
}

impl ScriptedVcs {
    /// Repository with `hash` checked out and a clean tree.
    pub fn at(hash: &str) -> Arc<Self> {
        let vcs = Arc::new(Self::default());
        vcs.checkout(hash, 1_700_000_000);
        vcs
    }

    /// Check out a new commit and clean the tree.
    pub fn checkout(&self, hash: &str, secs: i64) {
        let mut state = self.state.lock().expect("vcs state");
        state.head = Some(commit(hash, "dev", secs));
        state.dirty = false;
    }

    /// Mark the tree as having uncommitted changes (or not).
    pub fn set_dirty(&self, dirty: bool) {
        self.state.lock().expect("vcs state").dirty = dirty;
    }

    /// Append a commit to the history, newest last, with file contents.
    pub fn push_history(&self, commit: Commit, files: &[(&str, &str)]) {
        let mut state = self.state.lock().expect("vcs state");
        for (path, content) in files {
            state.contents.insert(
                (commit.hash.to_string(), (*path).to_string()),
                content.as_bytes().to_vec(),
            );
        }
        state.history.push(CommitInfo {
            commit,
            changed_files: files.iter().map(|(path, _)| (*path).to_string()).collect(),
        });
    }
}

impl SourceControl for ScriptedVcs {
    fn head(&self, _root: &Path) -> Result<Option<Commit>> {
        Ok(self.state.lock().expect("vcs state").head.clone())
    }

    fn is_dirty(&self, _root: &Path) -> Result<bool> {
        Ok(self.state.lock().expect("vcs state").dirty)
    }

    fn remote_url(&self, _root: &Path) -> Result<Option<String>> {
        Ok(Some(REPO_URL.to_string()))
    }

    fn history(&self, _root: &Path, max: usize) -> Result<Vec<CommitInfo>> {
        let state = self.state.lock().expect("vcs state");
        Ok(state.history.iter().rev().take(max).cloned().collect())
    }

    fn file_at(&self, _root: &Path, commit: &CommitHash, path: &str) -> Result<Option<Vec<u8>>> {
        let state = self.state.lock().expect("vcs state");
        Ok(state
            .contents
            .get(&(commit.to_string(), path.to_string()))
            .cloned())
    }
}

/// Version control that always fails.
pub struct BrokenVcs;

impl SourceControl for BrokenVcs {
    fn head(&self, _root: &Path) -> Result<Option<Commit>> {
        Err(Error::SourceControl("repository is corrupt".into()))
    }

    fn is_dirty(&self, _root: &Path) -> Result<bool> {
        Err(Error::SourceControl("repository is corrupt".into()))
    }

    fn remote_url(&self, _root: &Path) -> Result<Option<String>> {
        Err(Error::SourceControl("repository is corrupt".into()))
    }

    fn history(&self, _root: &Path, _max: usize) -> Result<Vec<CommitInfo>> {
        Err(Error::SourceControl("repository is corrupt".into()))
    }

    fn file_at(&self, _root: &Path, _commit: &CommitHash, _path: &str) -> Result<Option<Vec<u8>>> {
        Err(Error::SourceControl("repository is corrupt".into()))
    }
}

/// Build a commit record.
pub fn commit(hash: &str, author: &str, secs: i64) -> Commit {
    Commit {
        hash: CommitHash::new(hash),
        message: format!("commit {hash}"),
        author: author.to_string(),
        timestamp: Utc.timestamp_opt(secs, 0).single().expect("valid timestamp"),
    }
}

/// Write `content` to `root/rel`, creating parent directories.
pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, content).expect("write file");
}

/// In-memory session over `root` driven by `vcs`.
pub fn session(root: &Path, vcs: Arc<dyn SourceControl>) -> Ripple {
    Ripple::open_in_memory(
        root,
        SessionOptions {
            source_control: Some(vcs),
            ..SessionOptions::default()
        },
    )
    .expect("open session")
}

/// In-memory session with an explicit configuration.
pub fn session_with_config(
    root: &Path,
    vcs: Arc<dyn SourceControl>,
    config: RippleConfig,
) -> Ripple {
    Ripple::open_in_memory(
        root,
        SessionOptions {
            source_control: Some(vcs),
            config: Some(config),
            ..SessionOptions::default()
        },
    )
    .expect("open session")
}

/// A small Python project:
///
/// ```text
/// app.py -> services/orders.py -> models.py
///        -> services/billing.py -> models.py
/// ```
pub fn shop(root: &Path) {
    write(
        root,
        "app.py",
        "import services.orders\nimport services.billing\n\ndef main():\n    services.orders.place()\n    services.billing.charge()\n",
    );
    write(root, "services/__init__.py", "");
    write(
        root,
        "services/orders.py",
        "from models import Order\n\ndef place():\n    return Order()\n",
    );
    write(
        root,
        "services/billing.py",
        "from models import Invoice\n\ndef charge():\n    return Invoice()\n",
    );
    write(
        root,
        "models.py",
        "class Order:\n    pass\n\nclass Invoice:\n    pass\n",
    );
}
