//! Smoke test against a real git repository.
//!
//! Skipped when `git` is not installed.

mod common;

use std::path::Path;
use std::process::Command;

use common::shop;
use ripple::{ChangeType, Ripple};
use tempfile::TempDir;

fn git(root: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .arg("-C")
        .arg(root)
        .args(["-c", "user.name=Ripple Test", "-c", "user.email=test@example.com"])
        .args(args)
        .output()
        .is_ok_and(|output| output.status.success())
}

#[test]
fn analysis_of_git_checkout_is_reused() {
    let dir = TempDir::new().expect("create temp dir");
    if !git(dir.path(), &["init", "-q"]) {
        eprintln!("git not available, skipping");
        return;
    }
    shop(dir.path());
    assert!(git(dir.path(), &["add", "."]));
    assert!(git(dir.path(), &["commit", "-q", "-m", "initial shop"]));

    let ripple = Ripple::open(dir.path()).expect("open session");
    let first = ripple.analyze().expect("first analysis");
    let second = ripple.analyze().expect("second analysis");

    assert!(first.commit.is_some());
    assert!(!first.dirty, "the data directory must not dirty the tree");
    assert!(second.cached);
    assert_eq!(second.snapshot_id, first.snapshot_id);

    let history = ripple.get_file_history("models.py").expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].author, "Ripple Test");

    let impact = ripple
        .get_impact("models.py", ChangeType::Modify)
        .expect("impact");
    assert_eq!(impact.total_affected, 3);

    let import = ripple.import_history(None).expect("import");
    assert_eq!(import.commits, 1);
    assert_eq!(import.new_commits, 0);
}
