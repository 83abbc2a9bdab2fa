//! Tests for analysis passes and snapshot reuse.

mod common;

use std::fs;
use std::sync::Arc;

use common::{BrokenVcs, ScriptedVcs, session, shop, write};
use ripple::{NoSourceControl, Ripple, SessionOptions, WarningKind};
use tempfile::TempDir;

// === Snapshot Reuse ===

#[test]
fn second_analysis_of_same_commit_reuses_snapshot() {
    let dir = TempDir::new().expect("create temp dir");
    shop(dir.path());
    let ripple = session(dir.path(), ScriptedVcs::at("a1a1a1a1a1a1"));

    let first = ripple.analyze().expect("first analysis");
    let second = ripple.analyze().expect("second analysis");

    assert!(!first.cached);
    assert!(first.build.is_some());
    assert_eq!(first.versions.new_versions, 5);

    assert!(second.cached, "same commit should reuse the snapshot");
    assert_eq!(second.snapshot_id, first.snapshot_id);
    assert!(second.build.is_none(), "reuse should not rebuild the graph");
    assert_eq!(second.total_files, first.total_files);
    assert_eq!(
        second.metrics.total_dependencies,
        first.metrics.total_dependencies
    );
    assert_eq!(second.architecture, first.architecture);
    assert_eq!(ripple.get_snapshot_list().expect("list").len(), 1);
}

#[test]
fn new_commit_produces_new_snapshot() {
    let dir = TempDir::new().expect("create temp dir");
    shop(dir.path());
    let vcs = ScriptedVcs::at("a1a1a1a1a1a1");
    let ripple = session(dir.path(), vcs.clone());

    let first = ripple.analyze().expect("first analysis");
    write(dir.path(), "services/shipping.py", "from models import Order\n");
    vcs.checkout("b2b2b2b2b2b2", 1_700_000_100);
    let second = ripple.analyze().expect("second analysis");

    assert!(!second.cached);
    assert_ne!(second.snapshot_id, first.snapshot_id);
    assert_eq!(second.total_files, first.total_files + 1);
    // Versions are keyed by commit, so every file is recorded again
    assert_eq!(second.versions.new_versions, 6);
    assert_eq!(ripple.get_snapshot_list().expect("list").len(), 2);
}

#[test]
fn dirty_tree_is_never_reused() {
    let dir = TempDir::new().expect("create temp dir");
    shop(dir.path());
    let vcs = ScriptedVcs::at("a1a1a1a1a1a1");
    vcs.set_dirty(true);
    let ripple = session(dir.path(), vcs);

    let first = ripple.analyze().expect("first analysis");
    let second = ripple.analyze().expect("second analysis");

    assert!(first.dirty);
    assert!(!first.cached);
    assert!(!second.cached, "a dirty tree must always be re-analyzed");
    assert_ne!(first.snapshot_id, second.snapshot_id);
    assert_eq!(first.versions.new_versions, 0, "dirty content is not versioned");
    assert_eq!(ripple.versions().version_count().expect("count"), 0);
}

#[test]
fn clean_reuse_after_dirty_pass_rebuilds_graph() {
    let dir = TempDir::new().expect("create temp dir");
    shop(dir.path());
    let vcs = ScriptedVcs::at("a1a1a1a1a1a1");
    let ripple = session(dir.path(), vcs.clone());

    let clean = ripple.analyze().expect("clean analysis");

    // Uncommitted file shows up in the graph of the dirty pass
    write(dir.path(), "scratch.py", "import models\n");
    vcs.set_dirty(true);
    let dirty = ripple.analyze().expect("dirty analysis");
    assert_eq!(dirty.total_files, clean.total_files + 1);

    fs::remove_file(dir.path().join("scratch.py")).expect("remove scratch");
    vcs.set_dirty(false);
    let again = ripple.analyze().expect("clean again");

    assert!(again.cached);
    assert_eq!(again.snapshot_id, clean.snapshot_id);
    assert!(
        again.build.is_some(),
        "graph built from uncommitted content must be replaced"
    );
    let impact = ripple
        .get_impact("models.py", ripple::ChangeType::Modify)
        .expect("impact");
    assert!(!impact.direct_dependents.contains(&"scratch.py".to_string()));
}

#[test]
fn reuse_across_sessions_skips_rebuild() {
    let dir = TempDir::new().expect("create temp dir");
    shop(dir.path());
    let vcs = ScriptedVcs::at("c3c3c3c3c3c3");
    let options = || SessionOptions {
        source_control: Some(vcs.clone()),
        ..SessionOptions::default()
    };

    let first = {
        let ripple = Ripple::open_with(dir.path(), options()).expect("open first session");
        ripple.analyze().expect("first analysis")
    };
    let ripple = Ripple::open_with(dir.path(), options()).expect("open second session");
    let second = ripple.analyze().expect("second analysis");

    assert!(second.cached);
    assert_eq!(second.snapshot_id, first.snapshot_id);
    assert!(second.build.is_none());
    assert!(dir.path().join(".ripple/ripple.db").exists());

    // Queries in the new session are served by the persisted graph
    let impact = ripple
        .get_impact("models.py", ripple::ChangeType::Modify)
        .expect("impact");
    assert_eq!(
        impact.direct_dependents,
        vec!["services/billing.py", "services/orders.py"]
    );
}

// === Degraded Inputs ===

#[test]
fn without_version_control_every_pass_is_fresh() {
    let dir = TempDir::new().expect("create temp dir");
    shop(dir.path());
    let ripple = session(dir.path(), Arc::new(NoSourceControl));

    let first = ripple.analyze().expect("first analysis");
    let second = ripple.analyze().expect("second analysis");

    assert!(first.commit.is_none());
    assert!(!second.cached);
    assert_ne!(first.snapshot_id, second.snapshot_id);
    assert_eq!(first.total_files, 5);
}

#[test]
fn failing_version_control_degrades_to_uncached_analysis() {
    let dir = TempDir::new().expect("create temp dir");
    shop(dir.path());
    let ripple = session(dir.path(), Arc::new(BrokenVcs));

    let report = ripple.analyze().expect("analysis should still succeed");

    assert!(report.commit.is_none());
    assert!(!report.cached);
    assert_eq!(report.total_files, 5);
}

#[test]
fn unreadable_files_become_warnings() {
    let dir = TempDir::new().expect("create temp dir");
    shop(dir.path());
    fs::write(dir.path().join("legacy.py"), [0xc3, 0x28, 0xa0]).expect("write bytes");
    let ripple = session(dir.path(), ScriptedVcs::at("d4d4d4d4d4d4"));

    let report = ripple.analyze().expect("analysis");

    assert_eq!(report.total_files, 5);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].kind, WarningKind::EncodingError);
}

#[test]
fn non_ascii_source_is_analyzed_and_reused() {
    let dir = TempDir::new().expect("create temp dir");
    shop(dir.path());
    write(
        dir.path(),
        "services/labels.py",
        "def label(order):\n    return f\"total → {fmt(order)}\" + “note”…trim(order)\n",
    );
    write(dir.path(), "web/price.js", "const area = a×b(1);\n");
    let ripple = session(dir.path(), ScriptedVcs::at("a1a1a1a1a1a1"));

    let first = ripple.analyze().expect("first analysis");
    let second = ripple.analyze().expect("second analysis");

    assert!(!first.cached);
    assert_eq!(first.total_files, 7);
    assert!(first.warnings.is_empty(), "warnings: {:?}", first.warnings);
    assert!(second.cached);
    assert_eq!(second.snapshot_id, first.snapshot_id);
}

#[test]
fn report_carries_metrics_and_patterns() {
    let dir = TempDir::new().expect("create temp dir");
    shop(dir.path());
    write(dir.path(), "tests/test_orders.py", "import services.orders\n");
    let ripple = session(dir.path(), ScriptedVcs::at("e5e5e5e5e5e5"));

    let report = ripple.analyze().expect("analysis");

    assert_eq!(report.metrics.total_files, 6);
    assert_eq!(report.metrics.cycle_count, 0);
    assert!(report.metrics.total_dependencies >= 5);
    assert!(!report.patterns.is_empty());
    assert!(!report.architecture.is_empty());
    assert_eq!(
        ripple.architecture_summary().expect("summary"),
        report.architecture
    );
}

#[test]
fn cycles_are_reported_in_metrics() {
    let dir = TempDir::new().expect("create temp dir");
    write(dir.path(), "a.py", "import b\n");
    write(dir.path(), "b.py", "import c\n");
    write(dir.path(), "c.py", "import a\n");
    let ripple = session(dir.path(), Arc::new(NoSourceControl));

    let report = ripple.analyze().expect("analysis");

    assert_eq!(report.metrics.cycle_count, 1);
    let mut cycle = report.metrics.cycles[0].clone();
    cycle.sort();
    assert_eq!(cycle, vec!["a.py", "b.py", "c.py"]);
    assert_eq!(ripple.metrics().expect("metrics").cycle_count, 1);
}
