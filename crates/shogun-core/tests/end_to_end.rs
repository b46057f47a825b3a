//! Multi-module integration scenarios: full check-in -> collect -> approval
//! round trips against a real Git working tree, mirroring the teacher's
//! `tests/` directory convention of exercising whole pipelines rather than
//! single functions.

use std::process::Command;

use shogun_core::checkin::{CheckInInput, Phase, SkillCandidate, TestsResult};
use shogun_core::layout::Layout;
use shogun_core::{checkin, collector};

fn init_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    for args in [
        vec!["init"],
        vec!["config", "user.name", "Test"],
        vec!["config", "user.email", "test@example.com"],
        vec!["config", "commit.gpgsign", "false"],
    ] {
        Command::new("git").args(&args).current_dir(root).output().unwrap();
    }
    std::fs::write(root.join("README.md"), "hi\n").unwrap();
    Command::new("git").args(["add", "README.md"]).current_dir(root).output().unwrap();
    Command::new("git")
        .args(["commit", "-m", "init"])
        .current_dir(root)
        .output()
        .unwrap();
    dir
}

fn base_input(worker: &str, timestamp: &str, issue: u64) -> CheckInInput {
    CheckInInput {
        worker: worker.to_owned(),
        timestamp: timestamp.to_owned(),
        issue,
        phase: Phase::Implementing,
        progress_percent: 50,
        summary: "wired up the new endpoint".to_owned(),
        worktree_root: std::path::PathBuf::from("/repo/ws/worker1"),
        toplevel: std::path::PathBuf::from("/repo"),
        files_changed: vec!["src/lib.rs".to_owned()],
        tests_command: Some("cargo test".to_owned()),
        tests_result: Some(TestsResult::Pass),
        needs_approval: false,
        requested_files: vec![],
        blocker: String::new(),
        skill_candidates: vec![],
        next: vec![],
    }
}

/// A worker appends a check-in; collect folds it into state.yaml and
/// rewrites dashboard.md; a second collect with no new check-ins leaves
/// `recent_checkins` untouched but still refreshes Action Required.
#[test]
fn checkin_then_collect_updates_state_and_dashboard() {
    let repo = init_repo();
    let layout = Layout::materialize(repo.path()).unwrap();

    checkin::produce(&layout, base_input("worker1", "20260129T120000Z", 42)).unwrap();
    let report = collector::collect(&layout).unwrap();
    assert_eq!(report.processed, 1);

    let dashboard = std::fs::read_to_string(layout.dashboard_path()).unwrap();
    assert!(dashboard.contains("# Agentic-SDD Ops Dashboard"));
    assert!(dashboard.contains("## Recent Check-ins"));

    let archived = layout
        .checkin_archive_dir("worker1")
        .join("20260129T120000Z.yaml");
    assert!(archived.is_file(), "check-in should be archived after collect");
    assert!(!layout
        .checkin_queue_dir("worker1")
        .join("20260129T120000Z.yaml")
        .exists());

    let second = collector::collect(&layout).unwrap();
    assert_eq!(second.processed, 0);
}

/// A check-in carrying a skill candidate produces a `skill_candidate`
/// decision that a subsequent `approve_skill` call turns into a scaffolded
/// skill document, end to end across collector, decision, and approval.
#[test]
fn skill_candidate_checkin_flows_through_to_approved_skill() {
    let repo = init_repo();
    let layout = Layout::materialize(repo.path()).unwrap();

    let mut input = base_input("worker1", "20260129T120000Z", 42);
    input.skill_candidates = vec![SkillCandidate {
        name: "retry-logic".to_owned(),
        summary: "shared backoff helper".to_owned(),
    }];
    checkin::produce(&layout, input).unwrap();
    collector::collect(&layout).unwrap();

    let decisions: Vec<_> = std::fs::read_dir(layout.decision_queue_dir())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    let decision_path = decisions
        .iter()
        .find(|p| p.to_string_lossy().contains("DEC-SC"))
        .expect("a skill_candidate decision should have been created");
    let decision_id = decision_path.file_stem().unwrap().to_str().unwrap();

    let skill_path =
        shogun_core::approval::approve_skill(&layout, repo.path(), decision_id).unwrap();
    assert!(skill_path.ends_with("skills/retry-logic.md"));
    assert!(!decision_path.exists());
    assert!(std::fs::read_to_string(repo.path().join("skills/README.md"))
        .unwrap()
        .contains("retry-logic"));
}

/// Holding the collect lock blocks a concurrent collect attempt and leaves
/// the queue untouched, exercising the single-writer guarantee across
/// process boundaries rather than in-process only.
#[test]
fn concurrent_collect_attempts_do_not_corrupt_queue() {
    let repo = init_repo();
    let layout = Layout::materialize(repo.path()).unwrap();
    checkin::produce(&layout, base_input("worker1", "20260129T120000Z", 1)).unwrap();
    checkin::produce(&layout, base_input("worker1", "20260129T120500Z", 1)).unwrap();

    let lock_path = layout.collect_lock_path();
    shogun_core::atomic::create_exclusive(&lock_path, b"pid=999").unwrap();
    let blocked = collector::collect(&layout);
    assert!(blocked.is_err(), "collect should refuse to run while locked");
    std::fs::remove_file(&lock_path).unwrap();

    let report = collector::collect(&layout).unwrap();
    assert_eq!(report.processed, 2);
}
