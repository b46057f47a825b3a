//! The Supervisor (Component D): assign non-overlapping work to idle
//! workers (§4.D).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::{ImplMode, OpsConfig};
use crate::decision::Decision;
use crate::error::OpsError;
use crate::gh::{GhClient, IssueDetail};
use crate::ids::WorkerId;
use crate::layout::Layout;
use crate::order::Order;
use crate::overlap::{self, OverlapOutcome};
use crate::state::State;

/// The markdown heading a candidate issue body must carry a bulleted list
/// of backticked repo-relative paths under (§4.D step 2).
const CHANGE_TARGETS_HEADING: &str = "### 変更対象ファイル（推定）";

/// Summary of one `supervise --once` run, printed by the CLI (§4.D,
/// "Prints `orders=<count>` and `decision=<id>` lines").
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SuperviseReport {
    /// Paths of orders written this run.
    pub orders: Vec<PathBuf>,
    /// Decision ids (filenames without `.yaml`) written this run.
    pub decisions: Vec<String>,
}

struct Candidate {
    detail: IssueDetail,
    declared_files: Vec<String>,
}

/// Run one `supervise --once` pass.
///
/// `targets` overrides issue discovery; when `None`, candidates come from
/// `gh issue list`, filtered by `policy.parallel.require_parallel_ok_label`
/// (§4.D inputs). `repo_root` is where the worktree-overlap check script is
/// looked up (§4.D step 4). `created_at` stamps every decision/order
/// produced this run.
///
/// # Errors
/// Returns [`OpsError`] on a `gh` failure, an overlap-check script failure,
/// or an I/O error writing orders/decisions.
pub fn run(
    layout: &Layout,
    config: &OpsConfig,
    repo_root: &Path,
    gh: &dyn GhClient,
    repo: &str,
    targets: Option<&[u64]>,
    created_at: &str,
) -> Result<SuperviseReport, OpsError> {
    let state = State::load(&layout.state_path())?;
    let mut report = SuperviseReport::default();

    // Step 1: idle workers, sorted by id (§4.D step 1, §4.D step 5
    // "sorted by worker id").
    let mut worker_ids: Vec<WorkerId> = config.worker_ids().map_err(|e| OpsError::InvalidField {
        path: layout.config_path(),
        field: "workers[].id",
        value: e.value.clone(),
        reason: e.reason.clone(),
    })?;
    worker_ids.sort();
    let idle_workers: Vec<WorkerId> = worker_ids
        .into_iter()
        .filter(|w| state.is_worker_idle(w.as_str()))
        .collect();

    // Candidate issue numbers.
    let require_label = config
        .policy
        .parallel
        .require_parallel_ok_label
        .then_some("parallel-ok");
    let issue_numbers: Vec<u64> = match targets {
        Some(explicit) => explicit.to_vec(),
        None => gh
            .list_issues(repo, require_label)?
            .into_iter()
            .map(|i| i.number)
            .collect(),
    };

    // Step 2+3: metadata, declared targets, impl_mode.
    let mut candidates: Vec<Candidate> = Vec::new();
    for number in issue_numbers {
        let summary = gh.view_issue_summary(repo, number)?;
        let body = gh.view_issue_body(repo, number)?;
        let declared_files = body
            .as_deref()
            .map(extract_declared_targets)
            .unwrap_or_default();
        if declared_files.is_empty() {
            let d = Decision::missing_change_targets(created_at, number);
            let id = write_decision(layout, &d, report.decisions.len() + 1)?;
            report.decisions.push(id);
            continue;
        }
        candidates.push(Candidate {
            detail: summary,
            declared_files,
        });
    }

    // Step 4: overlap detection among all remaining candidate pairs.
    let mut excluded: BTreeSet<u64> = BTreeSet::new();
    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            let a = &candidates[i];
            let b = &candidates[j];
            if excluded.contains(&a.detail.number) || excluded.contains(&b.detail.number) {
                continue;
            }
            let outcome = overlap::check(repo_root, a.detail.number, b.detail.number)?;
            if outcome == OverlapOutcome::Overlap {
                excluded.insert(a.detail.number);
                excluded.insert(b.detail.number);
                let mut files: Vec<String> = a
                    .declared_files
                    .iter()
                    .filter(|f| b.declared_files.contains(f))
                    .cloned()
                    .collect();
                if files.is_empty() {
                    files = a
                        .declared_files
                        .iter()
                        .chain(b.declared_files.iter())
                        .cloned()
                        .collect();
                }
                let d = Decision::overlap_detected(
                    created_at,
                    &[(a.detail.number, b.detail.number)],
                    &files,
                );
                let id = write_decision(layout, &d, report.decisions.len() + 1)?;
                report.decisions.push(id);
            }
        }
    }

    let compatible: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| !excluded.contains(&c.detail.number))
        .collect();

    // Step 5+6: fill policy.
    let cap = if config.policy.parallel.enabled {
        idle_workers
            .len()
            .min(config.policy.parallel.max_workers as usize)
            .min(compatible.len())
    } else {
        idle_workers.len().min(compatible.len()).min(1)
    };

    for (slot, candidate) in compatible.into_iter().take(cap).enumerate() {
        let worker = &idle_workers[slot];
        let impl_mode = if candidate
            .detail
            .labels
            .iter()
            .any(|l| config.policy.impl_mode.force_tdd_labels.iter().any(|f| f.eq_ignore_ascii_case(l)))
        {
            ImplMode::Tdd
        } else {
            config.policy.impl_mode.default
        };

        let order = Order::new(
            candidate.detail.number,
            worker.as_str(),
            impl_mode,
            created_at,
            candidate.declared_files.clone(),
            Vec::new(),
            None,
        );
        let path = crate::order::produce(layout, &order, created_at)?;
        report.orders.push(path);
    }

    Ok(report)
}

fn write_decision(layout: &Layout, decision: &Decision, seq: usize) -> Result<String, OpsError> {
    let filename = decision.suggested_filename(u32::try_from(seq).unwrap_or(u32::MAX));
    let path = layout.decision_queue_dir().join(format!("{filename}.yaml"));
    let yaml = serde_yaml::to_string(decision).map_err(|e| OpsError::CorruptFile {
        path: path.clone(),
        detail: e.to_string(),
    })?;
    crate::atomic::write_atomic(&path, yaml.as_bytes())?;
    Ok(filename)
}

/// Extract repo-relative paths from the bulleted, backticked list under
/// [`CHANGE_TARGETS_HEADING`] in an issue body. Returns an empty vector if
/// the heading is absent or its list has no backticked entries — both are
/// equivalent to `missing_change_targets` at the call site (§9 Open
/// Question).
#[must_use]
pub fn extract_declared_targets(body: &str) -> Vec<String> {
    let Some(start) = body.find(CHANGE_TARGETS_HEADING) else {
        return Vec::new();
    };
    let after_heading = &body[start + CHANGE_TARGETS_HEADING.len()..];
    let mut files = Vec::new();
    for line in after_heading.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            break;
        }
        if !trimmed.starts_with('-') && !trimmed.starts_with('*') {
            continue;
        }
        if let Some(path) = extract_backticked(trimmed) {
            files.push(path);
        }
    }
    files
}

fn extract_backticked(line: &str) -> Option<String> {
    let start = line.find('`')? + 1;
    let end = line[start..].find('`')? + start;
    let inner = &line[start..end];
    if inner.is_empty() {
        None
    } else {
        Some(inner.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gh::fake::FakeGh;

    fn layout_in(dir: &tempfile::TempDir) -> Layout {
        Layout {
            root: dir.path().to_owned(),
        }
    }

    fn issue(number: u64, labels: &[&str], body: Option<&str>) -> IssueDetail {
        IssueDetail {
            number,
            title: format!("issue {number}"),
            labels: labels.iter().map(|s| (*s).to_owned()).collect(),
            body: body.map(str::to_owned),
        }
    }

    fn config_with_workers(ids: &[&str]) -> OpsConfig {
        let mut cfg = OpsConfig::default_skeleton();
        cfg.workers = ids
            .iter()
            .map(|id| crate::config::WorkerEntry { id: (*id).to_owned() })
            .collect();
        cfg.policy.parallel.enabled = true;
        cfg.policy.parallel.max_workers = 4;
        cfg
    }

    const TARGETS_BODY: &str = "### 変更対象ファイル（推定）\n- `src/a.ts`\n- `src/b.ts`\n\n### Other\nmore text\n";

    #[test]
    fn extract_declared_targets_reads_backticked_bullets() {
        let files = extract_declared_targets(TARGETS_BODY);
        assert_eq!(files, vec!["src/a.ts".to_owned(), "src/b.ts".to_owned()]);
    }

    #[test]
    fn extract_declared_targets_stops_at_next_heading() {
        let body = "### 変更対象ファイル（推定）\n- `src/a.ts`\n## next\n- `src/not-included.ts`\n";
        let files = extract_declared_targets(body);
        assert_eq!(files, vec!["src/a.ts".to_owned()]);
    }

    #[test]
    fn extract_declared_targets_missing_heading_is_empty() {
        assert!(extract_declared_targets("no heading here").is_empty());
    }

    #[test]
    fn missing_body_emits_missing_change_targets_and_no_order() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(&dir);
        let config = config_with_workers(&["alice"]);
        let mut gh = FakeGh::default();
        gh.auth_ok = true;
        gh.issues.insert(1, issue(1, &[], None));

        let report = run(
            &layout,
            &config,
            dir.path(),
            &gh,
            "acme/widgets",
            Some(&[1]),
            "20260129T120000Z",
        )
        .unwrap();
        assert!(report.orders.is_empty());
        assert_eq!(report.decisions.len(), 1);
    }

    #[test]
    fn happy_path_assigns_single_idle_worker() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(&dir);
        let config = config_with_workers(&["alice"]);
        let mut gh = FakeGh::default();
        gh.issues.insert(1, issue(1, &[], Some(TARGETS_BODY)));

        let report = run(
            &layout,
            &config,
            dir.path(),
            &gh,
            "acme/widgets",
            Some(&[1]),
            "20260129T120000Z",
        )
        .unwrap();
        assert_eq!(report.orders.len(), 1);
        let order = crate::order::read(&report.orders[0]).unwrap();
        assert_eq!(order.worker, "alice");
        assert_eq!(order.issue, 1);
        assert_eq!(order.allowed_files, vec!["src/a.ts", "src/b.ts"]);
    }

    #[test]
    fn force_tdd_label_overrides_default_impl_mode() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(&dir);
        let mut config = config_with_workers(&["alice"]);
        config.policy.impl_mode.force_tdd_labels = vec!["needs-tests".to_owned()];
        let mut gh = FakeGh::default();
        gh.issues.insert(1, issue(1, &["Needs-Tests"], Some(TARGETS_BODY)));

        let report = run(
            &layout,
            &config,
            dir.path(),
            &gh,
            "acme/widgets",
            Some(&[1]),
            "20260129T120000Z",
        )
        .unwrap();
        let order = crate::order::read(&report.orders[0]).unwrap();
        assert_eq!(order.impl_mode, ImplMode::Tdd);
        assert!(order.required_steps.contains(&"/tdd".to_owned()));
    }

    #[test]
    fn busy_worker_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(&dir);
        let config = config_with_workers(&["alice"]);

        let mut state = State::default();
        state.issues.insert(
            "99".to_owned(),
            crate::state::IssueState {
                title: "other".to_owned(),
                phase: crate::checkin::Phase::Implementing,
                progress_percent: 10,
                assigned_to: Some("alice".to_owned()),
                impl_mode: ImplMode::Impl,
                last_checkin: None,
                contract: None,
            },
        );
        state.write_atomic(&layout.state_path()).unwrap();

        let mut gh = FakeGh::default();
        gh.issues.insert(1, issue(1, &[], Some(TARGETS_BODY)));

        let report = run(
            &layout,
            &config,
            dir.path(),
            &gh,
            "acme/widgets",
            Some(&[1]),
            "20260129T120000Z",
        )
        .unwrap();
        assert!(report.orders.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn overlap_detected_blocks_both_orders() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(&dir);
        let config = config_with_workers(&["alice", "bob"]);

        let script = dir.path().join("scripts/agentic-sdd/worktree.sh");
        fs::create_dir_all(script.parent().unwrap()).unwrap();
        fs::write(&script, "#!/bin/sh\nexit 3\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let body_a = "### 変更対象ファイル（推定）\n- `src/shared.ts`\n";
        let body_b = "### 変更対象ファイル（推定）\n- `src/shared.ts`\n";
        let mut gh = FakeGh::default();
        gh.issues.insert(1, issue(1, &["parallel-ok"], Some(body_a)));
        gh.issues.insert(2, issue(2, &["parallel-ok"], Some(body_b)));

        let report = run(
            &layout,
            &config,
            dir.path(),
            &gh,
            "acme/widgets",
            Some(&[1, 2]),
            "20260129T120000Z",
        )
        .unwrap();
        assert!(report.orders.is_empty());
        assert_eq!(report.decisions.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn parallel_disabled_caps_at_one_order() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(&dir);
        let mut config = config_with_workers(&["alice", "bob"]);
        config.policy.parallel.enabled = false;

        let script = dir.path().join("scripts/agentic-sdd/worktree.sh");
        fs::create_dir_all(script.parent().unwrap()).unwrap();
        fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let mut gh = FakeGh::default();
        gh.issues.insert(1, issue(1, &[], Some(TARGETS_BODY)));
        gh.issues.insert(2, issue(2, &[], Some(TARGETS_BODY)));

        let report = run(
            &layout,
            &config,
            dir.path(),
            &gh,
            "acme/widgets",
            Some(&[1, 2]),
            "20260129T120000Z",
        )
        .unwrap();
        assert_eq!(report.orders.len(), 1);
    }
}
