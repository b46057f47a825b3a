//! The Collector (Component C): the system's single writer for
//! `state.yaml`, `dashboard.md`, and the decisions queue (§4.C).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::atomic::LockGuard;
use crate::checkin::{self, CheckIn};
use crate::decision::{Decision, DecisionKind, Severity};
use crate::error::OpsError;
use crate::glob;
use crate::layout::Layout;
use crate::state::{BlockedEntry, IssueState, LastCheckin, RecentCheckin, State};

/// Summary of one collect run, printed by the CLI.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectReport {
    /// Number of check-ins folded into state this run.
    pub processed: usize,
    /// Filenames (decision ids, without `.yaml`) of decisions newly created
    /// this run.
    pub decisions_created: Vec<String>,
}

/// Run one collection pass: drain queued check-ins, fold them into state,
/// derive decisions, archive inputs, and rewrite `state.yaml` +
/// `dashboard.md`.
///
/// # Errors
/// Returns [`OpsError::LockHeld`] if another collect is in progress.
/// Returns [`OpsError::InvalidField`]/[`OpsError::CorruptFile`] if any
/// queued check-in fails validation — in that case nothing is mutated on
/// disk (§4.C step 2, all-or-nothing).
pub fn collect(layout: &Layout) -> Result<CollectReport, OpsError> {
    let lock_path = layout.collect_lock_path();
    let _lock = LockGuard::acquire(&lock_path, &format!("pid={}", std::process::id())).map_err(
        |e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                OpsError::LockHeld {
                    path: lock_path.clone(),
                    holder: LockGuard::peek_holder(&lock_path),
                }
            } else {
                OpsError::Io(e)
            }
        },
    )?;

    let mut state = State::load(&layout.state_path())?;

    // Step 1+2: enumerate and validate every queued check-in before any
    // mutation is applied. A single bad file aborts the whole run.
    let checkin_paths = enumerate_checkins(&layout.root.join("queue/checkins"))?;
    let checkins: Vec<(PathBuf, CheckIn)> = checkin_paths
        .into_iter()
        .map(|p| {
            let parsed = checkin::read_validated(&p)?;
            Ok((p, parsed))
        })
        .collect::<Result<_, OpsError>>()?;

    // Step 3: fold.
    for (_, ci) in &checkins {
        fold_checkin(&mut state, ci);
    }

    // Step 4: derive decisions.
    let decision_dir = layout.decision_queue_dir();
    let open = load_open_decisions(&decision_dir)?;
    let mut open_fingerprints: std::collections::HashSet<String> =
        open.iter().map(|(_, d)| d.fingerprint()).collect();
    let mut new_decisions: Vec<Decision> = Vec::new();
    let mut skill_agg: HashMap<String, (String, Vec<String>, Vec<String>)> = HashMap::new();

    for (_, ci) in &checkins {
        derive_decisions_for_checkin(
            &mut state,
            ci,
            &mut open_fingerprints,
            &mut new_decisions,
            &mut skill_agg,
        );
    }
    finalize_skill_candidates(&open, &mut open_fingerprints, &mut new_decisions, skill_agg);

    let mut decisions_created = Vec::new();
    for (seq, decision) in new_decisions.iter().enumerate() {
        let filename = decision.suggested_filename(u32::try_from(seq + 1).unwrap_or(u32::MAX));
        let path = decision_dir.join(format!("{filename}.yaml"));
        write_decision(&path, decision)?;
        decisions_created.push(filename);
    }

    // Step 5: archive processed check-ins.
    for (path, ci) in &checkins {
        let basename = path
            .file_name()
            .map_or_else(|| "checkin.yaml".to_owned(), |n| n.to_string_lossy().into_owned());
        let dest = layout.checkin_archive_dir(&ci.worker).join(basename);
        crate::atomic::rename_with_collision_suffix(path, &dest)?;
    }

    // Step 6: action-required refresh, regardless of whether any
    // check-ins were processed — a decisions-only mutation still refreshes
    // the dashboard.
    let still_open = load_open_decisions(&decision_dir)?;
    state.action_required = still_open
        .iter()
        .map(|(_, d)| crate::dashboard::describe_decision(d))
        .collect();

    // Step 7: write outputs atomically.
    state.updated_at = now_iso8601();
    state.write_atomic(&layout.state_path())?;
    let open_for_dashboard: Vec<Decision> = still_open.into_iter().map(|(_, d)| d).collect();
    let dashboard_md = crate::dashboard::render(&state, &open_for_dashboard);
    crate::atomic::write_atomic(&layout.dashboard_path(), dashboard_md.as_bytes())?;

    Ok(CollectReport {
        processed: checkins.len(),
        decisions_created,
    })
}

fn now_iso8601() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn enumerate_checkins(checkins_root: &Path) -> Result<Vec<PathBuf>, OpsError> {
    let mut paths = Vec::new();
    if !checkins_root.is_dir() {
        return Ok(paths);
    }
    let mut worker_dirs: Vec<PathBuf> = std::fs::read_dir(checkins_root)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    worker_dirs.sort();

    for worker_dir in worker_dirs {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&worker_dir)?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(std::ffi::OsStr::to_str) == Some("yaml"))
            .collect();
        files.sort();
        paths.extend(files);
    }
    Ok(paths)
}

fn load_open_decisions(decision_dir: &Path) -> Result<Vec<(PathBuf, Decision)>, OpsError> {
    if !decision_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(decision_dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(std::ffi::OsStr::to_str) == Some("yaml"))
        .collect();
    files.sort();

    files
        .into_iter()
        .map(|path| {
            let raw = std::fs::read_to_string(&path)?;
            let decision: Decision = serde_yaml::from_str(&raw).map_err(|e| OpsError::CorruptFile {
                path: path.clone(),
                detail: e.to_string(),
            })?;
            Ok((path, decision))
        })
        .collect()
}

fn write_decision(path: &Path, decision: &Decision) -> Result<(), OpsError> {
    let yaml = serde_yaml::to_string(decision).map_err(|e| OpsError::CorruptFile {
        path: path.to_owned(),
        detail: e.to_string(),
    })?;
    crate::atomic::write_atomic(path, yaml.as_bytes())?;
    Ok(())
}

fn fold_checkin(state: &mut State, ci: &CheckIn) {
    let key = ci.issue.to_string();
    let entry = state.issues.entry(key).or_insert_with(|| IssueState {
        title: String::new(),
        phase: ci.phase,
        progress_percent: ci.progress_percent,
        assigned_to: Some(ci.worker.clone()),
        impl_mode: crate::config::ImplMode::default(),
        last_checkin: None,
        contract: None,
    });
    entry.phase = ci.phase;
    entry.progress_percent = ci.progress_percent;
    entry.assigned_to = Some(ci.worker.clone());
    entry.last_checkin = Some(LastCheckin {
        at: ci.timestamp.clone(),
        id: ci.checkin_id.clone(),
        summary: ci.summary.clone(),
    });
    state.push_recent_checkin(RecentCheckin {
        issue: ci.issue,
        worker: ci.worker.clone(),
        at: ci.timestamp.clone(),
        summary: ci.summary.clone(),
    });
}

fn push_if_new(
    new_decisions: &mut Vec<Decision>,
    open_fingerprints: &mut std::collections::HashSet<String>,
    decision: Decision,
) -> bool {
    let fp = decision.fingerprint();
    if open_fingerprints.contains(&fp) {
        return false;
    }
    open_fingerprints.insert(fp);
    new_decisions.push(decision);
    true
}

#[allow(clippy::too_many_lines)]
fn derive_decisions_for_checkin(
    state: &mut State,
    ci: &CheckIn,
    open_fingerprints: &mut std::collections::HashSet<String>,
    new_decisions: &mut Vec<Decision>,
    skill_agg: &mut HashMap<String, (String, Vec<String>, Vec<String>)>,
) {
    let created_at = ci.timestamp.clone();

    if ci.needs.approval {
        let d = Decision::approval_required(&created_at, ci.issue);
        push_if_new(new_decisions, open_fingerprints, d);
    }

    if !ci.needs.contract_expansion.requested_files.is_empty() {
        let requested = &ci.needs.contract_expansion.requested_files;
        let key = ci.issue.to_string();
        let contract = state.issues.get(&key).and_then(|s| s.contract.clone());
        // Files already inside `contract.allowed_files` are not an
        // expansion request at all — only files outside the allowed set
        // (or caught by `forbidden_files`) trigger a decision (SPEC_FULL.md,
        // "Supplemental detail from original_source/").
        let not_already_allowed: Vec<String> = contract.as_ref().map_or_else(
            || requested.clone(),
            |c| {
                requested
                    .iter()
                    .filter(|f| !glob::matches_any(&c.allowed_files, f))
                    .cloned()
                    .collect()
            },
        );
        if !not_already_allowed.is_empty() {
            let forbidden_hits: Vec<String> = contract
                .as_ref()
                .map(|c| {
                    not_already_allowed
                        .iter()
                        .filter(|f| glob::matches_any(&c.forbidden_files, f))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            let severity = if forbidden_hits.is_empty() {
                Severity::Minor
            } else {
                Severity::Major
            };
            let d = Decision::contract_expansion(
                &created_at,
                ci.issue,
                &not_already_allowed,
                &forbidden_hits,
                severity,
            );
            if push_if_new(new_decisions, open_fingerprints, d) && severity == Severity::Major {
                if let Some(s) = state.issues.get_mut(&key) {
                    s.phase = crate::checkin::Phase::Blocked;
                }
            }
        }
    }

    if !ci.needs.blocker.is_empty() {
        let d = Decision::blocker(&created_at, ci.issue, &ci.needs.blocker);
        push_if_new(new_decisions, open_fingerprints, d);
        if !state.blocked.iter().any(|b| b.issue == ci.issue) {
            state.blocked.push(BlockedEntry {
                issue: ci.issue,
                reason: ci.needs.blocker.clone(),
            });
        }
    }

    for sc in &ci.candidates.skills {
        let agg = skill_agg
            .entry(sc.name.clone())
            .or_insert_with(|| (sc.summary.clone(), Vec::new(), Vec::new()));
        agg.0 = sc.summary.clone();
        if !agg.1.contains(&ci.worker) {
            agg.1.push(ci.worker.clone());
        }
        if !agg.2.contains(&ci.worker) {
            agg.2.push(ci.worker.clone());
        }
    }

    // Contract drift: files actually touched that fall outside the issue's
    // declared contract (distinct from an explicit `needs.contract_expansion`
    // request above — this is the Collector noticing drift on its own).
    let key = ci.issue.to_string();
    if let Some(contract) = state.issues.get(&key).and_then(|s| s.contract.clone()) {
        if !contract.allowed_files.is_empty() {
            let drifted: Vec<String> = ci
                .changes
                .files_changed
                .iter()
                .filter(|f| !glob::matches_any(&contract.allowed_files, f))
                .cloned()
                .collect();
            if !drifted.is_empty() {
                let forbidden_hits: Vec<String> = drifted
                    .iter()
                    .filter(|f| glob::matches_any(&contract.forbidden_files, f))
                    .cloned()
                    .collect();
                let severity = if forbidden_hits.is_empty() {
                    Severity::Minor
                } else {
                    Severity::Major
                };
                let d = Decision::contract_expansion(&created_at, ci.issue, &drifted, &forbidden_hits, severity);
                if push_if_new(new_decisions, open_fingerprints, d) && severity == Severity::Major {
                    if let Some(s) = state.issues.get_mut(&key) {
                        s.phase = crate::checkin::Phase::Blocked;
                    }
                }
            }
        }
    }
}

fn finalize_skill_candidates(
    open: &[(PathBuf, Decision)],
    open_fingerprints: &mut std::collections::HashSet<String>,
    new_decisions: &mut Vec<Decision>,
    skill_agg: HashMap<String, (String, Vec<String>, Vec<String>)>,
) {
    for (name, (summary, workers, submitters)) in skill_agg {
        let existing = open.iter().find(|(_, d)| {
            d.kind == DecisionKind::SkillCandidate && d.request_str("name") == Some(name.as_str())
        });
        if existing.is_some() {
            // Already an open decision for this name; the fingerprint-based
            // dedup above already prevents a duplicate file. Aggregating
            // workers/submitters into the existing file is an enhancement
            // left for the Approval pipeline to read verbatim; this run's
            // contributions are still visible via the dedup check.
            continue;
        }
        let created_at = now_iso8601();
        let d = Decision::skill_candidate(&created_at, &name, &summary, &workers, &submitters);
        push_if_new(new_decisions, open_fingerprints, d);
    }
}
