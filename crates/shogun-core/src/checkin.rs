//! Check-in entity and the Check-in Producer (Component B).
//!
//! A check-in is a single worker report, appended once to
//! `queue/checkins/<worker>/<timestamp>.yaml` and never overwritten.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::OpsError;
use crate::ids::{RepoRelativePath, Timestamp, WorkerId};
use crate::layout::Layout;

/// `backlog | estimating | implementing | reviewing | blocked | done` (§3.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Not yet estimated or started.
    Backlog,
    /// Under estimation.
    Estimating,
    /// Actively being implemented.
    Implementing,
    /// Implementation complete, under review.
    Reviewing,
    /// Blocked on an external decision.
    Blocked,
    /// Finished.
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Backlog => "backlog",
            Self::Estimating => "estimating",
            Self::Implementing => "implementing",
            Self::Reviewing => "reviewing",
            Self::Blocked => "blocked",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// `pass | fail | skip | "not run"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestsResult {
    /// All configured tests passed.
    Pass,
    /// At least one configured test failed.
    Fail,
    /// Tests were deliberately skipped.
    Skip,
    /// No test command has been run yet.
    #[serde(rename = "not run")]
    NotRun,
}

/// `repo.worktree_root` / `repo.toplevel` (§3.2).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RepoInfo {
    /// Absolute path to the worker's worktree root.
    pub worktree_root: PathBuf,
    /// Absolute path to the repository top-level, stamped at producer
    /// time from `git rev-parse --show-toplevel`.
    pub toplevel: PathBuf,
}

/// `changes.*` (§3.2).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Changes {
    /// Ordered, repo-relative paths touched since the last check-in.
    #[serde(default)]
    pub files_changed: Vec<String>,
}

/// `tests.*` (§3.2).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TestsInfo {
    /// The command run, if any (e.g. `"cargo test"`).
    #[serde(default)]
    pub command: Option<String>,
    /// The outcome, if a command was run.
    #[serde(default)]
    pub result: Option<TestsResult>,
}

/// `needs.contract_expansion.*` (§3.2).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ContractExpansionRequest {
    /// Repo-relative paths the worker wants added to its contract.
    #[serde(default)]
    pub requested_files: Vec<String>,
}

/// `needs.*` (§3.2).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Needs {
    /// The worker is requesting human approval before proceeding.
    #[serde(default)]
    pub approval: bool,
    /// The worker wants its file contract expanded.
    #[serde(default)]
    pub contract_expansion: ContractExpansionRequest,
    /// Free-text description of a blocker, if any.
    #[serde(default)]
    pub blocker: String,
}

/// One entry in `candidates.skills` (§3.2).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SkillCandidate {
    /// The candidate skill's proposed name.
    pub name: String,
    /// One-line summary of what the skill would capture.
    pub summary: String,
}

/// `candidates.*` (§3.2).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Candidates {
    /// Proposed new reusable skills.
    #[serde(default)]
    pub skills: Vec<SkillCandidate>,
}

/// A single worker report (§3.2).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CheckIn {
    /// Schema version.
    pub version: u32,
    /// Stable identifier: `<worker>-<issue>-<timestamp>`.
    pub checkin_id: String,
    /// UTC ISO-8601 timestamp derived from the filename stem.
    pub timestamp: String,
    /// The reporting worker.
    pub worker: String,
    /// The GitHub issue number this check-in concerns.
    pub issue: u64,
    /// Current phase.
    pub phase: Phase,
    /// Progress percentage, 0-100. `0` is a legitimate value, never
    /// conflated with "missing" (§3.2 invariant).
    pub progress_percent: u8,
    /// A one-line summary of progress.
    pub summary: String,
    /// Repo location metadata.
    pub repo: RepoInfo,
    /// File changes since the last check-in.
    #[serde(default)]
    pub changes: Changes,
    /// Test command/result.
    #[serde(default)]
    pub tests: TestsInfo,
    /// Outstanding needs that may generate decisions.
    #[serde(default)]
    pub needs: Needs,
    /// Proposed new reusable skills.
    #[serde(default)]
    pub candidates: Candidates,
    /// Suggested next actions.
    #[serde(default)]
    pub next: Vec<String>,
}

/// Errors specific to validating or producing a check-in, convertible into
/// [`OpsError`] at the call site with the file path attached.
#[derive(Debug, Error)]
pub enum CheckInValidationError {
    /// `progress_percent` was outside `0..=100`.
    #[error("progress_percent {0} is outside 0..=100")]
    ProgressOutOfRange(u8),
    /// `summary` contained a newline.
    #[error("summary must be a single line")]
    SummaryNotOneLine,
    /// A `changes.files_changed` entry failed path validation.
    #[error(transparent)]
    BadFilePath(crate::ids::ValidationError),
    /// The `worker` field failed validation.
    #[error(transparent)]
    BadWorker(crate::ids::ValidationError),
    /// The `timestamp` field failed validation.
    #[error(transparent)]
    BadTimestamp(crate::ids::ValidationError),
}

impl CheckIn {
    /// Validate every field per §3. Re-validates `worker` and `timestamp`
    /// even though they were already used to compute the destination path —
    /// a check-in may be read back by the Collector long after it was
    /// written by a different, untrusted producer.
    ///
    /// # Errors
    /// Returns the first validation failure encountered.
    pub fn validate(&self) -> Result<(), CheckInValidationError> {
        if self.progress_percent > 100 {
            return Err(CheckInValidationError::ProgressOutOfRange(
                self.progress_percent,
            ));
        }
        if self.summary.contains('\n') {
            return Err(CheckInValidationError::SummaryNotOneLine);
        }
        WorkerId::new(&self.worker).map_err(CheckInValidationError::BadWorker)?;
        Timestamp::new(&self.timestamp).map_err(CheckInValidationError::BadTimestamp)?;
        for f in &self.changes.files_changed {
            RepoRelativePath::new(f).map_err(CheckInValidationError::BadFilePath)?;
        }
        for f in &self.needs.contract_expansion.requested_files {
            RepoRelativePath::new(f).map_err(CheckInValidationError::BadFilePath)?;
        }
        Ok(())
    }
}

/// Input to [`produce`]: the fields a caller (the CLI's `checkin` command)
/// gathers from flags before the check-in record is assembled.
#[derive(Clone, Debug)]
pub struct CheckInInput {
    /// Worker id, already resolved from `--worker` or `AGENTIC_SDD_WORKER`.
    pub worker: String,
    /// Filename timestamp, already resolved from `--timestamp` or the
    /// current time.
    pub timestamp: String,
    /// The issue number.
    pub issue: u64,
    /// The reported phase.
    pub phase: Phase,
    /// Progress percentage, 0-100.
    pub progress_percent: u8,
    /// One-line summary.
    pub summary: String,
    /// Absolute worktree root.
    pub worktree_root: PathBuf,
    /// Absolute repository toplevel.
    pub toplevel: PathBuf,
    /// Files changed (already computed from `git diff` or supplied
    /// explicitly via `--files-changed`).
    pub files_changed: Vec<String>,
    /// Test command, if any.
    pub tests_command: Option<String>,
    /// Test result, if any.
    pub tests_result: Option<TestsResult>,
    /// Whether human approval is requested.
    pub needs_approval: bool,
    /// Requested contract-expansion files.
    pub requested_files: Vec<String>,
    /// Free-text blocker description.
    pub blocker: String,
    /// Proposed skill candidates.
    pub skill_candidates: Vec<SkillCandidate>,
    /// Suggested next actions.
    pub next: Vec<String>,
}

/// Assemble, validate, and atomically append a check-in to the queue.
///
/// Returns the path written. Fails with no side effect if the target
/// filename already exists (append-only, §3.3) or if any field fails
/// validation (§4.B).
///
/// # Errors
/// Returns [`OpsError::InvalidField`] on a validation failure, or an I/O
/// error (surfaced via [`OpsError::Io`]) if the file already exists or the
/// write otherwise fails.
pub fn produce(layout: &Layout, input: CheckInInput) -> Result<PathBuf, OpsError> {
    let checkin = CheckIn {
        version: 1,
        checkin_id: format!("{}-{}-{}", input.worker, input.issue, input.timestamp),
        timestamp: input.timestamp.clone(),
        worker: input.worker.clone(),
        issue: input.issue,
        phase: input.phase,
        progress_percent: input.progress_percent,
        summary: input.summary,
        repo: RepoInfo {
            worktree_root: input.worktree_root,
            toplevel: input.toplevel,
        },
        changes: Changes {
            files_changed: input.files_changed,
        },
        tests: TestsInfo {
            command: input.tests_command,
            result: input.tests_result,
        },
        needs: Needs {
            approval: input.needs_approval,
            contract_expansion: ContractExpansionRequest {
                requested_files: input.requested_files,
            },
            blocker: input.blocker,
        },
        candidates: Candidates {
            skills: input.skill_candidates,
        },
        next: input.next,
    };

    let dest = layout.checkin_queue_dir(&input.worker).join(format!(
        "{}.yaml",
        input.timestamp
    ));

    checkin
        .validate()
        .map_err(|e| OpsError::InvalidField {
            path: dest.clone(),
            field: "checkin",
            value: checkin.checkin_id.clone(),
            reason: e.to_string(),
        })?;

    let yaml = serde_yaml::to_string(&checkin).map_err(|e| OpsError::CorruptFile {
        path: dest.clone(),
        detail: e.to_string(),
    })?;
    crate::atomic::create_exclusive(&dest, yaml.as_bytes())?;
    Ok(dest)
}

/// Read and validate a single check-in file from disk.
///
/// # Errors
/// Returns [`OpsError::CorruptFile`] if the YAML cannot be parsed, or
/// [`OpsError::InvalidField`] if the parsed record fails validation.
pub fn read_validated(path: &Path) -> Result<CheckIn, OpsError> {
    let raw = std::fs::read_to_string(path)?;
    let checkin: CheckIn = serde_yaml::from_str(&raw).map_err(|e| OpsError::CorruptFile {
        path: path.to_owned(),
        detail: e.to_string(),
    })?;
    checkin.validate().map_err(|e| OpsError::InvalidField {
        path: path.to_owned(),
        field: "checkin",
        value: checkin.checkin_id.clone(),
        reason: e.to_string(),
    })?;
    Ok(checkin)
}
