//! The Collector's fold: `state.yaml` (§3.2).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::checkin::Phase;
use crate::config::ImplMode;
use crate::error::OpsError;

/// The most recent check-in summary kept on an [`IssueState`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct LastCheckin {
    /// UTC ISO-8601 timestamp.
    pub at: String,
    /// The check-in's stable id.
    pub id: String,
    /// One-line summary.
    pub summary: String,
}

/// A file-contract scope for an issue, used for overlap and drift
/// detection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Contract {
    /// Glob patterns (single-segment `*`) a worker is allowed to touch.
    #[serde(default)]
    pub allowed_files: Vec<String>,
    /// Glob patterns that are always forbidden, regardless of
    /// `allowed_files`.
    #[serde(default)]
    pub forbidden_files: Vec<String>,
}

/// Per-issue folded state.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct IssueState {
    /// The issue's title, as last observed.
    pub title: String,
    /// Current phase.
    pub phase: Phase,
    /// Progress percentage, `0` is a legitimate, preserved value.
    pub progress_percent: u8,
    /// The worker currently assigned, if any.
    #[serde(default)]
    pub assigned_to: Option<String>,
    /// Implementation mode for this issue's order.
    #[serde(default)]
    pub impl_mode: ImplMode,
    /// The most recent check-in, if any has been folded yet.
    #[serde(default)]
    pub last_checkin: Option<LastCheckin>,
    /// The issue's file contract, if one has been assigned.
    #[serde(default)]
    pub contract: Option<Contract>,
}

/// An entry in `state.blocked`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct BlockedEntry {
    /// The blocked issue.
    pub issue: u64,
    /// Why it is blocked.
    pub reason: String,
}

/// A bounded, newest-first record of a recently processed check-in,
/// kept on [`State`] for the dashboard's "Recent Check-ins" section.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RecentCheckin {
    /// The issue the check-in concerned.
    pub issue: u64,
    /// The reporting worker.
    pub worker: String,
    /// UTC ISO-8601 timestamp.
    pub at: String,
    /// One-line summary.
    pub summary: String,
}

/// Maximum number of entries retained in `state.recent_checkins` (§3.2,
/// "N≈20").
pub const RECENT_CHECKINS_CAP: usize = 20;

/// The Collector's fold over all processed check-ins and open decisions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct State {
    /// Per-issue folded state, keyed by issue number (serialized as a
    /// string map since YAML mapping keys round-trip as strings).
    #[serde(default)]
    pub issues: BTreeMap<String, IssueState>,
    /// UTC ISO-8601 timestamp of this fold.
    #[serde(default)]
    pub updated_at: String,
    /// The most recent `RECENT_CHECKINS_CAP` check-ins, newest-first.
    #[serde(default)]
    pub recent_checkins: Vec<RecentCheckin>,
    /// Items derived from outstanding decisions, refreshed on every
    /// collect regardless of whether new check-ins were processed.
    #[serde(default)]
    pub action_required: Vec<String>,
    /// Issues currently blocked, with reasons.
    #[serde(default)]
    pub blocked: Vec<BlockedEntry>,
}

impl State {
    /// Push a new recent check-in at the front, trimming to
    /// [`RECENT_CHECKINS_CAP`].
    pub fn push_recent_checkin(&mut self, entry: RecentCheckin) {
        self.recent_checkins.insert(0, entry);
        self.recent_checkins.truncate(RECENT_CHECKINS_CAP);
    }

    /// A worker is idle if no issue has `assigned_to=<worker>` in a phase
    /// that counts as active work (§4.D step 1).
    #[must_use]
    pub fn is_worker_idle(&self, worker: &str) -> bool {
        !self.issues.values().any(|issue| {
            issue.assigned_to.as_deref() == Some(worker)
                && matches!(
                    issue.phase,
                    Phase::Estimating | Phase::Implementing | Phase::Reviewing
                )
        })
    }

    /// Load `state.yaml`. A missing file yields an empty default state —
    /// this is the state before the first collect has ever run.
    ///
    /// # Errors
    /// Returns [`OpsError::CorruptFile`] if the file exists but is not
    /// valid YAML for this schema.
    pub fn load(path: &Path) -> Result<Self, OpsError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(r) => r,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(OpsError::Io(e)),
        };
        serde_yaml::from_str(&raw).map_err(|e| OpsError::CorruptFile {
            path: path.to_owned(),
            detail: e.to_string(),
        })
    }

    /// Write `state.yaml` atomically.
    ///
    /// # Errors
    /// Returns [`OpsError::Io`] if the write fails.
    pub fn write_atomic(&self, path: &Path) -> Result<(), OpsError> {
        let yaml = serde_yaml::to_string(self).map_err(|e| OpsError::CorruptFile {
            path: path.to_owned(),
            detail: e.to_string(),
        })?;
        crate::atomic::write_atomic(path, yaml.as_bytes())?;
        Ok(())
    }
}
