//! GitHub-Sync Adapter logic (Component G): derive the "Next action" line,
//! reconcile `ops-phase:*`/`ops-blocked` labels, and post a status comment
//! (§4.G).

use sha2::{Digest, Sha256};

use crate::checkin::Phase;
use crate::error::OpsError;
use crate::gh::{self, GhClient};
use crate::state::IssueState;

/// The fixed "Next action" text for each phase (§4.G, "Comment body
/// includes status, progress, and a next-action line derived from phase").
#[must_use]
pub fn next_action(phase: Phase) -> &'static str {
    match phase {
        Phase::Backlog => "Waiting to be picked up for estimation.",
        Phase::Estimating => "Awaiting a size/impl-mode estimate from the assigned worker.",
        Phase::Implementing => "Implementation in progress.",
        Phase::Reviewing => "Awaiting PR review and merge.",
        Phase::Blocked => "Blocked — see the open decision for what is needed.",
        Phase::Done => "Complete. No further action.",
    }
}

/// The comment body this adapter posts for one issue's current state
/// (§4.G: "computes: phase, progress, assigned worker, blocked reasons,
/// last check-in, and a 'Next action'").
#[must_use]
pub fn render_comment_body(state: &IssueState, blocked: bool, blocked_reason: Option<&str>) -> String {
    let assigned = state.assigned_to.as_deref().unwrap_or("(unassigned)");
    let last_checkin = state
        .last_checkin
        .as_ref()
        .map_or_else(|| "(none)".to_owned(), |lc| format!("{} ({})", lc.summary, lc.at));
    let blocked_line = if blocked {
        format!("**Blocked**: {}\n", blocked_reason.unwrap_or("(no reason given)"))
    } else {
        String::new()
    };

    format!(
        "**Status**: {}\n**Progress**: {}%\n**Assigned**: {}\n{}**Last check-in**: {}\n**Next action**: {}\n",
        state.phase,
        state.progress_percent,
        assigned,
        blocked_line,
        last_checkin,
        next_action(state.phase)
    )
}

/// What one `sync` run did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncReport {
    /// `true` unless this was a `--dry-run`.
    pub comment_posted: bool,
    /// `true` unless this was a `--dry-run`.
    pub labels_reconciled: bool,
    /// The `ops-blocked` toggle applied, unless this was a `--dry-run`.
    pub blocked_toggled: Option<bool>,
    /// SHA-256 hex digest of the comment body that would have been posted,
    /// populated only in `--dry-run` mode (§4.G: "computes and prints a
    /// SHA-256 of the intended comment body without calling `gh`").
    pub dry_run_body_sha256: Option<String>,
}

/// Sync one issue's labels and status comment to match `state`.
///
/// A `gh auth status` preflight runs first and must succeed before any
/// write is attempted — including in `--dry-run` mode, so a misconfigured
/// `gh` is caught the same way in both modes (§4.G).
///
/// # Errors
/// Returns [`OpsError::GhError`] if the auth preflight or any `gh` call
/// fails.
pub fn sync_issue(
    gh: &dyn GhClient,
    repo: &str,
    issue: u64,
    state: &IssueState,
    blocked: bool,
    blocked_reason: Option<&str>,
    dry_run: bool,
) -> Result<SyncReport, OpsError> {
    gh.auth_status()?;

    let body = render_comment_body(state, blocked, blocked_reason);

    if dry_run {
        let digest = format!("{:x}", Sha256::digest(body.as_bytes()));
        return Ok(SyncReport {
            comment_posted: false,
            labels_reconciled: false,
            blocked_toggled: None,
            dry_run_body_sha256: Some(digest),
        });
    }

    ensure_standard_labels(gh, repo)?;

    let remove = phase_label_names();
    let add = format!("ops-phase:{}", state.phase);
    gh.reconcile_phase_label(repo, issue, &remove, &add)?;
    gh.set_blocked_label(repo, issue, blocked)?;
    gh.post_comment(repo, issue, &body)?;

    Ok(SyncReport {
        comment_posted: true,
        labels_reconciled: true,
        blocked_toggled: Some(blocked),
        dry_run_body_sha256: None,
    })
}

/// Ensure the standard `ops-phase:*`/`ops-blocked` labels exist in `repo`,
/// creating any missing ones with deterministic colors (§4.G).
///
/// # Errors
/// Returns [`OpsError::GhError`] if a label cannot be created.
pub fn ensure_standard_labels(gh: &dyn GhClient, repo: &str) -> Result<(), OpsError> {
    for spec in gh::standard_labels() {
        gh.ensure_label(repo, &spec)?;
    }
    Ok(())
}

fn phase_label_names() -> Vec<String> {
    gh::standard_labels()
        .into_iter()
        .map(|spec| spec.name)
        .filter(|name| name.starts_with("ops-phase:"))
        .collect()
}
