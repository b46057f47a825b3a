//! The Watcher (Component F): detect a filesystem-event tool, then retry
//! `collect` on a fixed backoff schedule until the check-in queue is empty
//! (§4.F).

use crate::error::OpsError;
use crate::layout::Layout;

/// Filesystem-event tools tried in order, the first one found on `PATH` is
/// used (§4.F step 1).
const TOOL_CANDIDATES: [&str; 3] = ["fswatch", "watchexec", "inotifywait"];

/// The fixed retry/backoff schedule, in seconds, after a triggering event:
/// `[0.2, 0.5, 1, 2, 3, 5, 5, 5, 5, 5]`, stopping early once the check-in
/// queue is empty (§4.F step 3).
pub const BACKOFF_SCHEDULE_SECS: [f64; 10] = [0.2, 0.5, 1.0, 2.0, 3.0, 5.0, 5.0, 5.0, 5.0, 5.0];

/// A detected filesystem-event tool available on `PATH`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventTool {
    /// `fswatch` (macOS-first, also available on Linux/BSD).
    Fswatch,
    /// `watchexec`.
    Watchexec,
    /// `inotifywait` (from `inotify-tools`, Linux-only).
    Inotifywait,
}

impl EventTool {
    const fn binary_name(self) -> &'static str {
        match self {
            Self::Fswatch => "fswatch",
            Self::Watchexec => "watchexec",
            Self::Inotifywait => "inotifywait",
        }
    }
}

/// Detect the first available filesystem-event tool on `PATH`, in the
/// fixed preference order `fswatch`, `watchexec`, `inotifywait`.
///
/// # Errors
/// Returns [`OpsError::GitError`] (reused as a generic "external tool"
/// error) naming a platform-appropriate install hint if none are found.
pub fn detect_event_tool() -> Result<EventTool, OpsError> {
    for candidate in [EventTool::Fswatch, EventTool::Watchexec, EventTool::Inotifywait] {
        if which::which(candidate.binary_name()).is_ok() {
            return Ok(candidate);
        }
    }
    Err(OpsError::GitError {
        command: "watcher tool detection".to_owned(),
        stderr: format!(
            "none of {} found on PATH.\n  To fix: install one, e.g. `brew install fswatch` \
             (macOS) or `apt install inotify-tools` (Linux).",
            TOOL_CANDIDATES.join(", ")
        ),
    })
}

/// One attempt's outcome, for the caller to log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryAttempt {
    /// 1-based attempt number.
    pub attempt: usize,
    /// The number of check-ins processed by this attempt's collect.
    pub processed: usize,
    /// The number of new decisions written by this attempt's collect.
    pub decisions_created: usize,
}

/// Run `collect` on the fixed backoff schedule until the check-in queue is
/// empty or the schedule is exhausted (§4.F step 3).
///
/// `sleep` is injected so tests run instantly; the real watcher binary
/// passes `std::thread::sleep`.
///
/// A [`OpsError::LockHeld`] is the transient condition the backoff schedule
/// exists to ride out (another collect, or a worker still mid-write, holds
/// `locks/collect.lock`) — it is retried on schedule rather than propagated,
/// but only while the check-in queue still has pending entries; an empty
/// queue means there is nothing left to collect, so retrying stops
/// immediately instead of burning through the rest of the schedule. Any
/// other error (a malformed check-in, an archive collision) is not
/// transient and propagates on the first occurrence.
///
/// # Errors
/// Returns the last [`OpsError::LockHeld`] if the schedule is exhausted
/// while check-ins are still pending, or the first non-transient
/// [`OpsError`] a `collect` call produces.
pub fn run_collect_with_backoff(
    layout: &Layout,
    mut sleep: impl FnMut(f64),
) -> Result<Vec<RetryAttempt>, OpsError> {
    let mut attempts = Vec::new();
    let mut last_lock_held: Option<OpsError> = None;
    for (i, &delay) in BACKOFF_SCHEDULE_SECS.iter().enumerate() {
        match crate::collector::collect(layout) {
            Ok(report) => {
                last_lock_held = None;
                attempts.push(RetryAttempt {
                    attempt: i + 1,
                    processed: report.processed,
                    decisions_created: report.decisions_created.len(),
                });
                if queue_is_empty(layout)? {
                    return Ok(attempts);
                }
            }
            Err(err @ OpsError::LockHeld { .. }) => {
                if queue_is_empty(layout)? {
                    return Ok(attempts);
                }
                last_lock_held = Some(err);
            }
            Err(other) => return Err(other),
        }
        sleep(delay);
    }
    if let Some(err) = last_lock_held {
        return Err(err);
    }
    Ok(attempts)
}

fn queue_is_empty(layout: &Layout) -> Result<bool, OpsError> {
    let root = layout.root.join("queue/checkins");
    if !root.is_dir() {
        return Ok(true);
    }
    for worker_dir in std::fs::read_dir(&root)? {
        let worker_dir = worker_dir?;
        if !worker_dir.file_type()?.is_dir() {
            continue;
        }
        if std::fs::read_dir(worker_dir.path())?.next().is_some() {
            return Ok(false);
        }
    }
    Ok(true)
}
