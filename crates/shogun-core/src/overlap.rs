//! File-overlap detection between candidate issues (§4.D step 4).
//!
//! The actual touched-file prediction lives in an external script
//! (`scripts/agentic-sdd/worktree.sh check --issue …` in an installed
//! target, falling back to the repo's own `scripts/shell/worktree.sh`) —
//! out of scope per §1, consumed here only through its exit code and
//! stdout contract. Exit `0` means no overlap, `3` means overlap, anything
//! else is an internal error the Supervisor must not silently swallow.

use std::path::Path;
use std::process::Command;

use crate::error::OpsError;

/// The two candidate script locations tried, in order (§4.D step 4).
const SCRIPT_CANDIDATES: [&str; 2] = [
    "scripts/agentic-sdd/worktree.sh",
    "scripts/shell/worktree.sh",
];

/// Outcome of a worktree overlap check for one pair of issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlapOutcome {
    /// Exit code `0`.
    NoOverlap,
    /// Exit code `3`.
    Overlap,
}

/// Run the external worktree-check script for `issue_a` and `issue_b`
/// inside `repo_root`, trying each candidate path in order and using the
/// first one that exists.
///
/// # Errors
/// Returns [`OpsError::GitError`] (reused as a generic "external tool"
/// error; the script is a `git`-adjacent helper) if neither candidate
/// script exists, the process cannot be spawned, or it exits with a code
/// other than `0` or `3`.
pub fn check(repo_root: &Path, issue_a: u64, issue_b: u64) -> Result<OverlapOutcome, OpsError> {
    let script = SCRIPT_CANDIDATES
        .iter()
        .map(|rel| repo_root.join(rel))
        .find(|p| p.is_file())
        .ok_or_else(|| OpsError::GitError {
            command: "worktree.sh check".to_owned(),
            stderr: format!(
                "no worktree-check script found at {}",
                SCRIPT_CANDIDATES.join(" or ")
            ),
        })?;

    let a = issue_a.to_string();
    let b = issue_b.to_string();
    let output = Command::new(&script)
        .args(["check", "--issue", &a, "--issue", &b])
        .current_dir(repo_root)
        .output()
        .map_err(|e| OpsError::GitError {
            command: format!("{} check --issue {a} --issue {b}", script.display()),
            stderr: e.to_string(),
        })?;

    match output.status.code() {
        Some(0) => Ok(OverlapOutcome::NoOverlap),
        Some(3) => Ok(OverlapOutcome::Overlap),
        other => Err(OpsError::GitError {
            command: format!("{} check --issue {a} --issue {b}", script.display()),
            stderr: format!(
                "unexpected exit code {other:?}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &Path, rel: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        #[cfg(unix)]
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn missing_script_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = check(dir.path(), 1, 2);
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn exit_zero_is_no_overlap() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "scripts/agentic-sdd/worktree.sh", "#!/bin/sh\nexit 0\n");
        assert_eq!(check(dir.path(), 1, 2).unwrap(), OverlapOutcome::NoOverlap);
    }

    #[cfg(unix)]
    #[test]
    fn exit_three_is_overlap() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "scripts/agentic-sdd/worktree.sh", "#!/bin/sh\nexit 3\n");
        assert_eq!(check(dir.path(), 1, 2).unwrap(), OverlapOutcome::Overlap);
    }

    #[cfg(unix)]
    #[test]
    fn exit_other_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "scripts/agentic-sdd/worktree.sh", "#!/bin/sh\nexit 7\n");
        assert!(check(dir.path(), 1, 2).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn falls_back_to_shell_script_location() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "scripts/shell/worktree.sh", "#!/bin/sh\nexit 0\n");
        assert_eq!(check(dir.path(), 1, 2).unwrap(), OverlapOutcome::NoOverlap);
    }
}
