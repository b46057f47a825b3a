//! Thin wrapper over the `git` binary for the handful of read-only queries
//! the coordination core needs: resolving OPS_ROOT, listing changed files
//! for the Check-in Producer, and reading the `origin` remote for the
//! GitHub-facing commands.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::OpsError;

/// Run `git` with `args` in `cwd` and return trimmed stdout.
///
/// # Errors
/// Returns [`OpsError::GitError`] if the process cannot be spawned or exits
/// non-zero.
fn run_git(cwd: &Path, args: &[&str]) -> Result<String, OpsError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|e| OpsError::GitError {
            command: format!("git {}", args.join(" ")),
            stderr: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(OpsError::GitError {
            command: format!("git {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
}

/// Resolve OPS_ROOT: `<git-common-dir>/agentic-sdd-ops/`.
///
/// Combines `git rev-parse --absolute-git-dir` with `--git-common-dir` so
/// that worktrees of the same repository share a single OPS_ROOT, and
/// normalizes the result to an absolute path for Git versions that predate
/// `--path-format=absolute`.
///
/// # Errors
/// Returns [`OpsError::NotInGitRepo`] if `cwd` is not inside a Git working
/// tree.
pub fn resolve_ops_root(cwd: &Path) -> Result<PathBuf, OpsError> {
    let absolute_git_dir =
        run_git(cwd, &["rev-parse", "--absolute-git-dir"]).map_err(|e| to_not_in_repo(&e))?;
    let common_dir_raw =
        run_git(cwd, &["rev-parse", "--git-common-dir"]).map_err(|e| to_not_in_repo(&e))?;

    let common_dir = if Path::new(&common_dir_raw).is_absolute() {
        PathBuf::from(&common_dir_raw)
    } else {
        // Older Git prints a path relative to the working tree's `.git`
        // directory; resolve it against the absolute git dir's parent so
        // the result is absolute regardless of Git version.
        let git_dir = PathBuf::from(&absolute_git_dir);
        git_dir
            .parent()
            .unwrap_or(&git_dir)
            .join(&common_dir_raw)
    };

    let canonical = common_dir.canonicalize().unwrap_or(common_dir);
    Ok(canonical.join("agentic-sdd-ops"))
}

fn to_not_in_repo(err: &OpsError) -> OpsError {
    match err {
        OpsError::GitError { stderr, .. } => OpsError::NotInGitRepo {
            detail: stderr.clone(),
        },
        other => OpsError::NotInGitRepo {
            detail: other.to_string(),
        },
    }
}

/// Return repo-relative paths from `git diff --name-only` against the given
/// `refspec` (e.g. `"--staged"`, `"HEAD"`, or empty for the worktree diff).
///
/// # Errors
/// Returns [`OpsError::GitError`] on a non-git-repo or a `git` failure.
pub fn diff_name_only(cwd: &Path, extra_args: &[&str]) -> Result<Vec<String>, OpsError> {
    let mut args = vec!["diff", "--name-only"];
    args.extend_from_slice(extra_args);
    let out = run_git(cwd, &args)?;
    Ok(out.lines().map(str::to_owned).filter(|l| !l.is_empty()).collect())
}

/// Resolve the absolute path to the working tree's top-level directory.
///
/// # Errors
/// Returns [`OpsError::NotInGitRepo`] if `cwd` is not inside a Git working
/// tree.
pub fn toplevel(cwd: &Path) -> Result<PathBuf, OpsError> {
    let out = run_git(cwd, &["rev-parse", "--show-toplevel"]).map_err(|e| to_not_in_repo(&e))?;
    Ok(PathBuf::from(out))
}

/// Parse `OWNER/REPO` from the `origin` remote URL, supporting both
/// `git@github.com:OWNER/REPO.git` and `https://github.com/OWNER/REPO.git`
/// forms.
///
/// # Errors
/// Returns [`OpsError::GitError`] if there is no `origin` remote or its URL
/// cannot be parsed into an `OWNER/REPO` pair.
pub fn origin_owner_repo(cwd: &Path) -> Result<String, OpsError> {
    let url = run_git(cwd, &["remote", "get-url", "origin"])?;
    parse_owner_repo(&url).ok_or_else(|| OpsError::GitError {
        command: "git remote get-url origin".to_owned(),
        stderr: format!("could not parse OWNER/REPO from remote URL: {url}"),
    })
}

fn parse_owner_repo(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches(".git");
    let tail = trimmed
        .rsplit_once("github.com:")
        .or_else(|| trimmed.rsplit_once("github.com/"))
        .map(|(_, rest)| rest)?;
    let mut parts = tail.splitn(2, '/');
    let owner = parts.next()?;
    let repo = parts.next()?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some(format!("{owner}/{repo}"))
}
