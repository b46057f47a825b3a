//! Coordination error types for Shogun Ops.
//!
//! Defines [`OpsError`], the unified error type returned by every
//! `shogun_core` operation. Messages are agent-friendly: each variant states
//! what went wrong and a "To fix:" line with a concrete next command, the
//! same shape every CLI entry point ultimately prints on a single line
//! (exit code >= 2).

use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// OpsError
// ---------------------------------------------------------------------------

/// Unified error type for check-in, collection, supervision, and approval
/// operations.
#[derive(Debug)]
pub enum OpsError {
    /// The OPS_ROOT could not be resolved because the current directory is
    /// not inside a Git working tree.
    NotInGitRepo {
        /// The underlying `git` failure.
        detail: String,
    },

    /// A lock file is already held by another process.
    LockHeld {
        /// Path to the lock file.
        path: PathBuf,
        /// Contents of the lock file, if readable (holder pid/identity).
        holder: Option<String>,
    },

    /// A value read from an on-disk YAML file failed validation.
    InvalidField {
        /// Path to the file containing the bad value.
        path: PathBuf,
        /// Name of the field.
        field: &'static str,
        /// Raw rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A YAML file could not be parsed.
    CorruptFile {
        /// Path to the offending file.
        path: PathBuf,
        /// Human-readable description of the parse failure.
        detail: String,
    },

    /// A resolved path would escape OPS_ROOT.
    PathEscape {
        /// The path that was rejected.
        path: PathBuf,
    },

    /// A configuration file could not be loaded.
    ConfigError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Human-readable description of the problem.
        detail: String,
    },

    /// A `git` subprocess exited non-zero.
    GitError {
        /// The command that was run (e.g. `"git diff --name-only"`).
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// A `gh` subprocess exited non-zero.
    GhError {
        /// The command that was run (e.g. `"gh issue view 42"`).
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// A skill scaffold already exists at the target path.
    SkillExists {
        /// The skill name.
        name: String,
    },

    /// The decision referenced by an approval command was not found.
    DecisionNotFound {
        /// The decision identifier looked up.
        id: String,
    },

    /// An I/O error occurred during a filesystem operation.
    Io(std::io::Error),
}

// ---------------------------------------------------------------------------
// Display — agent-friendly error messages
// ---------------------------------------------------------------------------

impl fmt::Display for OpsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInGitRepo { detail } => {
                write!(
                    f,
                    "not inside a Git working tree: {detail}\n  To fix: run this command from inside a Git repository (or `git init` one)."
                )
            }
            Self::LockHeld { path, holder } => {
                write!(f, "lock file already held: {}", path.display())?;
                if let Some(h) = holder {
                    write!(f, " (held by {h})")?;
                }
                write!(
                    f,
                    "\n  To fix: wait for the other process to finish, or remove the lock file if it is stale:\n    rm {}",
                    path.display()
                )
            }
            Self::InvalidField {
                path,
                field,
                value,
                reason,
            } => {
                write!(
                    f,
                    "invalid field '{field}' in {}: {value:?} ({reason})\n  To fix: correct the field and re-run, or delete the file if it was produced incorrectly.",
                    path.display()
                )
            }
            Self::CorruptFile { path, detail } => {
                write!(
                    f,
                    "could not parse {}: {detail}\n  To fix: inspect the file for malformed YAML and correct or remove it.",
                    path.display()
                )
            }
            Self::PathEscape { path } => {
                write!(
                    f,
                    "path escapes the coordination root: {}\n  To fix: use a path relative to the repository root with no '..' components.",
                    path.display()
                )
            }
            Self::ConfigError { path, detail } => {
                write!(
                    f,
                    "configuration error in '{}': {detail}\n  To fix: edit the config file and correct the issue.",
                    path.display()
                )
            }
            Self::GitError { command, stderr } => {
                write!(f, "git command failed: {command}")?;
                if !stderr.is_empty() {
                    write!(f, "\n  stderr: {stderr}")?;
                }
                write!(f, "\n  To fix: check `git status` and retry.")
            }
            Self::GhError { command, stderr } => {
                write!(f, "gh command failed: {command}")?;
                if !stderr.is_empty() {
                    write!(f, "\n  stderr: {stderr}")?;
                }
                write!(
                    f,
                    "\n  To fix: confirm `gh auth status` succeeds and the repository/issue exists."
                )
            }
            Self::SkillExists { name } => {
                write!(
                    f,
                    "skill '{name}' already exists.\n  To fix: choose a different name, or remove the existing scaffold:\n    rm skills/{name}.md"
                )
            }
            Self::DecisionNotFound { id } => {
                write!(
                    f,
                    "decision '{id}' not found.\n  To fix: check pending decisions:\n    shogun-ops status"
                )
            }
            Self::Io(err) => {
                write!(
                    f,
                    "I/O error: {err}\n  To fix: check file permissions and disk space."
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// std::error::Error
// ---------------------------------------------------------------------------

impl std::error::Error for OpsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// From impls
// ---------------------------------------------------------------------------

impl From<std::io::Error> for OpsError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<crate::config::ConfigError> for OpsError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::ConfigError {
            path: err.path.unwrap_or_default(),
            detail: err.message,
        }
    }
}
