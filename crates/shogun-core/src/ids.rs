//! Validated identifiers: worker ids, timestamps, and repo-relative paths.
//!
//! Every value that crosses a trust boundary (a YAML file someone else wrote)
//! is re-validated here on construction, never assumed valid because it was
//! written by a previous run of this program (§9 Design Notes, "YAML is a
//! wire format, not a type").

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

/// Describes why a value failed validation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value:?} ({reason})")]
pub struct ValidationError {
    /// What kind of identifier failed to validate.
    pub kind: &'static str,
    /// The raw, rejected value.
    pub value: String,
    /// Human-readable reason.
    pub reason: String,
}

fn worker_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]{1,64}$").expect("valid regex"))
}

fn timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d{8}T\d{6}Z$").expect("valid regex")
    })
}

// ---------------------------------------------------------------------------
// WorkerId
// ---------------------------------------------------------------------------

/// A validated worker identifier: `^[A-Za-z0-9._-]{1,64}$` (§3.2).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkerId(String);

impl WorkerId {
    /// Validate and construct a `WorkerId`.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] if `s` does not match
    /// `^[A-Za-z0-9._-]{1,64}$`.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if worker_id_re().is_match(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(ValidationError {
                kind: "worker id",
                value: s.to_owned(),
                reason: "must match ^[A-Za-z0-9._-]{1,64}$".to_owned(),
            })
        }
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WorkerId {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for WorkerId {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<WorkerId> for String {
    fn from(id: WorkerId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// A validated filename timestamp: `YYYYMMDDThhmmssZ` (§3.3).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(String);

impl Timestamp {
    /// Validate and construct a `Timestamp` from its filename-stem form.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] if `s` does not match
    /// `^\d{8}T\d{6}Z$`, or if the calendar/time fields are out of range.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if !timestamp_re().is_match(s) {
            return Err(ValidationError {
                kind: "timestamp",
                value: s.to_owned(),
                reason: "must match YYYYMMDDThhmmssZ".to_owned(),
            });
        }
        // Re-validate as a real instant, not merely digit-shaped.
        let fmt = "%Y%m%dT%H%M%SZ";
        chrono::NaiveDateTime::parse_from_str(s, fmt).map_err(|e| ValidationError {
            kind: "timestamp",
            value: s.to_owned(),
            reason: format!("not a valid UTC instant: {e}"),
        })?;
        Ok(Self(s.to_owned()))
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse to a `chrono` UTC datetime.
    ///
    /// # Panics
    /// Never panics: construction already proved this parses.
    #[must_use]
    pub fn to_datetime(&self) -> chrono::DateTime<chrono::Utc> {
        let naive = chrono::NaiveDateTime::parse_from_str(&self.0, "%Y%m%dT%H%M%SZ")
            .expect("validated at construction");
        naive.and_utc()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Timestamp {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Timestamp {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

// ---------------------------------------------------------------------------
// RepoRelativePath
// ---------------------------------------------------------------------------

/// A validated repo-relative path: no leading `/`, not empty, no `..`
/// component (§3.3).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoRelativePath(String);

impl RepoRelativePath {
    /// Validate and construct a `RepoRelativePath`.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] if `s` is empty, absolute, or contains a
    /// `..` path component.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError {
                kind: "repo-relative path",
                value: s.to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        if s.starts_with('/') {
            return Err(ValidationError {
                kind: "repo-relative path",
                value: s.to_owned(),
                reason: "must not be absolute (no leading '/')".to_owned(),
            });
        }
        if s.split('/').any(|part| part == "..") {
            return Err(ValidationError {
                kind: "repo-relative path",
                value: s.to_owned(),
                reason: "must not contain a '..' component".to_owned(),
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// View as a `Path`.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for RepoRelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RepoRelativePath {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RepoRelativePath {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<RepoRelativePath> for String {
    fn from(p: RepoRelativePath) -> Self {
        p.0
    }
}

/// Resolve `candidate` (joined under `root`) and confirm the result has
/// `root` as a proper prefix (path-traversal guard, P4).
///
/// # Errors
/// Returns an error if the resolved path escapes `root`, or if either path
/// cannot be canonicalized (parent directories must already exist).
pub fn guard_within_root(root: &Path, candidate: &Path) -> Result<PathBuf, ValidationError> {
    let joined = root.join(candidate);
    let parent = joined.parent().unwrap_or(&joined);
    // The leaf file itself need not exist yet; canonicalize its parent.
    std::fs::create_dir_all(parent).map_err(|e| ValidationError {
        kind: "path",
        value: joined.display().to_string(),
        reason: format!("could not prepare parent directory: {e}"),
    })?;
    let real_root = root.canonicalize().map_err(|e| ValidationError {
        kind: "path",
        value: root.display().to_string(),
        reason: format!("could not canonicalize OPS_ROOT: {e}"),
    })?;
    let real_parent = parent.canonicalize().map_err(|e| ValidationError {
        kind: "path",
        value: parent.display().to_string(),
        reason: format!("could not canonicalize path: {e}"),
    })?;
    if !real_parent.starts_with(&real_root) {
        return Err(ValidationError {
            kind: "path",
            value: joined.display().to_string(),
            reason: "escapes OPS_ROOT (path-traversal guard)".to_owned(),
        });
    }
    let leaf = joined
        .file_name()
        .ok_or_else(|| ValidationError {
            kind: "path",
            value: joined.display().to_string(),
            reason: "missing file name".to_owned(),
        })?;
    Ok(real_parent.join(leaf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_id_accepts_valid() {
        assert!(WorkerId::new("ashigaru1").is_ok());
        assert!(WorkerId::new("a.b-c_1").is_ok());
    }

    #[test]
    fn worker_id_rejects_invalid() {
        assert!(WorkerId::new("").is_err());
        assert!(WorkerId::new("has space").is_err());
        assert!(WorkerId::new("slash/es").is_err());
        assert!(WorkerId::new(&"x".repeat(65)).is_err());
    }

    #[test]
    fn timestamp_accepts_valid() {
        let ts = Timestamp::new("20260129T121501Z").unwrap();
        assert_eq!(ts.as_str(), "20260129T121501Z");
        let dt = ts.to_datetime();
        assert_eq!(dt.format("%Y").to_string(), "2026");
    }

    #[test]
    fn timestamp_rejects_malformed() {
        assert!(Timestamp::new("2026-01-29T12:15:01Z").is_err());
        assert!(Timestamp::new("20260132T000000Z").is_err(), "day 32 invalid");
        assert!(Timestamp::new("not-a-timestamp").is_err());
    }

    #[test]
    fn repo_relative_path_rejects_unsafe() {
        assert!(RepoRelativePath::new("").is_err());
        assert!(RepoRelativePath::new("/abs/path").is_err());
        assert!(RepoRelativePath::new("a/../b").is_err());
        assert!(RepoRelativePath::new("..").is_err());
    }

    #[test]
    fn repo_relative_path_accepts_safe() {
        assert!(RepoRelativePath::new("src/a.ts").is_ok());
        assert!(RepoRelativePath::new("a/b/c.rs").is_ok());
    }

    #[test]
    fn guard_within_root_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("ops_root");
        std::fs::create_dir_all(&root).unwrap();
        let escaping = Path::new("../../etc/passwd");
        let result = guard_within_root(&root, escaping);
        assert!(result.is_err());
    }

    #[test]
    fn guard_within_root_accepts_nested() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("ops_root");
        std::fs::create_dir_all(&root).unwrap();
        let nested = Path::new("queue/checkins/worker1/ts.yaml");
        let result = guard_within_root(&root, nested).unwrap();
        assert!(result.starts_with(root.canonicalize().unwrap()));
    }
}
