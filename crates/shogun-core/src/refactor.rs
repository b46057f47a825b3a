//! Refactor-draft producer and the refactor-issue adapter.
//!
//! A refactor draft is a worker's free-text proposal to split out follow-up
//! work into its own GitHub issue. It is appended to the queue exactly like
//! a check-in (§3.3's append-only convention) and, once turned into a real
//! issue, archived.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::OpsError;
use crate::gh::GhClient;
use crate::layout::Layout;

/// A worker's proposal for a follow-up issue.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RefactorDraft {
    /// Schema version.
    pub version: u32,
    /// The proposing worker.
    pub worker: String,
    /// UTC ISO-8601 timestamp derived from the filename stem.
    pub created_at: String,
    /// The proposed issue title.
    pub title: String,
    /// Free-text description of the proposed follow-up work.
    pub summary: String,
}

/// Assemble and atomically append a refactor draft to the queue.
///
/// Fails with no side effect if the target filename already exists
/// (append-only, same convention as [`crate::checkin::produce`]).
///
/// # Errors
/// Returns an I/O error (surfaced via [`OpsError::Io`]) if the file already
/// exists or the write otherwise fails.
pub fn produce(
    layout: &Layout,
    worker: &str,
    timestamp: &str,
    title: &str,
    summary: &str,
) -> Result<PathBuf, OpsError> {
    let draft = RefactorDraft {
        version: 1,
        worker: worker.to_owned(),
        created_at: timestamp.to_owned(),
        title: title.to_owned(),
        summary: summary.to_owned(),
    };
    let dest = layout
        .refactor_draft_queue_dir(worker)
        .join(format!("{timestamp}.yaml"));
    let yaml = serde_yaml::to_string(&draft).map_err(|e| OpsError::CorruptFile {
        path: dest.clone(),
        detail: e.to_string(),
    })?;
    crate::atomic::create_exclusive(&dest, yaml.as_bytes())?;
    Ok(dest)
}

/// Read a refactor draft back from disk.
///
/// # Errors
/// Returns [`OpsError::CorruptFile`] if the YAML cannot be parsed.
pub fn read(path: &Path) -> Result<RefactorDraft, OpsError> {
    let raw = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&raw).map_err(|e| OpsError::CorruptFile {
        path: path.to_owned(),
        detail: e.to_string(),
    })
}

/// Create a GitHub issue from a refactor draft and archive the draft on
/// success. Returns the created issue's URL.
///
/// # Errors
/// Returns [`OpsError::GhError`] if issue creation fails. The draft is left
/// in the queue (not archived) in that case, so the operation can be
/// retried.
pub fn create_issue_from_draft(
    layout: &Layout,
    gh: &dyn GhClient,
    repo: &str,
    draft_path: &Path,
) -> Result<String, OpsError> {
    let draft = read(draft_path)?;
    let body = format!("{}\n\n_Proposed by {}_", draft.summary, draft.worker);
    let url = gh.create_issue(repo, &draft.title, &body)?;

    let file_name = draft_path
        .file_name()
        .expect("draft path always has a file name");
    let archive_dest = layout
        .refactor_draft_archive_dir(&draft.worker)
        .join(file_name);
    crate::atomic::rename_with_collision_suffix(draft_path, &archive_dest)?;

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gh::fake::FakeGh;

    #[test]
    fn produce_writes_to_expected_path() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout {
            root: dir.path().to_owned(),
        };
        let path = produce(
            &layout,
            "alice",
            "20260129T120000Z",
            "Extract shared retry helper",
            "Three call sites duplicate the same backoff loop.",
        )
        .unwrap();
        assert!(path.ends_with("queue/refactor-drafts/alice/20260129T120000Z.yaml"));
        let draft = read(&path).unwrap();
        assert_eq!(draft.worker, "alice");
        assert_eq!(draft.title, "Extract shared retry helper");
    }

    #[test]
    fn produce_fails_on_duplicate_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout {
            root: dir.path().to_owned(),
        };
        produce(&layout, "alice", "20260129T120000Z", "t", "s").unwrap();
        let result = produce(&layout, "alice", "20260129T120000Z", "t2", "s2");
        assert!(result.is_err());
    }

    #[test]
    fn create_issue_from_draft_archives_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout {
            root: dir.path().to_owned(),
        };
        let path = produce(&layout, "alice", "20260129T120000Z", "t", "s").unwrap();
        let gh = FakeGh::default();

        let url = create_issue_from_draft(&layout, &gh, "acme/widgets", &path).unwrap();
        assert!(url.starts_with("https://github.com/"));
        assert!(!path.exists());
        assert!(layout
            .refactor_draft_archive_dir("alice")
            .join("20260129T120000Z.yaml")
            .exists());
    }
}
