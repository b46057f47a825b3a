//! OPS_ROOT skeleton materialization (Component A).
//!
//! Resolves OPS_ROOT via [`crate::gitcmd::resolve_ops_root`] and, on first
//! invocation in a repository, creates the full directory skeleton plus a
//! default `config.yaml` with a single worker.

use std::path::{Path, PathBuf};

use crate::config::OpsConfig;
use crate::error::OpsError;
use crate::gitcmd;

/// The directories created under OPS_ROOT on first invocation (§3.1).
const SKELETON_DIRS: &[&str] = &[
    "locks",
    "queue/checkins",
    "queue/orders",
    "queue/decisions",
    "queue/refactor-drafts",
    "archive/checkins",
    "archive/decisions",
    "archive/refactor-drafts",
];

/// Resolved paths for every location named in §3.1, rooted at OPS_ROOT.
#[derive(Clone, Debug)]
pub struct Layout {
    /// `<git-common-dir>/agentic-sdd-ops/`.
    pub root: PathBuf,
}

impl Layout {
    /// Resolve OPS_ROOT for the repository containing `cwd`, materializing
    /// the skeleton and a default `config.yaml` if this is the first
    /// invocation.
    ///
    /// # Errors
    /// Returns [`OpsError::NotInGitRepo`] if `cwd` is not inside a Git
    /// working tree. Returns [`OpsError::Io`] if the skeleton cannot be
    /// created.
    pub fn materialize(cwd: &Path) -> Result<Self, OpsError> {
        let root = gitcmd::resolve_ops_root(cwd)?;
        let layout = Self { root };
        layout.ensure_skeleton()?;
        Ok(layout)
    }

    /// Resolve OPS_ROOT without touching the filesystem. Useful for read
    /// paths (e.g. `status`) that should not materialize a skeleton as a
    /// side effect of merely checking it exists.
    ///
    /// # Errors
    /// Returns [`OpsError::NotInGitRepo`] if `cwd` is not inside a Git
    /// working tree.
    pub fn resolve(cwd: &Path) -> Result<Self, OpsError> {
        Ok(Self {
            root: gitcmd::resolve_ops_root(cwd)?,
        })
    }

    fn ensure_skeleton(&self) -> Result<(), OpsError> {
        let is_first_invocation = !self.root.exists();
        for rel in SKELETON_DIRS {
            std::fs::create_dir_all(self.root.join(rel))?;
        }
        if is_first_invocation {
            let config_path = self.config_path();
            let default_cfg = OpsConfig::default_skeleton();
            let yaml = default_cfg
                .to_yaml()
                .map_err(|e| OpsError::ConfigError {
                    path: config_path.clone(),
                    detail: e.to_string(),
                })?;
            crate::atomic::write_atomic(&config_path, yaml.as_bytes())?;
        }
        Ok(())
    }

    /// `OPS_ROOT/config.yaml`.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    /// `OPS_ROOT/state.yaml`.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.root.join("state.yaml")
    }

    /// `OPS_ROOT/dashboard.md`.
    #[must_use]
    pub fn dashboard_path(&self) -> PathBuf {
        self.root.join("dashboard.md")
    }

    /// `OPS_ROOT/locks/collect.lock`.
    #[must_use]
    pub fn collect_lock_path(&self) -> PathBuf {
        self.root.join("locks/collect.lock")
    }

    /// `OPS_ROOT/queue/checkins/<worker>/`.
    #[must_use]
    pub fn checkin_queue_dir(&self, worker: &str) -> PathBuf {
        self.root.join("queue/checkins").join(worker)
    }

    /// `OPS_ROOT/queue/orders/<worker>/`.
    #[must_use]
    pub fn order_queue_dir(&self, worker: &str) -> PathBuf {
        self.root.join("queue/orders").join(worker)
    }

    /// `OPS_ROOT/queue/decisions/`.
    #[must_use]
    pub fn decision_queue_dir(&self) -> PathBuf {
        self.root.join("queue/decisions")
    }

    /// `OPS_ROOT/queue/refactor-drafts/<worker>/`.
    #[must_use]
    pub fn refactor_draft_queue_dir(&self, worker: &str) -> PathBuf {
        self.root.join("queue/refactor-drafts").join(worker)
    }

    /// `OPS_ROOT/archive/checkins/<worker>/`.
    #[must_use]
    pub fn checkin_archive_dir(&self, worker: &str) -> PathBuf {
        self.root.join("archive/checkins").join(worker)
    }

    /// `OPS_ROOT/archive/decisions/`.
    #[must_use]
    pub fn decision_archive_dir(&self) -> PathBuf {
        self.root.join("archive/decisions")
    }

    /// `OPS_ROOT/archive/refactor-drafts/<worker>/`.
    #[must_use]
    pub fn refactor_draft_archive_dir(&self, worker: &str) -> PathBuf {
        self.root.join("archive/refactor-drafts").join(worker)
    }

    /// Load `config.yaml`, returning defaults if it has not been written
    /// yet (callers normally invoke [`Layout::materialize`] first, which
    /// avoids that case in practice).
    ///
    /// # Errors
    /// Returns [`OpsError::ConfigError`] on invalid YAML or a rejected
    /// unknown key.
    pub fn load_config(&self) -> Result<OpsConfig, OpsError> {
        OpsConfig::load(&self.config_path()).map_err(OpsError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn init_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for args in [
            vec!["init"],
            vec!["config", "user.name", "Test"],
            vec!["config", "user.email", "test@example.com"],
            vec!["config", "commit.gpgsign", "false"],
        ] {
            Command::new("git").args(&args).current_dir(root).output().unwrap();
        }
        std::fs::write(root.join("README.md"), "hi\n").unwrap();
        Command::new("git").args(["add", "README.md"]).current_dir(root).output().unwrap();
        Command::new("git")
            .args(["commit", "-m", "init"])
            .current_dir(root)
            .output()
            .unwrap();
        dir
    }

    #[test]
    fn materialize_creates_full_skeleton() {
        let dir = init_repo();
        let layout = Layout::materialize(dir.path()).unwrap();
        for rel in SKELETON_DIRS {
            assert!(layout.root.join(rel).is_dir(), "missing {rel}");
        }
        assert!(layout.config_path().is_file());
    }

    #[test]
    fn materialize_writes_default_single_worker_config() {
        let dir = init_repo();
        let layout = Layout::materialize(dir.path()).unwrap();
        let cfg = layout.load_config().unwrap();
        assert_eq!(cfg.workers.len(), 1);
        assert_eq!(cfg.workers[0].id, "worker1");
    }

    #[test]
    fn materialize_twice_does_not_clobber_config() {
        let dir = init_repo();
        let layout = Layout::materialize(dir.path()).unwrap();
        std::fs::write(layout.config_path(), "workers:\n  - id: custom\n").unwrap();

        let layout2 = Layout::materialize(dir.path()).unwrap();
        let cfg = layout2.load_config().unwrap();
        assert_eq!(cfg.workers[0].id, "custom");
    }

    #[test]
    fn materialize_fails_outside_git() {
        let dir = tempfile::tempdir().unwrap();
        let result = Layout::materialize(dir.path());
        assert!(matches!(result, Err(OpsError::NotInGitRepo { .. })));
    }

    #[test]
    fn resolve_does_not_create_skeleton() {
        let dir = init_repo();
        let layout = Layout::resolve(dir.path()).unwrap();
        assert!(!layout.root.exists());
    }
}
