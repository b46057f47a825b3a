//! Thin wrapper over the `gh` CLI (§4.D, §4.G, §6.3).
//!
//! `gh`'s JSON outputs are treated as an opaque I/O oracle (§1): this module
//! parses only the fields the Supervisor and GitHub-Sync Adapter need and
//! never interprets `gh`'s internals beyond that. A [`GhClient`] trait
//! separates the subprocess calls from the logic that consumes them, so
//! [`crate::supervisor`] and [`crate::sync`] can be exercised against a fake
//! implementation without a network or an authenticated `gh`.

use std::process::Command;

use serde::Deserialize;

use crate::error::OpsError;

/// Title/labels/body for one issue, as needed by the Supervisor (§4.D step
/// 2) and the GitHub-Sync Adapter (§4.G).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct IssueDetail {
    /// The issue number.
    pub number: u64,
    /// The issue title.
    pub title: String,
    /// Label names attached to the issue.
    pub labels: Vec<String>,
    /// The issue body, if fetched; `None` when only summary fields were
    /// requested.
    #[serde(default)]
    pub body: Option<String>,
}

/// The result of a `gh label create --force` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelSpec {
    /// The label name, e.g. `"ops-phase:implementing"`.
    pub name: String,
    /// A deterministic hex color (no leading `#`).
    pub color: &'static str,
    /// A one-line description.
    pub description: &'static str,
}

/// Operations the Supervisor and GitHub-Sync Adapter need from `gh`.
///
/// # Errors
/// Every method may return [`OpsError::GhError`] on a non-zero `gh` exit or
/// malformed JSON.
pub trait GhClient {
    /// `gh issue list --repo <repo> --json number,title,labels [--label
    /// parallel-ok]`.
    fn list_issues(
        &self,
        repo: &str,
        require_label: Option<&str>,
    ) -> Result<Vec<IssueDetail>, OpsError>;

    /// `gh issue view <number> --repo <repo> --json number,title,labels`.
    fn view_issue_summary(&self, repo: &str, number: u64) -> Result<IssueDetail, OpsError>;

    /// `gh issue view <number> --repo <repo> --json body`. A separate call
    /// per §4.D step 2 ("fetch title/labels... body via a separate
    /// `--json body` call"), so a malformed/missing body never prevents the
    /// candidate's title/labels from being read.
    fn view_issue_body(&self, repo: &str, number: u64) -> Result<Option<String>, OpsError>;

    /// `gh auth status`. Returns `Ok(())` only on a zero exit.
    fn auth_status(&self) -> Result<(), OpsError>;

    /// `gh label create --force --repo <repo> --color <color> --description
    /// <description> <name>`.
    fn ensure_label(&self, repo: &str, spec: &LabelSpec) -> Result<(), OpsError>;

    /// `gh issue edit <number> --repo <repo> --remove-label <name>` for
    /// every label matching `ops-phase:*`, followed by `--add-label` for the
    /// single target phase label. Implementations may batch these into one
    /// `gh issue edit` invocation.
    fn reconcile_phase_label(
        &self,
        repo: &str,
        number: u64,
        remove: &[String],
        add: &str,
    ) -> Result<(), OpsError>;

    /// Toggle the `ops-blocked` label on or off.
    fn set_blocked_label(&self, repo: &str, number: u64, blocked: bool) -> Result<(), OpsError>;

    /// `gh issue comment <number> --repo <repo> --body <body>`.
    fn post_comment(&self, repo: &str, number: u64, body: &str) -> Result<(), OpsError>;

    /// `gh issue create --repo <repo> --title <title> --body <body>`.
    /// Returns the created issue's URL.
    fn create_issue(&self, repo: &str, title: &str, body: &str) -> Result<String, OpsError>;
}

/// A [`GhClient`] that shells out to the real `gh` binary.
#[derive(Clone, Copy, Debug, Default)]
pub struct RealGh;

#[derive(Deserialize)]
struct RawIssueSummary {
    number: u64,
    title: String,
    #[serde(default)]
    labels: Vec<RawLabel>,
}

#[derive(Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Deserialize)]
struct RawBody {
    #[serde(default)]
    body: Option<String>,
}

fn run_gh(args: &[&str]) -> Result<String, OpsError> {
    let output = Command::new("gh")
        .args(args)
        .output()
        .map_err(|e| OpsError::GhError {
            command: format!("gh {}", args.join(" ")),
            stderr: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(OpsError::GhError {
            command: format!("gh {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

impl GhClient for RealGh {
    fn list_issues(
        &self,
        repo: &str,
        require_label: Option<&str>,
    ) -> Result<Vec<IssueDetail>, OpsError> {
        let mut args = vec![
            "issue", "list", "--repo", repo, "--json", "number,title,labels",
        ];
        if let Some(label) = require_label {
            args.push("--label");
            args.push(label);
        }
        let out = run_gh(&args)?;
        let raw: Vec<RawIssueSummary> =
            serde_json::from_str(&out).map_err(|e| OpsError::GhError {
                command: format!("gh {}", args.join(" ")),
                stderr: format!("could not parse JSON: {e}"),
            })?;
        Ok(raw
            .into_iter()
            .map(|r| IssueDetail {
                number: r.number,
                title: r.title,
                labels: r.labels.into_iter().map(|l| l.name).collect(),
                body: None,
            })
            .collect())
    }

    fn view_issue_summary(&self, repo: &str, number: u64) -> Result<IssueDetail, OpsError> {
        let number_str = number.to_string();
        let args = [
            "issue",
            "view",
            &number_str,
            "--repo",
            repo,
            "--json",
            "number,title,labels",
        ];
        let out = run_gh(&args)?;
        let raw: RawIssueSummary = serde_json::from_str(&out).map_err(|e| OpsError::GhError {
            command: format!("gh {}", args.join(" ")),
            stderr: format!("could not parse JSON: {e}"),
        })?;
        Ok(IssueDetail {
            number: raw.number,
            title: raw.title,
            labels: raw.labels.into_iter().map(|l| l.name).collect(),
            body: None,
        })
    }

    fn view_issue_body(&self, repo: &str, number: u64) -> Result<Option<String>, OpsError> {
        let number_str = number.to_string();
        let args = [
            "issue", "view", &number_str, "--repo", repo, "--json", "body",
        ];
        // §9 Open Question: a malformed/missing body is treated as an empty
        // body rather than a fatal error — the decision taxonomy is
        // unaffected either way (`missing_change_targets` covers both).
        match run_gh(&args) {
            Ok(out) => {
                let raw: RawBody = serde_json::from_str(&out).unwrap_or(RawBody { body: None });
                Ok(raw.body)
            }
            Err(_) => Ok(None),
        }
    }

    fn auth_status(&self) -> Result<(), OpsError> {
        run_gh(&["auth", "status"]).map(|_| ())
    }

    fn ensure_label(&self, repo: &str, spec: &LabelSpec) -> Result<(), OpsError> {
        run_gh(&[
            "label",
            "create",
            &spec.name,
            "--repo",
            repo,
            "--color",
            spec.color,
            "--description",
            spec.description,
            "--force",
        ])
        .map(|_| ())
    }

    fn reconcile_phase_label(
        &self,
        repo: &str,
        number: u64,
        remove: &[String],
        add: &str,
    ) -> Result<(), OpsError> {
        let number_str = number.to_string();
        for label in remove {
            // Best-effort: a label that was never attached is not an error.
            let _ = run_gh(&[
                "issue",
                "edit",
                &number_str,
                "--repo",
                repo,
                "--remove-label",
                label,
            ]);
        }
        run_gh(&[
            "issue",
            "edit",
            &number_str,
            "--repo",
            repo,
            "--add-label",
            add,
        ])
        .map(|_| ())
    }

    fn set_blocked_label(&self, repo: &str, number: u64, blocked: bool) -> Result<(), OpsError> {
        let number_str = number.to_string();
        let flag = if blocked {
            "--add-label"
        } else {
            "--remove-label"
        };
        run_gh(&[
            "issue",
            "edit",
            &number_str,
            "--repo",
            repo,
            flag,
            "ops-blocked",
        ])
        .map(|_| ())
    }

    fn post_comment(&self, repo: &str, number: u64, body: &str) -> Result<(), OpsError> {
        let number_str = number.to_string();
        run_gh(&[
            "issue",
            "comment",
            &number_str,
            "--repo",
            repo,
            "--body",
            body,
        ])
        .map(|_| ())
    }

    fn create_issue(&self, repo: &str, title: &str, body: &str) -> Result<String, OpsError> {
        let out = run_gh(&[
            "issue", "create", "--repo", repo, "--title", title, "--body", body,
        ])?;
        Ok(out.trim().to_owned())
    }
}

/// Standard `ops-phase:*` and `ops-blocked` labels with deterministic
/// colors (§4.G: "Required labels are ensured via `gh label create --force`
/// with deterministic colors").
#[must_use]
pub fn standard_labels() -> Vec<LabelSpec> {
    [
        ("ops-phase:backlog", "ededed", "Shogun Ops: not yet estimated or started"),
        ("ops-phase:estimating", "d4c5f9", "Shogun Ops: under estimation"),
        ("ops-phase:implementing", "1d76db", "Shogun Ops: actively being implemented"),
        (
            "ops-phase:reviewing",
            "fbca04",
            "Shogun Ops: implementation complete, under review",
        ),
        ("ops-phase:blocked", "e11d21", "Shogun Ops: blocked on an external decision"),
        ("ops-phase:done", "0e8a16", "Shogun Ops: finished"),
        ("ops-blocked", "b60205", "Shogun Ops: at least one open blocker decision"),
    ]
    .into_iter()
    .map(|(name, color, description)| LabelSpec {
        name: name.to_owned(),
        color,
        description,
    })
    .collect()
}

#[cfg(test)]
pub(crate) mod fake {
    use super::{GhClient, IssueDetail, LabelSpec};
    use crate::error::OpsError;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// An in-memory [`GhClient`] for unit tests: issues are registered up
    /// front, all writes are recorded rather than executed.
    #[derive(Default)]
    pub struct FakeGh {
        pub issues: HashMap<u64, IssueDetail>,
        pub auth_ok: bool,
        pub comments: RefCell<Vec<(u64, String)>>,
        pub reconciled_labels: RefCell<Vec<(u64, Vec<String>, String)>>,
        pub blocked_toggles: RefCell<Vec<(u64, bool)>>,
        pub created_issues: RefCell<Vec<(String, String)>>,
        pub ensured_labels: RefCell<Vec<String>>,
    }

    impl GhClient for FakeGh {
        fn list_issues(
            &self,
            _repo: &str,
            require_label: Option<&str>,
        ) -> Result<Vec<IssueDetail>, OpsError> {
            let mut issues: Vec<IssueDetail> = self.issues.values().cloned().collect();
            if let Some(label) = require_label {
                issues.retain(|i| i.labels.iter().any(|l| l == label));
            }
            issues.sort_by_key(|i| i.number);
            Ok(issues)
        }

        fn view_issue_summary(&self, _repo: &str, number: u64) -> Result<IssueDetail, OpsError> {
            self.issues
                .get(&number)
                .cloned()
                .ok_or_else(|| OpsError::GhError {
                    command: format!("gh issue view {number}"),
                    stderr: "no such issue".to_owned(),
                })
        }

        fn view_issue_body(&self, _repo: &str, number: u64) -> Result<Option<String>, OpsError> {
            Ok(self.issues.get(&number).and_then(|i| i.body.clone()))
        }

        fn auth_status(&self) -> Result<(), OpsError> {
            if self.auth_ok {
                Ok(())
            } else {
                Err(OpsError::GhError {
                    command: "gh auth status".to_owned(),
                    stderr: "not logged in".to_owned(),
                })
            }
        }

        fn ensure_label(&self, _repo: &str, spec: &LabelSpec) -> Result<(), OpsError> {
            self.ensured_labels.borrow_mut().push(spec.name.clone());
            Ok(())
        }

        fn reconcile_phase_label(
            &self,
            _repo: &str,
            number: u64,
            remove: &[String],
            add: &str,
        ) -> Result<(), OpsError> {
            self.reconciled_labels
                .borrow_mut()
                .push((number, remove.to_vec(), add.to_owned()));
            Ok(())
        }

        fn set_blocked_label(&self, _repo: &str, number: u64, blocked: bool) -> Result<(), OpsError> {
            self.blocked_toggles.borrow_mut().push((number, blocked));
            Ok(())
        }

        fn post_comment(&self, _repo: &str, number: u64, body: &str) -> Result<(), OpsError> {
            self.comments.borrow_mut().push((number, body.to_owned()));
            Ok(())
        }

        fn create_issue(&self, _repo: &str, title: &str, body: &str) -> Result<String, OpsError> {
            self.created_issues
                .borrow_mut()
                .push((title.to_owned(), body.to_owned()));
            Ok(format!("https://github.com/acme/widgets/issues/{}", self.issues.len() + 1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_labels_includes_all_phases_and_blocked() {
        let labels = standard_labels();
        assert_eq!(labels.len(), 7);
        assert!(labels.iter().any(|l| l.name == "ops-phase:backlog"));
        assert!(labels.iter().any(|l| l.name == "ops-blocked"));
    }

    #[test]
    fn standard_labels_have_unique_names() {
        let labels = standard_labels();
        let mut names: Vec<&str> = labels.iter().map(|l| l.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), labels.len());
    }
}
