//! Decision entity, fingerprinting, and de-duplication (§3.2).
//!
//! A decision's `request` shape depends on its `type` discriminator. Rather
//! than model that as a Rust enum with per-variant struct payloads — which
//! would force a guess at the exact field set for variants `spec.md` only
//! partially enumerates — `request` is kept as a raw YAML mapping, the same
//! "validate on every read, trust nothing pre-parsed" stance taken for
//! check-ins (see [`crate::checkin`]). Typed constructors and accessors
//! build and read known shapes without requiring every caller to hand-roll
//! mapping keys.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// The decision discriminator (§3.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// A worker explicitly requested human approval.
    ApprovalRequired,
    /// A worker touched files outside its declared contract.
    ContractExpansion,
    /// A worker reported a free-text blocker.
    Blocker,
    /// A worker proposed a new reusable skill.
    SkillCandidate,
    /// The Supervisor detected overlapping file contracts.
    OverlapDetected,
    /// A candidate issue's body lacked declared change targets.
    MissingChangeTargets,
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ApprovalRequired => "approval_required",
            Self::ContractExpansion => "contract_expansion",
            Self::Blocker => "blocker",
            Self::SkillCandidate => "skill_candidate",
            Self::OverlapDetected => "overlap_detected",
            Self::MissingChangeTargets => "missing_change_targets",
        };
        f.write_str(s)
    }
}

impl DecisionKind {
    /// Short code used in generated decision filenames.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::ApprovalRequired => "AR",
            Self::ContractExpansion => "CE",
            Self::Blocker => "BL",
            Self::SkillCandidate => "SC",
            Self::OverlapDetected => "OV",
            Self::MissingChangeTargets => "MC",
        }
    }
}

/// Contract-expansion severity: `minor` unless a forbidden path is touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Requested files fall outside `allowed_files` but not inside
    /// `forbidden_files`.
    Minor,
    /// At least one requested file matches `forbidden_files`.
    Major,
}

/// The fixed option set offered for a `contract_expansion` decision,
/// carried byte-for-byte from the system this core was distilled from — a
/// wire-format literal, not UI text owned by this codebase.
pub const CONTRACT_EXPANSION_OPTIONS: [&str; 4] =
    ["拡張", "差し戻し", "Issue分割", "別Issueへ移動"];

/// A YAML record requesting human action (§3.2).
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Decision {
    /// Schema version.
    pub version: u32,
    /// The discriminator.
    #[serde(rename = "type")]
    pub kind: DecisionKind,
    /// UTC ISO-8601 creation timestamp.
    pub created_at: String,
    /// The issue this decision concerns, if any.
    #[serde(default)]
    pub issue: Option<u64>,
    /// Type-dependent payload.
    #[serde(default)]
    pub request: serde_yaml::Mapping,
}

fn mapping_from<const N: usize>(entries: [(&str, Value); N]) -> serde_yaml::Mapping {
    entries
        .into_iter()
        .map(|(k, v)| (Value::String(k.to_owned()), v))
        .collect()
}

fn str_seq(items: &[String]) -> Value {
    Value::Sequence(items.iter().map(|s| Value::String(s.clone())).collect())
}

impl Decision {
    /// Build an `approval_required` decision.
    #[must_use]
    pub fn approval_required(created_at: &str, issue: u64) -> Self {
        Self {
            version: 1,
            kind: DecisionKind::ApprovalRequired,
            created_at: created_at.to_owned(),
            issue: Some(issue),
            request: serde_yaml::Mapping::new(),
        }
    }

    /// Build a `contract_expansion` decision.
    #[must_use]
    pub fn contract_expansion(
        created_at: &str,
        issue: u64,
        requested_files: &[String],
        forbidden_files: &[String],
        severity: Severity,
    ) -> Self {
        let request = mapping_from([
            ("requested_files", str_seq(requested_files)),
            ("forbidden_files", str_seq(forbidden_files)),
            (
                "severity",
                Value::String(
                    (if severity == Severity::Major { "major" } else { "minor" }).to_owned(),
                ),
            ),
            (
                "options",
                str_seq(
                    &CONTRACT_EXPANSION_OPTIONS
                        .iter()
                        .map(|s| (*s).to_owned())
                        .collect::<Vec<_>>(),
                ),
            ),
        ]);
        Self {
            version: 1,
            kind: DecisionKind::ContractExpansion,
            created_at: created_at.to_owned(),
            issue: Some(issue),
            request,
        }
    }

    /// Build a `blocker` decision.
    #[must_use]
    pub fn blocker(created_at: &str, issue: u64, reason: &str) -> Self {
        let request = mapping_from([("reason", Value::String(reason.to_owned()))]);
        Self {
            version: 1,
            kind: DecisionKind::Blocker,
            created_at: created_at.to_owned(),
            issue: Some(issue),
            request,
        }
    }

    /// Build a `skill_candidate` decision.
    #[must_use]
    pub fn skill_candidate(
        created_at: &str,
        name: &str,
        summary: &str,
        workers: &[String],
        submitters: &[String],
    ) -> Self {
        let request = mapping_from([
            ("name", Value::String(name.to_owned())),
            ("summary", Value::String(summary.to_owned())),
            ("workers", str_seq(workers)),
            ("submitters", str_seq(submitters)),
        ]);
        Self {
            version: 1,
            kind: DecisionKind::SkillCandidate,
            created_at: created_at.to_owned(),
            issue: None,
            request,
        }
    }

    /// Build an `overlap_detected` decision.
    #[must_use]
    pub fn overlap_detected(created_at: &str, pairs: &[(u64, u64)], files: &[String]) -> Self {
        let pairs_value = Value::Sequence(
            pairs
                .iter()
                .map(|(a, b)| {
                    Value::Sequence(vec![
                        Value::Number((*a).into()),
                        Value::Number((*b).into()),
                    ])
                })
                .collect(),
        );
        let request = mapping_from([
            ("conflicting_pairs", pairs_value),
            ("files", str_seq(files)),
        ]);
        Self {
            version: 1,
            kind: DecisionKind::OverlapDetected,
            created_at: created_at.to_owned(),
            issue: None,
            request,
        }
    }

    /// Build a `missing_change_targets` decision.
    #[must_use]
    pub fn missing_change_targets(created_at: &str, issue: u64) -> Self {
        Self {
            version: 1,
            kind: DecisionKind::MissingChangeTargets,
            created_at: created_at.to_owned(),
            issue: Some(issue),
            request: serde_yaml::Mapping::new(),
        }
    }

    /// A deterministic, human-scannable filename stem for this decision
    /// (design notes §9: "timestamp-plus-counter" in place of the source's
    /// `created_at`-derived ids). `seq` disambiguates multiple decisions of
    /// the same kind produced within one collect run.
    #[must_use]
    pub fn suggested_filename(&self, seq: u32) -> String {
        let compact_ts: String = self
            .created_at
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        format!("DEC-{}-{compact_ts}-{seq:03}", self.kind.code())
    }

    /// Read a string field from `request`.
    #[must_use]
    pub fn request_str(&self, key: &str) -> Option<&str> {
        self.request.get(key)?.as_str()
    }

    /// Read a string-sequence field from `request`.
    #[must_use]
    pub fn request_str_seq(&self, key: &str) -> Vec<String> {
        self.request
            .get(key)
            .and_then(Value::as_sequence)
            .map(|seq| {
                seq.iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The stable semantic fingerprint used for de-duplication (§4.C step
    /// 4): `{type, issue, name-or-file-set}`. Two decisions with the same
    /// fingerprint are considered duplicates — the Collector must not
    /// create a second file once one is open.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let discriminant = match self.kind {
            DecisionKind::SkillCandidate => {
                self.request_str("name").unwrap_or_default().to_owned()
            }
            DecisionKind::ContractExpansion | DecisionKind::OverlapDetected => {
                let mut files = self.request_str_seq("requested_files");
                if files.is_empty() {
                    files = self.request_str_seq("files");
                }
                files.sort();
                files.join(",")
            }
            DecisionKind::ApprovalRequired
            | DecisionKind::Blocker
            | DecisionKind::MissingChangeTargets => String::new(),
        };
        match self.issue {
            Some(issue) => format!("{}:{issue}:{discriminant}", self.kind),
            None => format!("{}::{discriminant}", self.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_distinguishes_by_issue() {
        let a = Decision::blocker("2026-01-01T00:00:00Z", 1, "stuck");
        let b = Decision::blocker("2026-01-01T00:00:00Z", 2, "stuck");
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_identical_for_same_skill_name() {
        let a = Decision::skill_candidate(
            "2026-01-01T00:00:00Z",
            "retry-logic",
            "summary a",
            &["alice".to_owned()],
            &["alice".to_owned()],
        );
        let b = Decision::skill_candidate(
            "2026-01-02T00:00:00Z",
            "retry-logic",
            "different summary",
            &["bob".to_owned()],
            &["bob".to_owned()],
        );
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_differs_for_different_skill_name() {
        let a = Decision::skill_candidate(
            "2026-01-01T00:00:00Z",
            "retry-logic",
            "s",
            &[],
            &[],
        );
        let b = Decision::skill_candidate(
            "2026-01-01T00:00:00Z",
            "timeout-handling",
            "s",
            &[],
            &[],
        );
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_contract_expansion_stable_under_file_order() {
        let a = Decision::contract_expansion(
            "2026-01-01T00:00:00Z",
            5,
            &["b.rs".to_owned(), "a.rs".to_owned()],
            &[],
            Severity::Minor,
        );
        let b = Decision::contract_expansion(
            "2026-01-02T00:00:00Z",
            5,
            &["a.rs".to_owned(), "b.rs".to_owned()],
            &[],
            Severity::Major,
        );
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn contract_expansion_carries_fixed_options_literal() {
        let d = Decision::contract_expansion(
            "2026-01-01T00:00:00Z",
            1,
            &["a.rs".to_owned()],
            &[],
            Severity::Minor,
        );
        assert_eq!(
            d.request_str_seq("options"),
            CONTRACT_EXPANSION_OPTIONS
                .iter()
                .map(|s| (*s).to_owned())
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn yaml_round_trip_preserves_type_tag() {
        let d = Decision::skill_candidate(
            "2026-01-01T00:00:00Z",
            "name",
            "summary",
            &["alice".to_owned()],
            &["alice".to_owned()],
        );
        let yaml = serde_yaml::to_string(&d).unwrap();
        assert!(yaml.contains("type: skill_candidate"));
        let parsed: Decision = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, d);
    }

    #[test]
    fn suggested_filename_is_stable_and_kind_scoped() {
        let d = Decision::blocker("20260129T121501Z", 1, "stuck");
        assert_eq!(d.suggested_filename(1), "DEC-BL-20260129T121501Z-001");
    }

    #[test]
    fn decision_kind_display() {
        assert_eq!(
            format!("{}", DecisionKind::ContractExpansion),
            "contract_expansion"
        );
        assert_eq!(
            format!("{}", DecisionKind::MissingChangeTargets),
            "missing_change_targets"
        );
    }
}
