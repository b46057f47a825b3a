//! Coordination configuration (`config.yaml`).
//!
//! Defines the typed configuration loaded from `OPS_ROOT/config.yaml`:
//! parallelism policy, implementation-mode policy, and the worker roster.
//! Missing file → all defaults (a default single-worker config is what the
//! Layout module writes on first invocation, not what this loader assumes).

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ids::WorkerId;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level coordination configuration.
///
/// Parsed from `config.yaml`. Unknown top-level keys are rejected; unknown
/// keys inside a recognized `policy.*` subtree are preserved and reported as
/// warnings rather than rejected (§3.2).
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpsConfig {
    /// Supervisor and checkin policy.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// The worker roster.
    #[serde(default)]
    pub workers: Vec<WorkerEntry>,
}

/// A single configured worker.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerEntry {
    /// Worker identifier; must match `^[A-Za-z0-9._-]{1,64}$`.
    pub id: String,
}

// ---------------------------------------------------------------------------
// PolicyConfig
// ---------------------------------------------------------------------------

/// `policy.*` settings. Keys directly under `policy` are a closed set —
/// an unrecognized key here is a hard error, not a warning.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// `policy.parallel.*`.
    #[serde(default)]
    pub parallel: ParallelConfig,

    /// `policy.impl_mode.*`.
    #[serde(default)]
    pub impl_mode: ImplModeConfig,

    /// `policy.checkin.*`.
    #[serde(default)]
    pub checkin: CheckinPolicyConfig,
}

/// `policy.parallel.*` settings.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ParallelConfig {
    /// When `false`, `supervise` emits at most one order per run.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Upper bound on concurrent assignments.
    #[serde(default = "default_max_workers")]
    pub max_workers: u32,

    /// When `true`, candidate issues must carry the `parallel-ok` label.
    #[serde(default)]
    pub require_parallel_ok_label: bool,

    /// Unrecognized keys found inside this subtree, preserved for
    /// round-tripping and surfaced as warnings rather than rejected.
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_workers: default_max_workers(),
            require_parallel_ok_label: false,
            extra: serde_yaml::Mapping::new(),
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_max_workers() -> u32 {
    1
}

/// `policy.impl_mode.*` settings.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ImplModeConfig {
    /// Default implementation mode when no force label matches.
    #[serde(default)]
    pub default: ImplMode,

    /// Labels (case-insensitive) that force `impl_mode=tdd`.
    #[serde(default)]
    pub force_tdd_labels: Vec<String>,

    /// Unrecognized keys found inside this subtree.
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

impl Default for ImplModeConfig {
    fn default() -> Self {
        Self {
            default: ImplMode::default(),
            force_tdd_labels: Vec::new(),
            extra: serde_yaml::Mapping::new(),
        }
    }
}

/// The implementation mode assigned to an order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImplMode {
    /// Direct implementation; an order's `required_steps` includes `/impl`.
    #[default]
    Impl,
    /// Test-driven development; an order's `required_steps` includes `/tdd`.
    Tdd,
}

impl fmt::Display for ImplMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Impl => write!(f, "impl"),
            Self::Tdd => write!(f, "tdd"),
        }
    }
}

/// `policy.checkin.*` settings.
///
/// Informational only: enforced by producers (the outer workflow), not by
/// the Collector.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CheckinPolicyConfig {
    /// Whether a check-in is expected whenever `phase` changes.
    #[serde(default)]
    pub required_on_phase_change: bool,

    /// Unrecognized keys found inside this subtree.
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

impl Default for CheckinPolicyConfig {
    fn default() -> Self {
        Self {
            required_on_phase_change: false,
            extra: serde_yaml::Mapping::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validated worker roster
// ---------------------------------------------------------------------------

impl OpsConfig {
    /// Return the validated worker roster.
    ///
    /// # Errors
    /// Returns a [`crate::ids::ValidationError`] if any `workers[].id` fails
    /// `WorkerId` validation.
    pub fn worker_ids(&self) -> Result<Vec<WorkerId>, crate::ids::ValidationError> {
        self.workers.iter().map(|w| WorkerId::new(&w.id)).collect()
    }

    /// Collect warnings for unrecognized keys inside recognized `policy.*`
    /// subtrees. These keys are preserved (not dropped), only reported.
    #[must_use]
    pub fn subtree_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        warn_extra(&mut warnings, "policy.parallel", &self.policy.parallel.extra);
        warn_extra(&mut warnings, "policy.impl_mode", &self.policy.impl_mode.extra);
        warn_extra(&mut warnings, "policy.checkin", &self.policy.checkin.extra);
        warnings
    }
}

fn warn_extra(warnings: &mut Vec<String>, subtree: &str, extra: &serde_yaml::Mapping) {
    for key in extra.keys() {
        let key_str = key.as_str().unwrap_or("<non-string key>");
        warnings.push(format!(
            "config warning: unrecognized key '{key_str}' in {subtree} (preserved)"
        ));
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a coordination configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded, if available.
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl OpsConfig {
    /// Load configuration from a YAML file.
    ///
    /// - If the file does not exist, returns all defaults (not an error) —
    ///   callers that need a materialized `config.yaml` should use
    ///   [`crate::layout`] to write the skeleton first.
    /// - If the file exists but contains invalid YAML, an unknown top-level
    ///   key, or an unknown key directly under `policy`, returns a
    ///   [`ConfigError`] with line-level detail where `serde_yaml` provides
    ///   a location.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse
    /// errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid YAML or an unknown key at a
    /// `deny_unknown_fields` boundary.
    pub fn parse(yaml_str: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml_str).map_err(|e| {
            let mut message = e.to_string();
            if let Some(loc) = e.location() {
                message = format!("line {}: {message}", loc.line());
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }

    /// Serialize to the canonical YAML form written by the Layout module.
    ///
    /// # Errors
    /// Returns a [`serde_yaml::Error`] only on a type that cannot be
    /// represented in YAML, which cannot happen for this struct.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// The default configuration written on first invocation: a single
    /// worker named `worker1`, parallel disabled, impl mode `impl`.
    #[must_use]
    pub fn default_skeleton() -> Self {
        Self {
            policy: PolicyConfig {
                parallel: ParallelConfig {
                    enabled: false,
                    max_workers: 1,
                    require_parallel_ok_label: false,
                    extra: serde_yaml::Mapping::new(),
                },
                impl_mode: ImplModeConfig::default(),
                checkin: CheckinPolicyConfig::default(),
            },
            workers: vec![WorkerEntry {
                id: "worker1".to_owned(),
            }],
        }
    }
}
