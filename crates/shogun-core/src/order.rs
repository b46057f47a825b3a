//! Order entity: a per-worker assignment emitted by the Supervisor (§3.2,
//! §4.D step 7).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ImplMode;
use crate::error::OpsError;
use crate::layout::Layout;

/// A per-worker assignment.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Order {
    /// Schema version.
    pub version: u32,
    /// The assigned issue.
    pub issue: u64,
    /// The assigned worker.
    pub worker: String,
    /// Implementation mode.
    pub impl_mode: ImplMode,
    /// Steps the worker must carry out, in order. Always contains exactly
    /// one of `/tdd`/`/impl` (matching `impl_mode`) plus `/create-pr` and
    /// `/cleanup`.
    pub required_steps: Vec<String>,
    /// Files the worker may touch.
    #[serde(default)]
    pub allowed_files: Vec<String>,
    /// Files the worker must never touch, even if allowed by glob.
    #[serde(default)]
    pub forbidden_files: Vec<String>,
    /// Base branch to fork from, if not the repository default.
    #[serde(default)]
    pub base_branch: Option<String>,
    /// UTC ISO-8601 creation timestamp.
    pub created_at: String,
}

/// An order failed validation — §3.2's `required_steps` invariant.
#[derive(Debug, Error)]
pub enum OrderValidationError {
    /// Neither or both of `/tdd`/`/impl` were present.
    #[error("required_steps must contain exactly one of /tdd or /impl")]
    ModeStepMissingOrDuplicated,
    /// `/create-pr` was missing.
    #[error("required_steps must contain /create-pr")]
    MissingCreatePr,
    /// `/cleanup` was missing.
    #[error("required_steps must contain /cleanup")]
    MissingCleanup,
}

impl Order {
    /// Build an order with the canonical step sequence for `impl_mode`:
    /// the mode step, then `/create-pr`, then `/cleanup`.
    #[must_use]
    pub fn new(
        issue: u64,
        worker: &str,
        impl_mode: ImplMode,
        created_at: &str,
        allowed_files: Vec<String>,
        forbidden_files: Vec<String>,
        base_branch: Option<String>,
    ) -> Self {
        let mode_step = match impl_mode {
            ImplMode::Impl => "/impl",
            ImplMode::Tdd => "/tdd",
        };
        Self {
            version: 1,
            issue,
            worker: worker.to_owned(),
            impl_mode,
            required_steps: vec![mode_step.to_owned(), "/create-pr".to_owned(), "/cleanup".to_owned()],
            allowed_files,
            forbidden_files,
            base_branch,
            created_at: created_at.to_owned(),
        }
    }

    /// Validate the `required_steps` invariant from §3.2.
    ///
    /// # Errors
    /// Returns an [`OrderValidationError`] describing the first violation.
    pub fn validate(&self) -> Result<(), OrderValidationError> {
        let has_tdd = self.required_steps.iter().any(|s| s == "/tdd");
        let has_impl = self.required_steps.iter().any(|s| s == "/impl");
        if has_tdd == has_impl {
            return Err(OrderValidationError::ModeStepMissingOrDuplicated);
        }
        if !self.required_steps.iter().any(|s| s == "/create-pr") {
            return Err(OrderValidationError::MissingCreatePr);
        }
        if !self.required_steps.iter().any(|s| s == "/cleanup") {
            return Err(OrderValidationError::MissingCleanup);
        }
        Ok(())
    }
}

/// Write an order to `queue/orders/<worker>/<timestamp>.yaml`. Unlike a
/// check-in, a colliding filename does not fail the caller — it is retried
/// at `<timestamp>-NNN.yaml` (§3.2, §4.D step 7).
///
/// # Errors
/// Returns an error if `order` fails validation, or an I/O error if the
/// write fails.
pub fn produce(layout: &Layout, order: &Order, timestamp: &str) -> Result<PathBuf, OpsError> {
    order.validate().map_err(|e| OpsError::InvalidField {
        path: layout.order_queue_dir(&order.worker),
        field: "required_steps",
        value: order.required_steps.join(","),
        reason: e.to_string(),
    })?;

    let dir = layout.order_queue_dir(&order.worker);
    let dest = dir.join(format!("{timestamp}.yaml"));
    let scratch = dir.join(format!(".{timestamp}.yaml.scratch"));

    let yaml = serde_yaml::to_string(order).map_err(|e| OpsError::CorruptFile {
        path: dest.clone(),
        detail: e.to_string(),
    })?;
    crate::atomic::write_atomic(&scratch, yaml.as_bytes())?;
    let written = crate::atomic::rename_with_collision_suffix(&scratch, &dest)?;
    Ok(written)
}

/// Read an order back from disk, for tests and tooling that inspect the
/// orders queue.
///
/// # Errors
/// Returns [`OpsError::CorruptFile`] if the YAML cannot be parsed.
pub fn read(path: &Path) -> Result<Order, OpsError> {
    let raw = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&raw).map_err(|e| OpsError::CorruptFile {
        path: path.to_owned(),
        detail: e.to_string(),
    })
}
