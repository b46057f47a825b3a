//! Coordination core for Shogun Ops.
//!
//! This crate holds every component's domain logic — layout and config
//! (A), the Check-in Producer (B), the Collector (C), the Supervisor (D),
//! the Decision/Approval Pipeline (E), the Watcher's retry schedule (F),
//! and the GitHub-Sync Adapter's derivation logic (G) — independent of any
//! CLI binary. `shogun-ops`, `shogun-watcher`, and `shogun-github-sync` are
//! thin `clap` front ends over these modules.

pub mod approval;
pub mod atomic;
pub mod checkin;
pub mod collector;
pub mod config;
pub mod dashboard;
pub mod decision;
pub mod error;
pub mod gh;
pub mod gitcmd;
pub mod glob;
pub mod ids;
pub mod layout;
pub mod order;
pub mod overlap;
pub mod refactor;
pub mod state;
pub mod supervisor;
pub mod sync;
pub mod watcher;

pub use error::OpsError;
pub use layout::Layout;
