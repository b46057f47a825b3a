use anyhow::{Context, Result};
use shogun_core::Layout;

/// Materialize OPS_ROOT if this is the first invocation in this repository,
/// then print `dashboard.md`.
pub fn run() -> Result<()> {
    let cwd = std::env::current_dir().context("could not determine current directory")?;
    let layout = Layout::materialize(&cwd)?;

    match std::fs::read_to_string(layout.dashboard_path()) {
        Ok(contents) => print!("{contents}"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("# Agentic-SDD Ops Dashboard\n\nNo collect has run yet; run `shogun-ops collect`.");
        }
        Err(e) => return Err(e).context("could not read dashboard.md"),
    }
    Ok(())
}
