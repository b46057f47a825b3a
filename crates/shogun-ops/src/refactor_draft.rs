use anyhow::{bail, Context, Result};
use clap::Args;

use shogun_core::{refactor, Layout};

#[derive(Args)]
pub struct RefactorDraftArgs {
    /// Title of the proposed refactor.
    #[arg(long)]
    title: String,
    /// Worker id; defaults to `AGENTIC_SDD_WORKER` if omitted.
    #[arg(long)]
    worker: Option<String>,
    /// Filename timestamp; defaults to the current UTC time.
    #[arg(long)]
    timestamp: Option<String>,
    /// Summary of the proposed refactor, given as trailing words after `--`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    summary: Vec<String>,
}

pub fn run(args: &RefactorDraftArgs) -> Result<()> {
    let worker = args
        .worker
        .clone()
        .or_else(|| std::env::var("AGENTIC_SDD_WORKER").ok())
        .context("no worker id given: pass --worker or set AGENTIC_SDD_WORKER")?;

    let summary = args.summary.join(" ");
    if summary.is_empty() {
        bail!("a refactor summary is required after `--`");
    }

    let cwd = std::env::current_dir().context("could not determine current directory")?;
    let layout = Layout::materialize(&cwd)?;
    let timestamp = args
        .timestamp
        .clone()
        .unwrap_or_else(|| chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string());

    let path = refactor::produce(&layout, &worker, &timestamp, &args.title, &summary)?;
    println!("draft={}", path.display());
    Ok(())
}
