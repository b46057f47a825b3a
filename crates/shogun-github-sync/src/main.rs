use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;

use shogun_core::gh::RealGh;
use shogun_core::state::State;
use shogun_core::{gitcmd, sync, Layout};

/// Sync one GitHub issue's `ops-phase:*`/`ops-blocked` labels and status
/// comment to match `state.yaml` (§4.G).
#[derive(Parser)]
#[command(name = "shogun-github-sync")]
#[command(version, about)]
struct Cli {
    /// The issue number to sync.
    #[arg(long)]
    issue: u64,
    /// `owner/repo` to use instead of the `origin` remote.
    #[arg(long)]
    repo: Option<String>,
    /// Compute and print the comment digest without calling `gh`.
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("could not determine current directory")?;
    let layout = Layout::resolve(&cwd)?;
    let repo = match &cli.repo {
        Some(repo) => repo.clone(),
        None => gitcmd::origin_owner_repo(&cwd)?,
    };

    let state = State::load(&layout.state_path())?;
    let issue_state = state
        .issues
        .get(&cli.issue.to_string())
        .with_context(|| format!("issue #{} has no folded state; run collect first", cli.issue))?;
    let blocked_reason = state
        .blocked
        .iter()
        .find(|b| b.issue == cli.issue)
        .map(|b| b.reason.as_str());
    let blocked = blocked_reason.is_some();

    let gh = RealGh;
    let report = sync::sync_issue(&gh, &repo, cli.issue, issue_state, blocked, blocked_reason, cli.dry_run)?;

    if let Some(digest) = report.dry_run_body_sha256 {
        println!("dry-run=true");
        println!(
            "assigned={}",
            issue_state.assigned_to.as_deref().unwrap_or("(unassigned)")
        );
        println!("blocked={blocked}");
        if let Some(reason) = blocked_reason {
            println!("blocked-reason={reason}");
        }
        println!(
            "last-checkin={}",
            issue_state
                .last_checkin
                .as_ref()
                .map_or_else(|| "(none)".to_owned(), |lc| lc.summary.clone())
        );
        println!("comment-sha256={digest}");
    } else if !report.comment_posted {
        bail!("sync did not post a comment");
    } else {
        println!("synced=true");
    }
    Ok(())
}
