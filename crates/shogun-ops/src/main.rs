use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod checkin;
mod collect;
mod refactor_draft;
mod refactor_issue;
mod skill;
mod status;
mod supervise;

/// Command-line front end for the Shogun Ops coordination core.
///
/// Every subcommand resolves OPS_ROOT from the current Git working tree and
/// prints exactly one line to stderr on failure.
#[derive(Parser)]
#[command(name = "shogun-ops")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize OPS_ROOT if absent and print dashboard.md
    Status,

    /// Append a check-in to the queue
    Checkin(checkin::CheckinArgs),

    /// Fold queued check-ins into state.yaml and dashboard.md
    Collect,

    /// Assign non-overlapping work to idle workers
    Supervise(supervise::SuperviseArgs),

    /// Approve a pending skill_candidate decision
    Skill(skill::SkillArgs),

    /// Append a refactor draft to the queue
    #[command(name = "refactor-draft")]
    RefactorDraft(refactor_draft::RefactorDraftArgs),

    /// Turn a refactor draft into a GitHub issue
    #[command(name = "refactor-issue")]
    RefactorIssue(refactor_issue::RefactorIssueArgs),
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

    let (result, failure_code): (Result<()>, u8) = match &cli.command {
        Commands::Status => (status::run(), 1),
        Commands::Checkin(args) => (checkin::run(args), 2),
        Commands::Collect => (collect::run(), 2),
        Commands::Supervise(args) => (supervise::run(args), 1),
        Commands::Skill(args) => (skill::run(args), 2),
        Commands::RefactorDraft(args) => (refactor_draft::run(args), 2),
        Commands::RefactorIssue(args) => (refactor_issue::run(args), 1),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(failure_code)
        }
    }
}
