use anyhow::{Context, Result, bail};
use clap::Args;

use shogun_core::checkin::{self, CheckInInput, Phase, SkillCandidate, TestsResult};
use shogun_core::{gitcmd, Layout};

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum PhaseArg {
    Backlog,
    Estimating,
    Implementing,
    Reviewing,
    Blocked,
    Done,
}

impl From<PhaseArg> for Phase {
    fn from(p: PhaseArg) -> Self {
        match p {
            PhaseArg::Backlog => Self::Backlog,
            PhaseArg::Estimating => Self::Estimating,
            PhaseArg::Implementing => Self::Implementing,
            PhaseArg::Reviewing => Self::Reviewing,
            PhaseArg::Blocked => Self::Blocked,
            PhaseArg::Done => Self::Done,
        }
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum TestsResultArg {
    Pass,
    Fail,
    Skip,
    NotRun,
}

impl From<TestsResultArg> for TestsResult {
    fn from(t: TestsResultArg) -> Self {
        match t {
            TestsResultArg::Pass => Self::Pass,
            TestsResultArg::Fail => Self::Fail,
            TestsResultArg::Skip => Self::Skip,
            TestsResultArg::NotRun => Self::NotRun,
        }
    }
}

#[derive(Args)]
pub struct CheckinArgs {
    /// The GitHub issue number this check-in concerns.
    issue: u64,
    /// The reported phase.
    #[arg(value_enum)]
    phase: PhaseArg,
    /// Progress percentage, 0-100.
    percent: u8,
    /// One-line summary, given as trailing words after `--`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    summary: Vec<String>,

    /// Worker id; defaults to `AGENTIC_SDD_WORKER` if omitted.
    #[arg(long)]
    worker: Option<String>,
    /// Filename timestamp; defaults to the current UTC time.
    #[arg(long)]
    timestamp: Option<String>,
    /// Compute `files_changed` from staged changes instead of the worktree diff.
    #[arg(long)]
    include_staged: bool,
    /// Explicit comma-separated list of changed files, overriding auto-detection.
    #[arg(long = "files-changed", value_delimiter = ',')]
    files_changed: Vec<String>,
    /// Skip auto-detecting `files_changed` from `git diff` entirely.
    #[arg(long)]
    no_auto_files_changed: bool,
    /// The test command run, if any.
    #[arg(long)]
    tests_command: Option<String>,
    /// The test outcome, if a command was run.
    #[arg(long, value_enum)]
    tests_result: Option<TestsResultArg>,
    /// Request human approval before proceeding.
    #[arg(long)]
    needs_approval: bool,
    /// A repo-relative path to request adding to this issue's contract; repeatable.
    #[arg(long = "request-file")]
    request_file: Vec<String>,
    /// Free-text description of a blocker.
    #[arg(long)]
    blocker: Option<String>,
    /// Proposed new reusable skill's name; requires `--skill-summary`.
    #[arg(long, requires = "skill_summary")]
    skill_candidate: Option<String>,
    /// One-line summary of the proposed skill; requires `--skill-candidate`.
    #[arg(long, requires = "skill_candidate")]
    skill_summary: Option<String>,
    /// The decision id this check-in responds to, recorded as a next step.
    #[arg(long)]
    respond_to_decision: Option<String>,
}

pub fn run(args: &CheckinArgs) -> Result<()> {
    let worker = args
        .worker
        .clone()
        .or_else(|| std::env::var("AGENTIC_SDD_WORKER").ok())
        .context("no worker id given: pass --worker or set AGENTIC_SDD_WORKER")?;

    let summary = args.summary.join(" ");
    if summary.is_empty() {
        bail!("a check-in summary is required after `--`");
    }

    let cwd = std::env::current_dir().context("could not determine current directory")?;
    let layout = Layout::materialize(&cwd)?;
    let toplevel = gitcmd::toplevel(&cwd)?;

    let timestamp = args
        .timestamp
        .clone()
        .unwrap_or_else(|| chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string());

    let files_changed = if !args.files_changed.is_empty() {
        args.files_changed.clone()
    } else if args.no_auto_files_changed {
        Vec::new()
    } else {
        let extra: &[&str] = if args.include_staged { &["--staged"] } else { &[] };
        gitcmd::diff_name_only(&cwd, extra)?
    };

    let skill_candidates = match (&args.skill_candidate, &args.skill_summary) {
        (Some(name), Some(summary)) => vec![SkillCandidate {
            name: name.clone(),
            summary: summary.clone(),
        }],
        _ => Vec::new(),
    };

    let mut next = Vec::new();
    if let Some(id) = &args.respond_to_decision {
        next.push(format!("responds to {id}"));
    }

    let input = CheckInInput {
        worker,
        timestamp,
        issue: args.issue,
        phase: args.phase.into(),
        progress_percent: args.percent,
        summary,
        worktree_root: cwd.clone(),
        toplevel,
        files_changed,
        tests_command: args.tests_command.clone(),
        tests_result: args.tests_result.map(Into::into),
        needs_approval: args.needs_approval,
        requested_files: args.request_file.clone(),
        blocker: args.blocker.clone().unwrap_or_default(),
        skill_candidates,
        next,
    };

    let path = checkin::produce(&layout, input)?;
    println!("checkin={}", path.display());
    Ok(())
}
