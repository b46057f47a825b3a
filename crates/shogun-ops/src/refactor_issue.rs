use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use shogun_core::gh::RealGh;
use shogun_core::{gitcmd, refactor, Layout};

#[derive(Args)]
pub struct RefactorIssueArgs {
    /// Path to the refactor draft to turn into a GitHub issue.
    #[arg(long)]
    draft: PathBuf,
    /// `owner/repo` to use instead of the `origin` remote.
    #[arg(long = "gh-repo")]
    gh_repo: Option<String>,
}

pub fn run(args: &RefactorIssueArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("could not determine current directory")?;
    let layout = Layout::materialize(&cwd)?;
    let repo = match &args.gh_repo {
        Some(repo) => repo.clone(),
        None => gitcmd::origin_owner_repo(&cwd)?,
    };

    let gh = RealGh;
    let url = refactor::create_issue_from_draft(&layout, &gh, &repo, &args.draft)?;
    println!("issue={url}");
    Ok(())
}
