use anyhow::{bail, Context, Result};
use clap::Args;

use shogun_core::gh::RealGh;
use shogun_core::{gitcmd, supervisor, Layout};

#[derive(Args)]
pub struct SuperviseArgs {
    /// Run one supervision pass and exit; the only mode currently supported.
    #[arg(long)]
    once: bool,
    /// Restrict supervision to these issue numbers, comma-separated.
    #[arg(long, value_delimiter = ',')]
    targets: Vec<u64>,
    /// `owner/repo` to use instead of the `origin` remote.
    #[arg(long = "gh-repo")]
    gh_repo: Option<String>,
}

pub fn run(args: &SuperviseArgs) -> Result<()> {
    if !args.once {
        bail!("supervise currently requires --once");
    }

    let cwd = std::env::current_dir().context("could not determine current directory")?;
    let layout = Layout::materialize(&cwd)?;
    let config = layout.load_config()?;
    let repo_root = gitcmd::toplevel(&cwd)?;
    let repo = match &args.gh_repo {
        Some(repo) => repo.clone(),
        None => gitcmd::origin_owner_repo(&cwd)?,
    };

    let gh = RealGh;
    let created_at = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let targets = if args.targets.is_empty() {
        None
    } else {
        Some(args.targets.as_slice())
    };

    let report = supervisor::run(&layout, &config, &repo_root, &gh, &repo, targets, &created_at)?;

    println!("orders={}", report.orders.len());
    for order in &report.orders {
        println!("order={}", order.display());
    }
    for id in &report.decisions {
        println!("decision={id}");
    }
    Ok(())
}
