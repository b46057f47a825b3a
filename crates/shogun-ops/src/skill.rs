use anyhow::{Context, Result};
use clap::Args;

use shogun_core::{approval, gitcmd, Layout};

#[derive(Args)]
pub struct SkillArgs {
    /// The id of the pending `skill_candidate` decision to approve.
    #[arg(long)]
    approve: String,
}

pub fn run(args: &SkillArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("could not determine current directory")?;
    let layout = Layout::materialize(&cwd)?;
    let repo_root = gitcmd::toplevel(&cwd)?;

    let path = approval::approve_skill(&layout, &repo_root, &args.approve)?;
    println!("skill={}", path.display());
    Ok(())
}
