use anyhow::{Context, Result};

use shogun_core::{collector, Layout};

pub fn run() -> Result<()> {
    let cwd = std::env::current_dir().context("could not determine current directory")?;
    let layout = Layout::materialize(&cwd)?;

    let report = collector::collect(&layout)?;
    println!("processed={}", report.processed);
    println!("decisions={}", report.decisions_created.len());
    for id in &report.decisions_created {
        println!("decision={id}");
    }
    Ok(())
}
