use std::io::{BufRead, BufReader};
use std::process::{Command, ExitCode, Stdio};

use anyhow::{Context, Result};
use clap::Parser;

use shogun_core::watcher::{self, EventTool};
use shogun_core::Layout;

/// Watch the check-in queue for filesystem events and retry `collect` on a
/// fixed backoff schedule until it empties (§4.F).
#[derive(Parser)]
#[command(name = "shogun-watcher")]
#[command(version, about)]
struct Cli {
    /// Print what would be watched and run without spawning the event tool
    /// or invoking collect.
    #[arg(long)]
    dry_run: bool,
    /// Exit after the first event that triggers a successful collect.
    #[arg(long)]
    once: bool,
    /// Internal: re-invoked by `watchexec` for each triggering event
    /// instead of being read from a watch subprocess's stdout.
    #[arg(long, hide = true)]
    run_collect: bool,
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
    let layout = Layout::materialize(&cwd)?;

    if cli.run_collect {
        trigger_collect(&layout, cli.dry_run)?;
        return Ok(());
    }

    let tool = watcher::detect_event_tool()?;
    let watch_target = layout.checkin_queue_dir("");
    let watch_target = watch_target
        .parent()
        .unwrap_or(&watch_target)
        .to_path_buf();

    if cli.dry_run {
        println!("watch-tool={}", tool_name(tool));
        println!("watch-target={}", watch_target.display());
        return Ok(());
    }

    if tool == EventTool::Watchexec {
        return run_watchexec(&watch_target, cli.once);
    }

    run_stream_watch(tool, &watch_target, &layout, cli.once)
}

fn tool_name(tool: EventTool) -> &'static str {
    match tool {
        EventTool::Fswatch => "fswatch",
        EventTool::Watchexec => "watchexec",
        EventTool::Inotifywait => "inotifywait",
    }
}

fn trigger_collect(layout: &Layout, dry_run: bool) -> Result<()> {
    if dry_run {
        println!("would run collect with backoff");
        return Ok(());
    }
    let attempts = watcher::run_collect_with_backoff(layout, |secs| {
        std::thread::sleep(std::time::Duration::from_secs_f64(secs));
    })?;
    if let Some(last) = attempts.last() {
        println!("processed={}", last.processed);
    }
    Ok(())
}

/// `watchexec` re-invokes this binary with `--run-collect` for every
/// triggering event, so the main loop here just spawns it and waits.
fn run_watchexec(watch_target: &std::path::Path, once: bool) -> Result<()> {
    let self_exe = std::env::current_exe().context("could not determine current executable")?;
    let mut cmd = Command::new("watchexec");
    cmd.arg("--watch")
        .arg(watch_target)
        .arg("--")
        .arg(&self_exe)
        .arg("--run-collect");
    if once {
        cmd.arg("--once");
    }
    let status = cmd.status().context("failed to spawn watchexec")?;
    if !status.success() {
        anyhow::bail!("watchexec exited with {status}");
    }
    Ok(())
}

/// `fswatch`/`inotifywait` are read as a stream of one event per line; each
/// line triggers a backoff-retried collect.
fn run_stream_watch(
    tool: EventTool,
    watch_target: &std::path::Path,
    layout: &Layout,
    once: bool,
) -> Result<()> {
    let mut cmd = match tool {
        EventTool::Fswatch => {
            let mut c = Command::new("fswatch");
            c.arg(watch_target);
            c
        }
        EventTool::Inotifywait => {
            let mut c = Command::new("inotifywait");
            c.args(["-m", "-r", "-e", "create,modify,close_write"])
                .arg(watch_target);
            c
        }
        EventTool::Watchexec => unreachable!("handled by run_watchexec"),
    };

    let mut child = cmd
        .stdout(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn {}", tool_name(tool)))?;
    let stdout = child.stdout.take().context("watch subprocess had no stdout")?;
    let reader = BufReader::new(stdout);

    for line in reader.lines() {
        let _event = line.context("failed to read watch subprocess output")?;
        let attempts = watcher::run_collect_with_backoff(layout, |secs| {
            std::thread::sleep(std::time::Duration::from_secs_f64(secs));
        })?;
        if let Some(last) = attempts.last() {
            println!("processed={}", last.processed);
        }
        if once {
            let _ = child.kill();
            break;
        }
    }
    Ok(())
}
