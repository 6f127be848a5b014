//! Unattended roadmap execution loop.
//!
//! Reads `ROADMAP.md` (or the configured roadmap), works through open checklist
//! items one at a time, and records progress under `.autopilot/`.

use std::path::PathBuf;

use anyhow::Result;
use autopilot::exit_codes;
use autopilot::handlers::FsHandlers;
use autopilot::io::clock::SystemClock;
use autopilot::io::config::{ConfigOverrides, load_config};
use autopilot::io::git::Git;
use autopilot::io::init::{AutopilotPaths, InitOptions, init_autopilot};
use autopilot::io::notifier::notifier_from_command;
use autopilot::logging;
use autopilot::plan::{plan_from_root, render_plan};
use autopilot::scheduler::{Scheduler, StopSignal};
use clap::{Parser, Subcommand};
use tracing::warn;

#[derive(Parser)]
#[command(
    name = "autopilot",
    version,
    about = "Unattended execution loop for a Markdown roadmap"
)]
struct Cli {
    /// Project root containing the roadmap and `.autopilot/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    /// Config file (default: `<root>/.autopilot/config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Roadmap path relative to the root.
    #[arg(long, global = true)]
    roadmap: Option<PathBuf>,
    /// Seconds to wait after each active iteration.
    #[arg(long, global = true, value_name = "SECS")]
    cooldown: Option<u64>,
    /// Seconds between scans while idle.
    #[arg(long = "idle-scan", global = true, value_name = "SECS")]
    idle_scan: Option<u64>,
    /// Minimum seconds between idle heartbeats.
    #[arg(long, global = true, value_name = "SECS")]
    heartbeat: Option<u64>,
    /// Never create commits.
    #[arg(long = "no-commit", global = true)]
    no_commit: bool,
    /// Also work on items in future phases.
    #[arg(long = "include-future", global = true)]
    include_future: bool,
    /// Skip the day-boundary summary.
    #[arg(long = "no-nightly", global = true)]
    no_nightly: bool,
    /// Run a single iteration and exit.
    #[arg(long, global = true)]
    once: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the loop until `.autopilot/STOP` appears (default).
    Run,
    /// Print the actionable items in dispatch order without running anything.
    Plan,
    /// Write `.autopilot/config.toml` and an example roadmap if missing.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            roadmap: self.roadmap.clone(),
            cooldown_secs: self.cooldown,
            idle_scan_interval_secs: self.idle_scan,
            heartbeat_interval_secs: self.heartbeat,
            no_commit: self.no_commit,
            include_future: self.include_future,
            no_nightly: self.no_nightly,
        }
    }
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let paths = AutopilotPaths::new(&cli.root);
    match cli.command {
        Some(Command::Init { force }) => cmd_init(&paths, force),
        Some(Command::Plan) => cmd_plan(&cli, &paths),
        Some(Command::Run) | None => cmd_run(&cli, &paths),
    }
}

fn cmd_init(paths: &AutopilotPaths, force: bool) -> Result<i32> {
    let paths = init_autopilot(&paths.root, &InitOptions { force })?;
    println!("initialized {}", paths.state_dir.display());
    Ok(exit_codes::OK)
}

fn cmd_plan(cli: &Cli, paths: &AutopilotPaths) -> Result<i32> {
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_path.clone());
    let cfg = load_config(&config_path, &cli.overrides())?;
    let planned = plan_from_root(paths, &cfg)?;
    if planned.is_empty() {
        println!("nothing actionable");
        return Ok(exit_codes::IDLE);
    }
    print!("{}", render_plan(&planned));
    Ok(exit_codes::OK)
}

fn cmd_run(cli: &Cli, paths: &AutopilotPaths) -> Result<i32> {
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_path.clone());
    let cfg = load_config(&config_path, &cli.overrides())?;

    let git = Git::new(&paths.root);
    if cfg.scheduler.auto_commit && !git.is_repo() {
        warn!(root = %paths.root.display(), "not a git repository, commits will fail");
    }
    let handlers = FsHandlers::new(&paths.root, &cfg);
    let notifier = notifier_from_command(&cfg.notify.command);
    let stop = StopSignal::with_sentinel(&paths.stop_path);
    let mut scheduler = Scheduler::new(&cfg, paths, handlers, notifier, git, SystemClock, stop);

    if cli.once {
        let tick = scheduler.tick();
        println!("{tick}");
    } else {
        scheduler.run();
    }
    Ok(exit_codes::OK)
}
