mod activity;
mod config;
mod idle;
mod monitor;
mod sampler;
mod shutdown;
mod signals;
mod state;
mod status;
mod steam;
mod tailer;

use activity::Markers;
use clap::Parser;
use config::BankfireConfig;
use monitor::{Monitor, MonitorSettings, Outcome};
use shutdown::ShutdownCommand;
use status::StatusTracker;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use steam::Targets;
use tracing_subscriber::EnvFilter;

/// Watch Steam's download activity and run a shutdown command once it has
/// been quiet for long enough.
#[derive(Parser, Debug)]
#[command(name = "bankfire", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "bankfire.toml")]
    config: PathBuf,

    /// How long Steam must be idle before shutting down, in seconds
    #[arg(long, value_name = "SECS")]
    quiet: Option<u64>,

    /// How often to poll Steam activity, in seconds
    #[arg(long, value_name = "SECS")]
    check: Option<u64>,

    /// Override Steam install path (defaults to common locations)
    #[arg(long, value_name = "DIR")]
    steam_path: Option<PathBuf>,

    /// Command to run when downloads are finished
    #[arg(long, value_name = "CMD")]
    shutdown: Option<String>,

    /// Log instead of shutting down
    #[arg(long)]
    dry_run: bool,

    /// Write a JSON status file on every state report
    #[arg(long, value_name = "PATH")]
    status_file: Option<PathBuf>,

    /// Extra logging (per-tick sampling, log scans)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Merge command-line overrides into the loaded config.
    fn apply(&self, cfg: &mut BankfireConfig) {
        if let Some(quiet) = self.quiet {
            cfg.monitor.quiet_secs = quiet;
        }
        if let Some(check) = self.check {
            cfg.monitor.check_secs = check;
        }
        if let Some(path) = &self.steam_path {
            cfg.steam.path = Some(path.clone());
        }
        if let Some(command) = &self.shutdown {
            cfg.shutdown.command = command.clone();
        }
        if self.dry_run {
            cfg.shutdown.dry_run = true;
        }
        if let Some(path) = &self.status_file {
            cfg.status.file = Some(path.clone());
        }
    }
}

fn warning_for_euid(is_root: bool) -> Option<&'static str> {
    if is_root {
        None
    } else {
        Some("running without sudo; shutdown may fail unless passwordless shutdown is configured")
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "bankfire=debug"
    } else {
        "bankfire=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

/// Resolve everything the monitor needs. Any error here is fatal: polling never starts.
fn build_monitor(cli: &Cli) -> Result<Monitor, Box<dyn std::error::Error>> {
    let mut cfg = BankfireConfig::load(&cli.config)?;
    cli.apply(&mut cfg);
    cfg.validate()?;
    tracing::debug!(?cfg, "resolved configuration");

    let command = ShutdownCommand::parse(&cfg.shutdown.command)?;
    let markers = Markers::new(&cfg.markers.patterns);

    let root = steam::resolve_root(cfg.steam.path.as_deref())?;
    let targets = Targets::discover(
        root,
        cfg.steam.content_log.clone(),
        cfg.steam.extra_dirs.clone(),
    );

    let settings = MonitorSettings {
        quiet_period: Duration::from_secs(cfg.monitor.quiet_secs),
        check_period: Duration::from_secs(cfg.monitor.check_secs),
        heartbeat: Duration::from_secs(cfg.monitor.heartbeat_secs),
        dry_run: cfg.shutdown.dry_run,
    };

    tracing::info!(root = %targets.root.display(), "monitoring Steam");
    tracing::info!(path = %targets.content_log.display(), "tailing content log");
    for (kind, dir) in targets.directories() {
        tracing::info!(kind, path = %dir.display(), "watching directory");
    }
    tracing::info!(
        quiet_secs = cfg.monitor.quiet_secs,
        check_secs = cfg.monitor.check_secs,
        shutdown = %command,
        dry_run = settings.dry_run,
        markers = markers.len(),
        "options"
    );

    let status = cfg
        .status
        .file
        .map(|path| StatusTracker::new(path, settings.quiet_period));

    Ok(Monitor::new(targets, markers, settings, command, status))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    tracing::info!("bankfire v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::debug!(?cli, "parsed CLI arguments");

    if let Some(warning) = warning_for_euid(nix::unistd::geteuid().is_root()) {
        tracing::warn!("{warning}");
    }

    let mut monitor = match build_monitor(&cli) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            return ExitCode::FAILURE;
        }
    };

    let outcome = monitor.run(signals::wait_for_shutdown_signal()).await;
    if let Outcome::Fatal(e) = &outcome {
        tracing::error!(error = %e, "exiting after failed shutdown action");
    }
    exit_code(&outcome)
}

fn exit_code(outcome: &Outcome) -> ExitCode {
    if outcome.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
