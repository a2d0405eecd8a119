//! playwardend - The playwarden background service
//!
//! This is the main entry point for the playwarden service.
//! It wires together all the components:
//! - Configuration loading
//! - Process registry (Linux)
//! - Supervisor (sampler, usage ledger, enforcement loop)
//! - Signal handling and periodic usage reports

mod report;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use playwarden_config::{Policy, load_config, write_default_config};
use playwarden_core::{CoreEvent, Supervisor};
use playwarden_host_api::StopMode;
use playwarden_host_linux::SystemRegistry;
use playwarden_store::{FileLedger, Ledger};
use playwarden_util::{
    PLAYWARDEN_DATA_DIR_ENV, default_config_path, is_mock_time_active, unix_now,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::report::UsageReport;

/// playwardend - Rolling weekly playtime budget enforcement
#[derive(Parser, Debug)]
#[command(name = "playwardend")]
#[command(about = "Rolling weekly playtime budget enforcement", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/playwarden/config.toml)
    #[arg(short, long, global = true, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set PLAYWARDEN_DATA_DIR env var)
    #[arg(short, long, global = true, env = PLAYWARDEN_DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Write the default configuration if the config file does not exist
    #[arg(long)]
    write_default_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print this week's usage from the ledger without enforcing anything
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

/// Load the policy, applying command-line overrides
fn load_policy(args: &Args) -> Result<Policy> {
    let mut policy = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    if let Some(data_dir) = &args.data_dir {
        policy.service.relocate(data_dir.clone());
    }

    info!(
        config_path = %args.config.display(),
        tracked = policy.tracked.len(),
        weekly_limit_secs = policy.weekly_limit_secs(),
        "Configuration loaded"
    );

    Ok(policy)
}

fn stop_mode(policy: &Policy) -> StopMode {
    if policy.service.kill_grace.is_zero() {
        StopMode::Force
    } else {
        StopMode::Graceful {
            timeout: policy.service.kill_grace,
        }
    }
}

/// Main service state
struct Service {
    policy: Policy,
    supervisor: Supervisor,
}

impl Service {
    fn new(policy: Policy) -> Result<Self> {
        let data_dir = &policy.service.data_dir;
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        if is_mock_time_active() {
            warn!("Mock time is active; usage timestamps follow the mocked clock");
        }

        let registry = Arc::new(SystemRegistry::with_stop_mode(stop_mode(&policy)));
        let mut supervisor = Supervisor::new(registry);
        supervisor
            .set_timing(policy.service.sample_period, policy.service.enforce_interval)
            .context("Invalid sampling configuration")?;
        supervisor
            .configure(&policy.tracked, policy.weekly_limit_secs())
            .context("Invalid budget configuration")?;

        Ok(Self { policy, supervisor })
    }

    async fn run(mut self) -> Result<()> {
        let mut events = self.supervisor.subscribe();

        self.supervisor
            .start(&self.policy.service.ledger_path)
            .context("Failed to start supervisor")?;

        // Set up signal handlers
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        let mut report_timer = self.policy.service.report_interval.map(tokio::time::interval);

        info!(
            ledger = %self.policy.service.ledger_path.display(),
            "Service running"
        );

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                event = events.recv() => match event {
                    Ok(event) => Self::handle_core_event(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Dropped core events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        error!("Core event channel closed");
                        break;
                    }
                },

                Some(_) = async {
                    match report_timer.as_mut() {
                        Some(timer) => Some(timer.tick().await),
                        None => None,
                    }
                } => {
                    self.log_usage();
                }
            }
        }

        info!("Shutting down playwardend");
        self.supervisor
            .stop()
            .await
            .context("Failed to stop supervisor")?;

        info!("Shutdown complete");
        Ok(())
    }

    fn log_usage(&self) {
        match self.supervisor.current_usage_seconds() {
            Ok(used) => {
                let report = UsageReport::new(used, self.policy.weekly_limit_secs());
                info!(
                    used_seconds = report.used_seconds,
                    remaining_seconds = report.remaining_seconds,
                    "{}",
                    report
                );
            }
            Err(e) => warn!(error = %e, "Failed to read current usage"),
        }
    }

    fn handle_core_event(event: &CoreEvent) {
        match event {
            CoreEvent::LimitReached {
                used_seconds,
                limit_seconds,
            } => {
                warn!(
                    used_seconds,
                    limit_seconds, "Weekly limit reached; the current session may finish"
                );
            }
            CoreEvent::LimitStillExceeded { .. } => {}
            CoreEvent::BudgetRestored {
                used_seconds,
                limit_seconds,
            } => {
                info!(used_seconds, limit_seconds, "Weekly budget available again");
            }
            CoreEvent::ProcessTerminated { name } => {
                warn!(process = %name, "Terminated process over weekly limit");
            }
        }
    }
}

/// Print usage from the ledger file without trimming or rewriting it
fn print_status(policy: &Policy, json: bool) -> Result<()> {
    let ledger = FileLedger::open(&policy.service.ledger_path);
    let report = UsageReport::from_ticks(
        &ledger.ticks(),
        unix_now(),
        policy.service.sample_period.as_secs(),
        policy.weekly_limit_secs(),
    )
    .with_ledger(policy.service.ledger_path.clone());

    if json {
        let out = serde_json::to_string_pretty(&report).context("Failed to encode status")?;
        println!("{}", out);
    } else {
        println!("{}", report);
        if let Some(expiry) = &report.next_expiry {
            println!("Oldest counted playtime expires at {}", expiry);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    if args.write_default_config {
        if args.config.exists() {
            info!(path = %args.config.display(), "Config file exists; leaving it untouched");
        } else {
            write_default_config(&args.config)
                .with_context(|| format!("Failed to write default config to {:?}", args.config))?;
        }
    } else if !args.config.exists() {
        bail!(
            "Config file {:?} not found (run with --write-default-config to create one)",
            args.config
        );
    }

    let policy = load_policy(&args)?;

    if let Some(Command::Status { json }) = args.command {
        return print_status(&policy, json);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "playwardend starting");

    let service = Service::new(policy)?;
    service.run().await
}
