//! TUCaN grade notifier CLI
//!
//! Checks the portal's module results on a fixed interval and sends a
//! notification for every new or changed grade.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tucan_notifier::{
    error::{AppError, Result},
    logging::LogLevel,
    models::{Config, Credentials, SinkKind},
    notify::{Notification, build_sink},
    pipeline::{PollCycle, Poller, run_scheduled},
    storage::LocalStorage,
    utils::{http::HttpSessionFactory, lock::InstanceLock},
};

/// tucan-notifier - TUCaN grade crawler & notifier
#[derive(Parser, Debug)]
#[command(
    name = "tucan-notifier",
    version,
    about = "TUCaN grade crawler & notifier"
)]

struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the data directory holding the snapshot and lock file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Write the log to a file instead of stderr
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Portal login and notification target.
#[derive(Args, Debug)]
struct Login {
    /// Login username
    #[arg(short, long, env = "TUCAN_USERNAME")]
    username: String,

    /// Login password
    #[arg(short, long, env = "TUCAN_PASSWORD", hide_env_values = true)]
    password: String,

    /// Send notifications by mail to this address
    #[arg(short, long)]
    mail: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll on a fixed interval until interrupted
    Run {
        #[command(flatten)]
        login: Login,

        /// Minutes between polls (default from config)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Run a single poll cycle and exit
    Check {
        #[command(flatten)]
        login: Login,
    },

    /// Validate the configuration file
    Validate,

    /// Show current snapshot info
    Info,
}

/// Initialize logging based on verbosity flags and config.
fn init_logging(cli: &Cli, config_level: &str) -> Result<()> {
    let level = if cli.verbose {
        LogLevel::Debug
    } else if cli.quiet {
        LogLevel::Warn
    } else {
        LogLevel::parse(config_level)
    };

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level.as_filter())
        .parse_default_env()
        .format_timestamp_secs();

    if let Some(path) = &cli.log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

/// Apply login flags to the config and build a ready poller.
fn build_poller(config: &mut Config, login: Login) -> Result<Poller> {
    if let Some(address) = login.mail {
        config.notify.sink = SinkKind::Mail;
        config.notify.mail_address = Some(address);
    }
    config.validate()?;

    let sessions = Arc::new(HttpSessionFactory::new(config.crawler.clone()));
    let cycle = PollCycle::new(&config.portal, sessions)?;
    let store = Arc::new(LocalStorage::new(&config.storage.data_dir));
    let sink = build_sink(&config.notify)?;

    log::info!("Notifications via {}", sink.name());
    Ok(Poller::new(
        cycle,
        Credentials::new(login.username, login.password),
        store,
        sink,
    ))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.config);
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(&cli, &level)?;

    let mut config = loaded.unwrap_or_else(|e| {
        log::warn!(
            "Config load failed from {}: {}. Using defaults.",
            cli.config.display(),
            e
        );
        Config::default()
    });
    if let Some(dir) = &cli.database {
        config.storage.data_dir = dir.clone();
    }

    log::info!("TUCaN Grade Crawler & Notifier starting...");
    log::debug!("Data directory: {}", config.storage.data_dir.display());

    match cli.command {
        Command::Run { login, interval } => {
            let _lock = InstanceLock::acquire(&config.storage.data_dir)?;
            if let Some(minutes) = interval {
                config.schedule.interval_minutes = minutes;
            }
            let poller = build_poller(&mut config, login)?;

            let interval = Duration::from_secs(config.schedule.interval_minutes)
                .checked_mul(60)
                .ok_or_else(|| AppError::validation("schedule.interval_minutes is too large"))?;
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::error!("Cannot listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            };
            let stats = run_scheduled(&poller, interval, shutdown).await;

            log::info!(
                "Exiting after {} cycle(s), {} failed, {} notification(s) sent",
                stats.cycles,
                stats.failures,
                stats.notifications
            );
        }

        Command::Check { login } => {
            let _lock = InstanceLock::acquire(&config.storage.data_dir)?;
            let poller = build_poller(&mut config, login)?;

            let report = poller.poll().await?;
            if report.baseline {
                log::info!("Baseline recorded: {} record(s)", report.tracked);
            }
            for event in &report.events {
                println!("{}", Notification::from_event(event).summary());
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} navigation steps, polling every {} min, {:?} sink)",
                config.portal.navigation.len(),
                config.schedule.interval_minutes,
                config.notify.sink
            );
        }

        Command::Info => {
            let storage = LocalStorage::new(&config.storage.data_dir);
            log::info!("Data directory: {}", storage.root_dir().display());

            match storage.load_data().await {
                Ok(Some(data)) => {
                    log::info!("Snapshot: {}", storage.snapshot_path().display());
                    log::info!("Records: {}", data.count);
                    log::info!("Last updated: {}", data.updated_at);
                }
                Ok(None) => log::info!("No snapshot found yet."),
                Err(e) => {
                    log::error!("Snapshot unreadable: {}", e);
                    return Err(AppError::persistence(e));
                }
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
