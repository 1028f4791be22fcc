//! TVRemote Daemon
//!
//! LAN remote-control endpoint for pointer input, files and playback.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use daemon::config::Config;
use daemon::files::PathSanitizer;
use daemon::orchestrator::{DaemonOrchestrator, OrchestratorEvent, PlatformHooks};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// TVRemote Daemon - LAN remote control endpoint.
#[derive(Parser, Debug)]
#[command(name = "tvremote-daemon")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the daemon.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the HTTP endpoint and the input context
    Start {
        /// Address to bind (overrides server.bind)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,

        /// Port to listen on (overrides server.port)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Print the effective configuration as TOML
    ShowConfig,

    /// Resolve a client path against the configured base directory
    CheckPath {
        /// Path as a client would send it
        path: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => Config::load(config_path)?,
        None => Config::load_default()?,
    };

    if let Commands::Start { bind, port } = &cli.command {
        if let Some(bind) = bind {
            config.server.bind = bind.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
    }

    // Environment variables win over file and flags
    config.apply_env_overrides();
    config.validate()?;

    let _log_guard = init_logging(&config, cli.verbose)?;
    if let Some(config_path) = &cli.config {
        tracing::info!("Using config file: {:?}", config_path);
    }

    match cli.command {
        Commands::Start { .. } => {
            tracing::info!("TVRemote daemon starting...");
            let orchestrator = DaemonOrchestrator::new(config, PlatformHooks::default())?;
            run_headless(&orchestrator).await?;
        }
        Commands::ShowConfig => {
            print!("{}", config.to_toml()?);
        }
        Commands::CheckPath { path } => {
            let sanitizer = PathSanitizer::new(config.files.base_dir.clone());
            match sanitizer.sanitize(&path) {
                Ok(resolved) => println!("{}", resolved.as_path().display()),
                Err(e) => anyhow::bail!("Rejected: {}", e),
            }
        }
    }

    Ok(())
}

/// Install the tracing subscriber.
///
/// Logs go to stderr, and additionally to a daily rolling file when
/// `daemon.log_dir` is set. The returned guard must live until exit so the
/// file writer flushes.
fn init_logging(config: &Config, verbose: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let level = if verbose {
        "debug".to_string()
    } else {
        config.daemon.log_level.to_lowercase()
    };
    let filter = EnvFilter::try_new(&level)?;

    let (file_layer, guard) = match &config.daemon.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "tvremote.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// Run the daemon until SIGINT or SIGTERM.
async fn run_headless(orchestrator: &DaemonOrchestrator) -> anyhow::Result<()> {
    // Subscribe before starting so no event is missed
    let mut events = orchestrator.subscribe();

    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                OrchestratorEvent::StateChanged(state) => {
                    tracing::info!("Orchestrator state: {:?}", state);
                }
                OrchestratorEvent::Listening { address } => {
                    tracing::info!("Remote control available at http://{}", address);
                }
                OrchestratorEvent::InputAttached => {
                    tracing::info!("Pointer input ready");
                }
                OrchestratorEvent::InputDetached => {
                    tracing::debug!("Pointer input stopped");
                }
                OrchestratorEvent::Error { message } => {
                    tracing::error!("Orchestrator error: {}", message);
                }
            }
        }
    });

    orchestrator.start().await?;

    wait_for_shutdown_signal().await?;
    tracing::info!("Received shutdown signal");

    orchestrator.stop().await?;

    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
