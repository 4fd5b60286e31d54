//! Audio Player (mirp-ap) - Main entry point
//!
//! Wires the filesystem catalog, connectivity monitor and symphonia pipeline
//! into the playback controller, starts the decode task, and runs the
//! console front-end on stdin/stdout until EOF, `quit` or a shutdown signal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mirp_ap::audio::SymphoniaPipeline;
use mirp_ap::catalog::FsCatalog;
use mirp_ap::config::{Overrides, PlayerSettings};
use mirp_ap::console::run_console;
use mirp_ap::gate::{ConnectivityGate, NetworkMonitor, StaticGate};
use mirp_ap::playback::{spawn_decode_runtime, DecodePipeline, PlaybackController};
use mirp_ap::SharedState;
use mirp_common::config::TomlConfig;
use mirp_common::{PlaybackMode, PlayerEvent};
use tokio::io::BufReader;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for mirp-ap
#[derive(Parser, Debug)]
#[command(name = "mirp-ap")]
#[command(about = "Music & internet radio player")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "MIRP_CONFIG")]
    config: Option<PathBuf>,

    /// Folder containing music files (overrides MIRP_MUSIC_ROOT and the config file)
    #[arg(short = 'r', long)]
    music_root: Option<PathBuf>,

    /// Initial volume (0-21)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=21))]
    volume: Option<u8>,

    /// Initial mode: local or radio
    #[arg(short, long)]
    mode: Option<PlaybackMode>,

    /// Never attempt network streams
    #[arg(long)]
    offline: bool,

    /// Start playing the selected item immediately
    #[arg(long)]
    autoplay: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, config_path) =
        TomlConfig::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;

    init_tracing(&config.logging.level);

    info!(
        "Starting MIRP Audio Player {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("MIRP_GIT_HASH"),
        env!("MIRP_BUILD_TIMESTAMP"),
        env!("MIRP_BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    let settings = PlayerSettings::resolve(
        &config,
        &Overrides {
            music_root: args.music_root.clone(),
            volume: args.volume,
            mode: args.mode,
            offline: args.offline,
        },
    )
    .context("Invalid settings")?;
    info!("Music root: {}", settings.music_root.display());

    let catalog = Arc::new(FsCatalog::from_config(&settings.music_root, &config));

    let gate: Arc<dyn ConnectivityGate> = if settings.offline {
        info!("Offline mode: network streams disabled");
        Arc::new(StaticGate::new(false))
    } else {
        Arc::new(NetworkMonitor::start(&settings.network))
    };

    let pipeline: Arc<dyn DecodePipeline> = Arc::new(
        SymphoniaPipeline::new(settings.pipeline.clone()).context("Failed to initialize audio pipeline")?,
    );

    let shared = Arc::new(SharedState::new());
    let event_log = tokio::spawn(log_events(shared.subscribe_events()));

    let controller = Arc::new(
        PlaybackController::new(
            Arc::clone(&pipeline),
            catalog,
            gate,
            Arc::clone(&shared),
            settings.controller.clone(),
        )
        .await,
    );

    let runtime = spawn_decode_runtime(Arc::clone(&controller), pipeline, settings.decode_period);

    if args.autoplay {
        if let Err(e) = controller.play().await {
            warn!("Autoplay failed: {}", e);
        }
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    let console_result = tokio::select! {
        result = run_console(&controller, stdin, stdout) => {
            info!("Console closed, shutting down");
            result
        }
        _ = shutdown_signal() => Ok(()),
    };

    controller.stop().await;
    runtime.shutdown().await;
    event_log.abort();

    console_result.context("Console I/O failed")?;
    info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing: RUST_LOG wins, else the configured level for the player crates
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mirp_ap={level},mirp_common={level}")));

    // Logs go to stderr so the console owns stdout
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Forward player events to the debug log
async fn log_events(mut rx: broadcast::Receiver<PlayerEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => debug!("event: {}", json),
                Err(e) => warn!("Cannot serialize {} event: {}", event.event_type(), e),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Event log lagged, {} events skipped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
