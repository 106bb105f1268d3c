//! Dashlink Daemon - live telemetry bridge for web dashboards
//!
//! Serves dashboard clients over WebSocket, broadcasts state deltas at a
//! fixed rate and applies dashboard edits to the in-memory state store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use dashlink_broadcaster::{ConnectionRegistry, DashboardBroadcaster, DashboardServer, RequestDispatcher};
use dashlink_daemon::config::DaemonConfig;
use dashlink_daemon::input;
use dashlink_daemon::log_layer::{level_filter, DashboardLogLayer};
use dashlink_daemon::service::TickService;
use dashlink_state::{ChannelEventBus, InMemoryStore, Mode, SharedModeController};

#[derive(Parser, Debug)]
#[command(name = "dashlink-daemon", version, about = "Live telemetry bridge for web dashboards")]
struct Args {
    /// Configuration file (default: platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = DaemonConfig::load(args.config).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }

    let store = Arc::new(InMemoryStore::new());
    let broadcaster = Arc::new(DashboardBroadcaster::new(
        Arc::new(ConnectionRegistry::new()),
        store.clone(),
        config.webdashboard.clone(),
        config.log_flush_interval(),
    ));

    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_filter(env_filter),
        )
        .with(DashboardLogLayer::new(broadcaster.clone()).with_filter(level_filter(config.dashboard_log_level)))
        .init();

    info!("Starting Dashlink Daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config.config_path.display());
    info!(
        "{} match values, {} auto origins",
        config.webdashboard.match_values.len(),
        config.webdashboard.auto_selector.origins.len()
    );

    let bus = Arc::new(ChannelEventBus::new());
    let modes = Arc::new(SharedModeController::new(Mode::Disabled));
    let dispatcher = Arc::new(RequestDispatcher::new(broadcaster.clone(), bus.clone(), modes));

    let server = DashboardServer::new(config.socket_addr()?, broadcaster.clone(), dispatcher);
    let bound = server
        .start()
        .await
        .context("Failed to start dashboard server")?;

    tokio::spawn(input::apply_events(bus.subscribe(), store.clone()));

    let service = TickService::new(
        broadcaster,
        store,
        config.tick_interval(),
        config.frame_time_threshold(),
    );

    info!("Dashlink daemon ready on ws://{}", bound);

    tokio::select! {
        _ = service.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down...");
    if let Err(e) = server.stop().await {
        error!("Failed to stop dashboard server: {}", e);
    }
    info!("Dashlink daemon stopped");

    Ok(())
}
