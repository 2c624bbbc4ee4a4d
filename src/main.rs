//! Arena sync server - authoritative entity simulation over WebSocket
//!
//! Runs the fixed-rate simulation tick, the history pruner and the HTTP
//! endpoints (`/health`, `/ws`) until Ctrl+C or SIGTERM.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arena_sync::app::AppState;
use arena_sync::config::Config;
use arena_sync::http::build_router;
use arena_sync::util::scheduler::{shutdown_channel, RepeatingTask};
use arena_sync::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    init_tracing(&config.log_level);
    init_server_time();

    info!("Starting arena sync server");
    info!(
        tick_ms = config.simulation.tick_ms,
        retention_ms = config.simulation.retention_ms,
        "Simulation configured"
    );

    let state = AppState::new(config.clone());
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    let simulator = state.simulator.clone();
    let tick_task = RepeatingTask::spawn(
        "simulation",
        config.simulation.tick_period(),
        shutdown_rx.clone(),
        move || {
            simulator.tick();
        },
    );

    let pruner = state.pruner.clone();
    let prune_task = RepeatingTask::spawn(
        "history_pruner",
        config.simulation.retention_period(),
        shutdown_rx,
        move || {
            pruner.run_once();
        },
    );

    let router = build_router(state);

    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop background tasks
    let _ = shutdown_tx.send(true);
    let (ticks, prunes) = tokio::join!(tick_task, prune_task);
    info!(ticks = ticks.unwrap_or_default(), prunes = prunes.unwrap_or_default(), "Background tasks stopped");

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
