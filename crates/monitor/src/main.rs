//! `floodwatch-monitor` -- hazard monitor daemon.
//!
//! Connects to the sensor server over Socket.IO, reconciles smoke, rain,
//! water-level, and camera events into a de-duplicated hazard state, and
//! reports every change through the console presenter.
//!
//! See [`MonitorConfig::from_env`] for the environment variables.

use floodwatch_link::{ConnectionManager, MonitorState};
use floodwatch_monitor::config::MonitorConfig;
use floodwatch_monitor::presenter;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "floodwatch_monitor=info,floodwatch_link=info,floodwatch_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MonitorConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    tracing::info!(
        endpoint = %config.endpoint,
        caution_min = config.thresholds.caution_min(),
        danger_min = config.thresholds.danger_min(),
        reconnect_attempts = ?config.reconnect_attempts,
        "Starting floodwatch-monitor",
    );

    let state = MonitorState::new(config.thresholds);
    let cancel = CancellationToken::new();
    let presenter_task = tokio::spawn(presenter::run(state.subscribe(), cancel.clone()));

    let manager = ConnectionManager::connect(config.connection_config(), state.clone())
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Invalid connection configuration");
            std::process::exit(1);
        });

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }

    manager.shutdown().await;
    cancel.cancel();
    let _ = presenter_task.await;

    let snapshot = state.snapshot();
    tracing::info!("{}", presenter::summarize(&snapshot));
    match serde_json::to_string(&snapshot.state) {
        Ok(json) => tracing::info!(state = %json, "Final hazard state"),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize final state"),
    }
}
