use stream_relay::error::StreamRelayError;
use stream_relay::logger::initialize as LoggerInitialize;

use relay_core::config::RelayConfig;
use relay_core::error::CoreError;
use relay_core::relay::start_relay_server;

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;

use log::info;

#[tokio::main]
async fn main() -> Result<(), StreamRelayError> {
    let config = RelayConfig::load_from_environment().map_err(CoreError::from)?;

    let log_dir = config.logging.resolved_directory();
    create_dir_all(&log_dir).map_err(|e| StreamRelayError::App {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    let level = config.logging.level_filter().map_err(CoreError::from)?;
    LoggerInitialize(&log_dir, level)?;

    info!("Stream relay starting");
    info!("Log directory: {}", log_dir.display());
    info!(
        "Transcoder: {} pushing to {}/<key>",
        config.transcoder.program, config.transcoder.destination_base
    );

    let handle = start_relay_server(config)
        .await
        .map_err(CoreError::from)?;

    info!("Relay ready at {}", handle.url());

    shutdown_signal().await?;

    info!("Shutdown signal received");
    handle.shutdown().await;

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<(), StreamRelayError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate()).map_err(|e| StreamRelayError::App {
        message: format!("Failed to install SIGTERM handler: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map_err(|e| StreamRelayError::App {
            message: format!("Failed to listen for Ctrl-C: {e}"),
            location: ErrorLocation::from(Location::caller()),
        }),
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<(), StreamRelayError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| StreamRelayError::App {
            message: format!("Failed to listen for Ctrl-C: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
}
