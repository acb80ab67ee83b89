//! # Conduit
//!
//! Launches one application configuration and keeps it running until Ctrl-C.
//!
//! ```text
//! CONDUIT_APP_CONFIG=app.json CONDUIT_MODULE_DIR=./modules conduit
//! ```

use anyhow::{Context, Result};
use conduit_runtime::{AppContext, RuntimeConfig};
use conduit_telemetry::{init_tracing, TelemetryConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::from_env();
    if let Err(e) = init_tracing(&telemetry) {
        eprintln!("tracing unavailable: {e}");
    }

    let config = RuntimeConfig::from_env();
    info!(
        app_config = ?config.app_config,
        module_dir = ?config.module_dir,
        wait_timeout_ms = config.wait_timeout.as_millis() as u64,
        "Starting Conduit runtime"
    );

    let context = AppContext::new(config).context("failed to build the application context")?;
    let launched = context
        .launch_configured()
        .context("failed to launch the application configuration")?;
    if launched.is_none() {
        warn!("Set CONDUIT_APP_CONFIG to launch an application");
    }

    info!("Conduit is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    info!("Initiating shutdown...");
    drop(launched);
    tokio::task::spawn_blocking(move || context.shutdown())
        .await
        .context("shutdown task panicked")?;
    info!("Shutdown complete");
    Ok(())
}
