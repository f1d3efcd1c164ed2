//! AIS dashboard service

use std::sync::Arc;

use ais_dashboard::config::AppConfig;
use ais_dashboard::dashboard::{run_dashboard, Dashboard};
use ais_dashboard::errors::DashboardError;
use ais_dashboard::web;
use tokio::signal;
use tokio::sync::{mpsc, RwLock};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), DashboardError> {
    #[cfg(feature = "dotenv")]
    dotenvy::dotenv().ok();

    // Initialize logging from the environment
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration, preferring environment variables over config files
    let config = AppConfig::load()?;
    config.validate()?;

    let dashboard = Arc::new(RwLock::new(Dashboard::new()));
    let (command_tx, command_rx) = mpsc::channel(8);

    // The web surface the hosting page mounts
    let server = tokio::spawn(web::serve(
        dashboard.clone(),
        command_tx,
        config.http.port,
    ));

    // Setup signal handling for graceful shutdown
    let shutdown_signal = signal::ctrl_c();

    tokio::select! {
        result = run_dashboard(dashboard.clone(), &config, command_rx) => {
            info!("dashboard driver completed: {:?}", result);
        }
        _ = shutdown_signal => {
            info!("Received shutdown signal");
        }
    }

    server.abort();
    dashboard.write().await.teardown();

    Ok(())
}
