use axum::Router;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};

use super::api::{create_api_router, AppState};
use crate::dashboard::{DashboardCommand, SharedDashboard};
use crate::errors::DashboardError;

/// Assemble the dashboard application router.
///
/// CORS is wide open so the hosting page can mount the dashboard from
/// any origin.
pub fn create_app(dashboard: SharedDashboard, commands: mpsc::Sender<DashboardCommand>) -> Router {
    let state = AppState {
        dashboard,
        commands,
    };

    Router::new().nest("/api", create_api_router(state)).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

pub async fn serve(
    dashboard: SharedDashboard,
    commands: mpsc::Sender<DashboardCommand>,
    port: u16,
) -> Result<(), DashboardError> {
    let app = create_app(dashboard, commands);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("dashboard API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
