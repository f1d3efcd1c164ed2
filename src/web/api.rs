use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use crate::dashboard::{ConnectionStatus, DashboardCommand, SharedDashboard};
use crate::map::{MapStatus, MarkerFeature};
use crate::models::{Mmsi, Port, VesselRecord, PORTS};

#[derive(Clone)]
pub struct AppState {
    pub dashboard: SharedDashboard,
    pub commands: mpsc::Sender<DashboardCommand>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(message),
        }
    }
}

/// One row of the nearby-vessel list: the record plus its distance to
/// the selected port.
#[derive(Debug, Serialize)]
pub struct NearbyVesselView {
    #[serde(flatten)]
    pub vessel: VesselRecord,
    pub distance_km: f64,
}

#[derive(Debug, Serialize)]
pub struct NearbyView {
    pub port: &'static str,
    pub vessels: Vec<NearbyVesselView>,
}

#[derive(Debug, Serialize)]
pub struct MarkersView {
    pub map: MapStatus,
    pub markers: Vec<MarkerFeature>,
    pub ports: Vec<Port>,
}

#[derive(Debug, Serialize)]
pub struct StatusView {
    pub connection: ConnectionStatus,
    pub vessels: usize,
    pub map: MapStatus,
    pub selected_port: &'static str,
    pub selected_vessel: Option<String>,
}

// Query parameters
#[derive(Debug, Deserialize)]
pub struct VesselQuery {
    pub mmsi: String,
}

#[derive(Debug, Deserialize)]
pub struct PortSelection {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct VesselSelection {
    pub mmsi: String,
}

pub async fn get_ports() -> Json<ApiResponse<Vec<Port>>> {
    Json(ApiResponse::ok(PORTS.to_vec()))
}

pub async fn get_vessels(State(state): State<AppState>) -> Json<ApiResponse<Vec<VesselRecord>>> {
    let dashboard = state.dashboard.read().await;
    Json(ApiResponse::ok(dashboard.vessels().cloned().collect()))
}

pub async fn get_nearby(State(state): State<AppState>) -> Json<ApiResponse<NearbyView>> {
    let dashboard = state.dashboard.read().await;
    let vessels = dashboard
        .nearby()
        .iter()
        .filter_map(|entry| {
            dashboard.get(entry.mmsi).map(|record| NearbyVesselView {
                vessel: record.clone(),
                distance_km: entry.distance_km,
            })
        })
        .collect();
    Json(ApiResponse::ok(NearbyView {
        port: dashboard.selected_port().name,
        vessels,
    }))
}

pub async fn get_vessel(
    State(state): State<AppState>,
    Query(params): Query<VesselQuery>,
) -> Json<ApiResponse<VesselRecord>> {
    let Ok(mmsi) = Mmsi::try_from(params.mmsi.as_str()) else {
        return Json(ApiResponse::error(format!(
            "Invalid MMSI {}",
            params.mmsi
        )));
    };
    let dashboard = state.dashboard.read().await;
    match dashboard.get(mmsi) {
        Some(record) => Json(ApiResponse::ok(record.clone())),
        None => Json(ApiResponse::error(format!("Vessel {} not found", mmsi))),
    }
}

pub async fn get_markers(State(state): State<AppState>) -> Json<ApiResponse<MarkersView>> {
    let dashboard = state.dashboard.read().await;
    let (markers, ports) = match dashboard.marker_layer() {
        Some(layer) => (
            layer.features().cloned().collect(),
            layer.ports().to_vec(),
        ),
        None => (Vec::new(), Vec::new()),
    };
    Json(ApiResponse::ok(MarkersView {
        map: dashboard.map_status(),
        markers,
        ports,
    }))
}

pub async fn get_status(State(state): State<AppState>) -> Json<ApiResponse<StatusView>> {
    let dashboard = state.dashboard.read().await;
    Json(ApiResponse::ok(StatusView {
        connection: dashboard.connection(),
        vessels: dashboard.vessel_count(),
        map: dashboard.map_status(),
        selected_port: dashboard.selected_port().name,
        selected_vessel: dashboard.selected_vessel().map(|v| v.mmsi.to_string()),
    }))
}

pub async fn select_port(
    State(state): State<AppState>,
    Json(params): Json<PortSelection>,
) -> Json<ApiResponse<()>> {
    info!(?params, "POST /api/select_port called");
    let mut dashboard = state.dashboard.write().await;
    if dashboard.select_port(&params.name) {
        Json(ApiResponse::ok(()))
    } else {
        Json(ApiResponse::error(format!("Port {} not found", params.name)))
    }
}

pub async fn select_vessel(
    State(state): State<AppState>,
    Json(params): Json<VesselSelection>,
) -> Json<ApiResponse<()>> {
    info!(?params, "POST /api/select_vessel called");
    let Ok(mmsi) = Mmsi::try_from(params.mmsi.as_str()) else {
        return Json(ApiResponse::error(format!(
            "Invalid MMSI {}",
            params.mmsi
        )));
    };
    let mut dashboard = state.dashboard.write().await;
    if dashboard.select_vessel(mmsi) {
        Json(ApiResponse::ok(()))
    } else {
        Json(ApiResponse::error(format!("Vessel {} not found", mmsi)))
    }
}

pub async fn reconnect(State(state): State<AppState>) -> Json<ApiResponse<()>> {
    info!("POST /api/reconnect called");
    match state.commands.send(DashboardCommand::Reconnect).await {
        Ok(()) => Json(ApiResponse::ok(())),
        Err(e) => Json(ApiResponse::error(e.to_string())),
    }
}

pub async fn reload(State(state): State<AppState>) -> Json<ApiResponse<()>> {
    info!("POST /api/reload called");
    match state.commands.send(DashboardCommand::ReloadFromStore).await {
        Ok(()) => Json(ApiResponse::ok(())),
        Err(e) => Json(ApiResponse::error(e.to_string())),
    }
}

pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .route("/ports", get(get_ports))
        .route("/vessels", get(get_vessels))
        .route("/vessels/nearby", get(get_nearby))
        .route("/vessel", get(get_vessel))
        .route("/markers", get(get_markers))
        .route("/status", get(get_status))
        .route("/select_port", post(select_port))
        .route("/select_vessel", post(select_vessel))
        .route("/reconnect", post(reconnect))
        .route("/reload", post(reload))
        .with_state(state)
}
