//! Dashboard composition and driver loop.
//!
//! [`Dashboard`] is the single state container behind the UI: the
//! vessel collection, the map adapter, the selected port and vessel,
//! the derived nearby list and the connection badge. All mutation goes
//! through it, either from the driver loop consuming bridge events or
//! from an API handler holding the write lock.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio::time::sleep;
use tracing::{error, info};

use crate::bridge::{BridgeBuilder, BridgeEvent};
use crate::config::AppConfig;
use crate::errors::DashboardError;
use crate::map::{MapAdapter, MapStatus, MarkerLayer};
use crate::models::{HistoricalVessel, Mmsi, Port, VesselRecord, PORTS};
use crate::reconciler::{ApplyOutcome, NearbyVessel, VesselReconciler};
use crate::store::VesselStore;

/// The connection badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// Operations that must run on the driver loop because they rebuild
/// the subscription or talk to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardCommand {
    /// Tear down the subscription, clear all vessel state, re-subscribe
    Reconnect,
    /// Re-issue the historical fetch and merge additively
    ReloadFromStore,
}

pub type SharedDashboard = Arc<RwLock<Dashboard>>;

pub struct Dashboard {
    reconciler: VesselReconciler,
    map: MapAdapter<MarkerLayer>,
    selected_port: &'static Port,
    selected_vessel: Option<Mmsi>,
    nearby: Vec<NearbyVessel>,
    connection: ConnectionStatus,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            reconciler: VesselReconciler::new(),
            map: MapAdapter::new(),
            selected_port: &PORTS[0],
            selected_vessel: None,
            nearby: Vec::new(),
            connection: ConnectionStatus::Disconnected,
        }
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn set_connection(&mut self, status: ConnectionStatus) {
        self.connection = status;
    }

    pub fn selected_port(&self) -> &'static Port {
        self.selected_port
    }

    pub fn selected_vessel(&self) -> Option<&VesselRecord> {
        self.selected_vessel
            .and_then(|mmsi| self.reconciler.get(mmsi))
    }

    pub fn nearby(&self) -> &[NearbyVessel] {
        &self.nearby
    }

    pub fn vessels(&self) -> impl Iterator<Item = &VesselRecord> {
        self.reconciler.vessels()
    }

    pub fn vessel_count(&self) -> usize {
        self.reconciler.len()
    }

    pub fn get(&self, mmsi: Mmsi) -> Option<&VesselRecord> {
        self.reconciler.get(mmsi)
    }

    pub fn map_status(&self) -> MapStatus {
        self.map.status()
    }

    pub fn marker_layer(&self) -> Option<&MarkerLayer> {
        self.map.surface()
    }

    /// Fold one bridge event into the dashboard state.
    pub fn handle_event(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::Connected => self.connection = ConnectionStatus::Connected,
            BridgeEvent::Disconnected => self.connection = ConnectionStatus::Disconnected,
            BridgeEvent::Message(envelope) => {
                if self.reconciler.apply(&envelope) != ApplyOutcome::Dropped {
                    self.refresh();
                }
            }
        }
    }

    /// Recompute everything derived from the vessel set: the nearby
    /// list for the selected port, and the marker layer.
    fn refresh(&mut self) {
        self.nearby = self.reconciler.nearest_to(self.selected_port);
        self.map.sync(self.reconciler.vessels());
    }

    /// Switch the selected port; `false` if the name is unknown.
    pub fn select_port(&mut self, name: &str) -> bool {
        let Some(port) = crate::models::port_by_name(name) else {
            return false;
        };
        self.selected_port = port;
        self.nearby = self.reconciler.nearest_to(port);
        true
    }

    /// Designate a vessel for the detail view, opening its marker
    /// popup when it has one; `false` if the vessel is unknown.
    pub fn select_vessel(&mut self, mmsi: Mmsi) -> bool {
        if self.reconciler.get(mmsi).is_none() {
            return false;
        }
        // the widget keeps at most one popup open
        if let Some(previous) = self.selected_vessel.filter(|p| *p != mmsi) {
            if let Some(id) = self.map.marker_id(previous) {
                if let Some(layer) = self.map.surface_mut() {
                    layer.close_popup(id);
                }
            }
        }
        self.selected_vessel = Some(mmsi);
        if let Some(id) = self.map.marker_id(mmsi) {
            if let Some(layer) = self.map.surface_mut() {
                layer.open_popup(id);
            }
        }
        true
    }

    /// Full state reset for reconnect: vessel collection, nearby list,
    /// selection and markers all go away before any new event arrives.
    pub fn reset(&mut self) {
        self.reconciler.clear();
        self.nearby.clear();
        self.selected_vessel = None;
        self.map.sync(self.reconciler.vessels());
    }

    /// Merge historical rows additively, then refresh derived state.
    pub fn merge_historical(&mut self, vessels: Vec<HistoricalVessel>) {
        for vessel in vessels {
            self.reconciler.merge_historical(vessel);
        }
        self.refresh();
    }

    /// Lazily acquire the map surface; repeat calls are no-ops.
    pub async fn init_map(&mut self, load_timeout: Duration) {
        self.map
            .initialize(async { Ok(MarkerLayer::default()) }, load_timeout)
            .await;
        // vessels that arrived before the surface did get markers now
        self.refresh();
    }

    /// Release map resources on unmount.
    pub fn teardown(&mut self) {
        self.map.teardown();
    }
}

/// Event-driven dashboard driver.
///
/// Owns the subscription handle and the deferred map-init timer, and is
/// the only place that rebuilds either. Runs until the channel closes
/// or the surrounding select drops it at shutdown, which also abandons
/// any in-flight historical fetch.
pub async fn run_dashboard(
    dashboard: SharedDashboard,
    config: &AppConfig,
    mut commands: mpsc::Receiver<DashboardCommand>,
) -> Result<(), DashboardError> {
    // Historical snapshot first; live data still flows if the store is
    // down, per the dashboard's degrade-quietly rules.
    let store = match VesselStore::connect(&config.store.url).await {
        Ok(store) => {
            if let Err(e) = store.migrate().await {
                error!("store migration failed: {}", e);
            }
            Some(store)
        }
        Err(e) => {
            error!("historical store unavailable: {}", e);
            None
        }
    };
    if let Some(store) = &store {
        load_historical(store, &dashboard).await;
    }

    let mut subscription = BridgeBuilder::new(&config.mqtt)?
        .connect(&config.mqtt.topic)
        .await?;

    // Deferred first map-init attempt, letting layout settle.
    let map_init = sleep(config.map.settle_delay);
    tokio::pin!(map_init);
    let mut map_initialized = false;

    loop {
        tokio::select! {
            _ = &mut map_init, if !map_initialized => {
                map_initialized = true;
                dashboard.write().await.init_map(config.map.load_timeout).await;
            }
            event = subscription.recv() => match event {
                Some(event) => dashboard.write().await.handle_event(event),
                None => break,
            },
            command = commands.recv() => match command {
                Some(DashboardCommand::Reconnect) => {
                    info!("reconnect requested, resetting vessel state");
                    drop(subscription);
                    {
                        let mut dashboard = dashboard.write().await;
                        dashboard.reset();
                        dashboard.set_connection(ConnectionStatus::Disconnected);
                    }
                    subscription = BridgeBuilder::new(&config.mqtt)?
                        .connect(&config.mqtt.topic)
                        .await?;
                }
                Some(DashboardCommand::ReloadFromStore) => {
                    info!("reloading vessels from store");
                    if let Some(store) = &store {
                        load_historical(store, &dashboard).await;
                    }
                }
                None => break,
            },
        }
    }

    Ok(())
}

async fn load_historical(store: &VesselStore, dashboard: &SharedDashboard) {
    match store.fetch_all().await {
        Ok(vessels) => {
            info!(count = vessels.len(), "merging historical vessels");
            dashboard.write().await.merge_historical(vessels);
        }
        Err(e) => error!("historical vessel fetch failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageBody, MetaData, PositionPayload, StreamEnvelope};

    fn position_message(mmsi: u32, lat: f64, lon: f64) -> BridgeEvent {
        BridgeEvent::Message(StreamEnvelope {
            message_type: "PositionReport".to_string(),
            message: MessageBody {
                position_report: Some(PositionPayload {
                    user_id: Some(mmsi),
                    latitude: Some(lat),
                    longitude: Some(lon),
                    ..Default::default()
                }),
                ship_static_data: None,
            },
            metadata: MetaData::default(),
        })
    }

    fn mmsi(value: u32) -> Mmsi {
        Mmsi::try_from(value).unwrap()
    }

    #[tokio::test]
    async fn messages_flow_through_to_markers() {
        let mut dashboard = Dashboard::new();
        dashboard.init_map(Duration::from_secs(1)).await;

        // near Jeddah, the default port
        dashboard.handle_event(position_message(111111, 21.5, 39.2));
        dashboard.handle_event(position_message(222222, 21.6, 39.3));

        assert_eq!(dashboard.vessel_count(), 2);
        assert_eq!(dashboard.nearby().len(), 2);
        assert_eq!(dashboard.marker_layer().unwrap().features().count(), 2);
    }

    #[tokio::test]
    async fn markers_appear_after_late_map_init() {
        let mut dashboard = Dashboard::new();
        dashboard.handle_event(position_message(111111, 21.5, 39.2));
        assert_eq!(dashboard.map_status(), MapStatus::NotLoaded);

        dashboard.init_map(Duration::from_secs(1)).await;

        assert_eq!(dashboard.map_status(), MapStatus::Ready);
        assert_eq!(dashboard.marker_layer().unwrap().features().count(), 1);
    }

    #[tokio::test]
    async fn reconnect_reset_clears_everything_first() {
        let mut dashboard = Dashboard::new();
        dashboard.init_map(Duration::from_secs(1)).await;
        dashboard.handle_event(position_message(111111, 21.5, 39.2));
        dashboard.handle_event(position_message(222222, 21.6, 39.3));
        assert!(dashboard.select_vessel(mmsi(111111)));

        dashboard.reset();

        assert_eq!(dashboard.vessel_count(), 0);
        assert!(dashboard.nearby().is_empty());
        assert!(dashboard.selected_vessel().is_none());
        assert_eq!(dashboard.marker_layer().unwrap().features().count(), 0);
    }

    #[test]
    fn select_port_recomputes_nearby() {
        let mut dashboard = Dashboard::new();
        dashboard.handle_event(position_message(111111, 21.5, 39.2)); // Jeddah
        dashboard.handle_event(position_message(222222, 26.4, 50.1)); // Dammam

        assert_eq!(dashboard.nearby().len(), 1);
        assert_eq!(dashboard.nearby()[0].mmsi.value(), 111111);

        assert!(dashboard.select_port("Dammam"));
        assert_eq!(dashboard.selected_port().name, "Dammam");
        assert_eq!(dashboard.nearby().len(), 1);
        assert_eq!(dashboard.nearby()[0].mmsi.value(), 222222);

        assert!(!dashboard.select_port("Rotterdam"));
        assert_eq!(dashboard.selected_port().name, "Dammam");
    }

    #[tokio::test]
    async fn select_vessel_opens_popup() {
        let mut dashboard = Dashboard::new();
        dashboard.init_map(Duration::from_secs(1)).await;
        dashboard.handle_event(position_message(111111, 21.5, 39.2));
        dashboard.handle_event(position_message(222222, 21.6, 39.3));

        assert!(dashboard.select_vessel(mmsi(111111)));
        assert!(!dashboard.select_vessel(mmsi(999999)));
        assert_eq!(dashboard.selected_vessel().unwrap().mmsi.value(), 111111);

        let popup_open = |dashboard: &Dashboard, value: u32| {
            dashboard
                .marker_layer()
                .unwrap()
                .features()
                .find(|f| f.mmsi.value() == value)
                .unwrap()
                .popup_open
        };
        assert!(popup_open(&dashboard, 111111));

        // selecting another vessel moves the single open popup
        assert!(dashboard.select_vessel(mmsi(222222)));
        assert!(!popup_open(&dashboard, 111111));
        assert!(popup_open(&dashboard, 222222));
    }

    #[test]
    fn connection_badge_tracks_bridge_events() {
        let mut dashboard = Dashboard::new();
        assert_eq!(dashboard.connection(), ConnectionStatus::Disconnected);

        dashboard.handle_event(BridgeEvent::Connected);
        assert_eq!(dashboard.connection(), ConnectionStatus::Connected);

        dashboard.handle_event(BridgeEvent::Disconnected);
        assert_eq!(dashboard.connection(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn historical_merge_is_additive() {
        let mut dashboard = Dashboard::new();
        dashboard.init_map(Duration::from_secs(1)).await;
        dashboard.handle_event(position_message(111111, 21.5, 39.2));

        dashboard.merge_historical(vec![HistoricalVessel {
            mmsi: mmsi(222222),
            vessel_name: Some("Gulf Star".to_string()),
            latitude: Some(21.6),
            longitude: Some(39.3),
            speed: None,
            course: None,
            status: None,
            last_update: None,
            vessel_type: None,
        }]);

        assert_eq!(dashboard.vessel_count(), 2);
        assert_eq!(dashboard.marker_layer().unwrap().features().count(), 2);
    }
}
