//! Map marker lifecycle.
//!
//! [`MapAdapter`] keeps an external map surface in step with the vessel
//! collection: one marker per vessel with a known position, updated in
//! place, pruned as soon as a vessel leaves the renderable set. The
//! surface itself sits behind the [`MarkerSurface`] trait; the shipped
//! implementation is an in-memory [`MarkerLayer`] that the web API
//! serves to a client-side map library.

use std::collections::HashMap;
use std::future::Future;

use serde::Serialize;
use tokio::time::{timeout, Duration};
use tracing::{info, warn};

use crate::errors::DashboardError;
use crate::models::{Mmsi, NavStatus, Port, VesselRecord, PORTS};

/// Marker coloring and orientation, derived from the vessel state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarkerIcon {
    /// CSS color keyed by navigational status
    pub color: &'static str,
    /// Rotation equals the course over ground
    pub rotation_deg: f32,
}

impl MarkerIcon {
    pub fn for_vessel(record: &VesselRecord) -> Self {
        Self {
            color: status_color(record.status),
            rotation_deg: record.course.unwrap_or(0.0),
        }
    }
}

fn status_color(status: Option<NavStatus>) -> &'static str {
    match status {
        Some(NavStatus::UnderWayUsingEngine) => "#2e7d32",
        Some(NavStatus::AtAnchor) => "#ef6c00",
        Some(NavStatus::Moored) => "#c62828",
        Some(NavStatus::EngagedInFishing) => "#1565c0",
        Some(NavStatus::UnderWaySailing) => "#00838f",
        _ => "#757575",
    }
}

/// Popup body for one vessel marker.
pub fn popup_html(record: &VesselRecord) -> String {
    let name = record
        .vessel_name
        .clone()
        .unwrap_or_else(|| format!("Unknown Vessel {}", record.mmsi));
    let mut html = format!("<strong>{}</strong><br>MMSI: {}", name, record.mmsi);
    if let Some(status) = record.status {
        html.push_str(&format!("<br>Status: {status}"));
    }
    if let Some(speed) = record.speed {
        html.push_str(&format!("<br>Speed: {speed:.1} kn"));
    }
    if let Some(course) = record.course {
        html.push_str(&format!("<br>Course: {course:.0}&deg;"));
    }
    if let Some(destination) = &record.destination {
        html.push_str(&format!("<br>Destination: {destination}"));
    }
    html
}

/// Handle to one marker owned by a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MarkerId(pub u64);

/// Seam to the external map widget.
///
/// The adapter drives it through marker handles; implementations own
/// the marker objects and release them on `remove_marker`/`destroy`.
pub trait MarkerSurface {
    /// Create a marker bound to `mmsi` so that selecting it on the map
    /// can designate the vessel.
    fn add_marker(
        &mut self,
        mmsi: Mmsi,
        lat: f64,
        lon: f64,
        icon: MarkerIcon,
        popup: String,
    ) -> MarkerId;
    fn move_marker(&mut self, id: MarkerId, lat: f64, lon: f64);
    fn set_icon(&mut self, id: MarkerId, icon: MarkerIcon);
    /// Replace popup content without changing its open/closed state.
    fn set_popup(&mut self, id: MarkerId, popup: String);
    fn remove_marker(&mut self, id: MarkerId);
    /// Static decoration, placed once at initialization.
    fn add_port(&mut self, port: &Port);
    fn destroy(&mut self);
}

/// One rendered vessel marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerFeature {
    pub mmsi: Mmsi,
    pub lat: f64,
    pub lon: f64,
    pub icon: MarkerIcon,
    pub popup: String,
    pub popup_open: bool,
}

/// In-memory marker surface, served as JSON for a client-side map.
#[derive(Debug, Default)]
pub struct MarkerLayer {
    next_id: u64,
    features: HashMap<MarkerId, MarkerFeature>,
    ports: Vec<Port>,
}

impl MarkerLayer {
    pub fn features(&self) -> impl Iterator<Item = &MarkerFeature> {
        self.features.values()
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn open_popup(&mut self, id: MarkerId) {
        if let Some(feature) = self.features.get_mut(&id) {
            feature.popup_open = true;
        }
    }

    pub fn close_popup(&mut self, id: MarkerId) {
        if let Some(feature) = self.features.get_mut(&id) {
            feature.popup_open = false;
        }
    }
}

impl MarkerSurface for MarkerLayer {
    fn add_marker(
        &mut self,
        mmsi: Mmsi,
        lat: f64,
        lon: f64,
        icon: MarkerIcon,
        popup: String,
    ) -> MarkerId {
        self.next_id += 1;
        let id = MarkerId(self.next_id);
        self.features.insert(
            id,
            MarkerFeature {
                mmsi,
                lat,
                lon,
                icon,
                popup,
                popup_open: false,
            },
        );
        id
    }

    fn move_marker(&mut self, id: MarkerId, lat: f64, lon: f64) {
        if let Some(feature) = self.features.get_mut(&id) {
            feature.lat = lat;
            feature.lon = lon;
        }
    }

    fn set_icon(&mut self, id: MarkerId, icon: MarkerIcon) {
        if let Some(feature) = self.features.get_mut(&id) {
            feature.icon = icon;
        }
    }

    fn set_popup(&mut self, id: MarkerId, popup: String) {
        if let Some(feature) = self.features.get_mut(&id) {
            // open state untouched, the user may be reading it
            feature.popup = popup;
        }
    }

    fn remove_marker(&mut self, id: MarkerId) {
        self.features.remove(&id);
    }

    fn add_port(&mut self, port: &Port) {
        self.ports.push(*port);
    }

    fn destroy(&mut self) {
        self.features.clear();
        self.ports.clear();
    }
}

/// Whether the map pane can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MapStatus {
    /// Initial state, also what the view renders as its loading placeholder
    NotLoaded,
    Ready,
    /// Surface load failed or timed out; the pane stays on its placeholder
    Failed,
}

enum SurfaceState<S> {
    NotLoaded,
    Ready(S),
    Failed,
}

/// Owns the map surface and the MMSI -> marker registry.
pub struct MapAdapter<S> {
    state: SurfaceState<S>,
    markers: HashMap<Mmsi, MarkerId>,
}

impl<S: MarkerSurface> Default for MapAdapter<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: MarkerSurface> MapAdapter<S> {
    pub fn new() -> Self {
        Self {
            state: SurfaceState::NotLoaded,
            markers: HashMap::new(),
        }
    }

    /// Acquire the surface, once.
    ///
    /// The load future runs under `load_timeout`; a failure or timeout
    /// parks the adapter in the failed state and every later call is a
    /// no-op, so only one load is ever in flight. Port decorations are
    /// placed as part of a successful load.
    pub async fn initialize<F>(&mut self, load: F, load_timeout: Duration)
    where
        F: Future<Output = Result<S, DashboardError>>,
    {
        if !matches!(self.state, SurfaceState::NotLoaded) {
            return;
        }
        match timeout(load_timeout, load).await {
            Ok(Ok(mut surface)) => {
                for port in &PORTS {
                    surface.add_port(port);
                }
                self.state = SurfaceState::Ready(surface);
                info!("map surface ready");
            }
            Ok(Err(e)) => {
                warn!("map surface failed to load: {e}");
                self.state = SurfaceState::Failed;
            }
            Err(_) => {
                warn!("map surface load timed out");
                self.state = SurfaceState::Failed;
            }
        }
    }

    pub fn status(&self) -> MapStatus {
        match self.state {
            SurfaceState::NotLoaded => MapStatus::NotLoaded,
            SurfaceState::Ready(_) => MapStatus::Ready,
            SurfaceState::Failed => MapStatus::Failed,
        }
    }

    pub fn surface(&self) -> Option<&S> {
        match &self.state {
            SurfaceState::Ready(surface) => Some(surface),
            _ => None,
        }
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        match &mut self.state {
            SurfaceState::Ready(surface) => Some(surface),
            _ => None,
        }
    }

    pub fn marker_id(&self, mmsi: Mmsi) -> Option<MarkerId> {
        self.markers.get(&mmsi).copied()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn marker_mmsis(&self) -> impl Iterator<Item = Mmsi> + '_ {
        self.markers.keys().copied()
    }

    /// Bring the marker set in line with the vessel collection.
    ///
    /// Runs the removal pass first, then add/update, so that after this
    /// returns the registry keys equal exactly the set of vessels with
    /// known coordinates. Existing markers are updated in place.
    pub fn sync<'a>(&mut self, vessels: impl Iterator<Item = &'a VesselRecord>) {
        let SurfaceState::Ready(surface) = &mut self.state else {
            return;
        };

        let renderable: Vec<(&VesselRecord, (f64, f64))> = vessels
            .filter_map(|record| record.coordinates().map(|coords| (record, coords)))
            .collect();

        // removal pass
        let keep: std::collections::HashSet<Mmsi> =
            renderable.iter().map(|(record, _)| record.mmsi).collect();
        self.markers.retain(|mmsi, id| {
            if keep.contains(mmsi) {
                true
            } else {
                surface.remove_marker(*id);
                false
            }
        });

        // add/update pass
        for (record, (lat, lon)) in renderable {
            let icon = MarkerIcon::for_vessel(record);
            let popup = popup_html(record);
            match self.markers.get(&record.mmsi) {
                Some(&id) => {
                    surface.move_marker(id, lat, lon);
                    surface.set_icon(id, icon);
                    surface.set_popup(id, popup);
                }
                None => {
                    let id = surface.add_marker(record.mmsi, lat, lon, icon, popup);
                    self.markers.insert(record.mmsi, id);
                }
            }
        }
    }

    /// Release every marker and the surface itself.
    pub fn teardown(&mut self) {
        self.markers.clear();
        if let SurfaceState::Ready(surface) = &mut self.state {
            surface.destroy();
        }
        self.state = SurfaceState::NotLoaded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn mmsi(value: u32) -> Mmsi {
        Mmsi::try_from(value).unwrap()
    }

    fn vessel(value: u32, coords: Option<(f64, f64)>) -> VesselRecord {
        let mut record = VesselRecord::new(mmsi(value));
        if let Some((lat, lon)) = coords {
            record.latitude = Some(lat);
            record.longitude = Some(lon);
        }
        record
    }

    /// Surface double that counts widget operations.
    #[derive(Default)]
    struct RecordingSurface {
        next_id: u64,
        live: HashSet<MarkerId>,
        adds: usize,
        moves: usize,
        removes: usize,
        ports: usize,
        destroyed: bool,
    }

    impl MarkerSurface for RecordingSurface {
        fn add_marker(
            &mut self,
            _mmsi: Mmsi,
            _lat: f64,
            _lon: f64,
            _icon: MarkerIcon,
            _popup: String,
        ) -> MarkerId {
            self.next_id += 1;
            self.adds += 1;
            let id = MarkerId(self.next_id);
            self.live.insert(id);
            id
        }

        fn move_marker(&mut self, _id: MarkerId, _lat: f64, _lon: f64) {
            self.moves += 1;
        }

        fn set_icon(&mut self, _id: MarkerId, _icon: MarkerIcon) {}

        fn set_popup(&mut self, _id: MarkerId, _popup: String) {}

        fn remove_marker(&mut self, id: MarkerId) {
            self.removes += 1;
            self.live.remove(&id);
        }

        fn add_port(&mut self, _port: &Port) {
            self.ports += 1;
        }

        fn destroy(&mut self) {
            self.destroyed = true;
            self.live.clear();
        }
    }

    async fn ready_adapter() -> MapAdapter<RecordingSurface> {
        let mut adapter = MapAdapter::new();
        adapter
            .initialize(
                async { Ok(RecordingSurface::default()) },
                Duration::from_secs(1),
            )
            .await;
        assert_eq!(adapter.status(), MapStatus::Ready);
        adapter
    }

    #[tokio::test]
    async fn registry_matches_renderable_set() {
        let mut adapter = ready_adapter().await;
        let with_fix = vessel(111, Some((21.0, 39.0)));
        let also_fix = vessel(222, Some((22.0, 40.0)));
        let no_fix = vessel(333, None);

        adapter.sync([&with_fix, &also_fix, &no_fix].into_iter());

        let tracked: HashSet<u32> = adapter.marker_mmsis().map(|m| m.value()).collect();
        assert_eq!(tracked, HashSet::from([111, 222]));

        // one vessel drops out of the set
        adapter.sync([&with_fix].into_iter());
        let tracked: HashSet<u32> = adapter.marker_mmsis().map(|m| m.value()).collect();
        assert_eq!(tracked, HashSet::from([111]));
        assert_eq!(adapter.surface().unwrap().removes, 1);
        assert_eq!(adapter.surface().unwrap().live.len(), 1);
    }

    #[tokio::test]
    async fn markers_update_in_place() {
        let mut adapter = ready_adapter().await;
        let mut record = vessel(111, Some((21.0, 39.0)));

        adapter.sync([&record].into_iter());
        record.latitude = Some(21.5);
        record.course = Some(90.0);
        adapter.sync([&record].into_iter());

        let surface = adapter.surface().unwrap();
        assert_eq!(surface.adds, 1);
        assert_eq!(surface.moves, 1);
        assert_eq!(adapter.marker_count(), 1);
    }

    #[tokio::test]
    async fn ports_placed_once_at_init() {
        let adapter = ready_adapter().await;
        assert_eq!(adapter.surface().unwrap().ports, PORTS.len());
    }

    #[tokio::test]
    async fn load_timeout_leaves_map_unusable_but_harmless() {
        let mut adapter: MapAdapter<RecordingSurface> = MapAdapter::new();
        adapter
            .initialize(
                async {
                    std::future::pending::<()>().await;
                    Ok(RecordingSurface::default())
                },
                Duration::from_millis(10),
            )
            .await;

        assert_eq!(adapter.status(), MapStatus::Failed);

        // the failed state is sticky and sync is a no-op
        adapter
            .initialize(
                async { Ok(RecordingSurface::default()) },
                Duration::from_millis(10),
            )
            .await;
        assert_eq!(adapter.status(), MapStatus::Failed);

        let record = vessel(111, Some((21.0, 39.0)));
        adapter.sync([&record].into_iter());
        assert_eq!(adapter.marker_count(), 0);
    }

    #[tokio::test]
    async fn load_error_marks_failure() {
        let mut adapter: MapAdapter<RecordingSurface> = MapAdapter::new();
        adapter
            .initialize(
                async { Err(DashboardError::SurfaceError("no widget".to_string())) },
                Duration::from_secs(1),
            )
            .await;
        assert_eq!(adapter.status(), MapStatus::Failed);
    }

    #[tokio::test]
    async fn teardown_releases_everything() {
        let mut adapter = ready_adapter().await;
        let record = vessel(111, Some((21.0, 39.0)));
        adapter.sync([&record].into_iter());

        adapter.teardown();

        assert_eq!(adapter.marker_count(), 0);
        assert_eq!(adapter.status(), MapStatus::NotLoaded);
    }

    #[tokio::test]
    async fn layer_keeps_popup_open_across_updates() {
        let mut adapter: MapAdapter<MarkerLayer> = MapAdapter::new();
        adapter
            .initialize(async { Ok(MarkerLayer::default()) }, Duration::from_secs(1))
            .await;

        let mut record = vessel(111, Some((21.0, 39.0)));
        record.vessel_name = Some("Saudi Trader".to_string());
        adapter.sync([&record].into_iter());

        let id = adapter.marker_id(mmsi(111)).unwrap();
        adapter.surface_mut().unwrap().open_popup(id);

        record.speed = Some(14.0);
        adapter.sync([&record].into_iter());

        let feature = adapter
            .surface()
            .unwrap()
            .features()
            .find(|f| f.mmsi == mmsi(111))
            .unwrap();
        assert!(feature.popup_open);
        assert!(feature.popup.contains("14.0 kn"));
        assert!(feature.popup.contains("Saudi Trader"));
    }

    #[test]
    fn icon_palette() {
        let mut record = vessel(111, Some((21.0, 39.0)));
        record.status = Some(NavStatus::AtAnchor);
        record.course = Some(270.0);

        let icon = MarkerIcon::for_vessel(&record);
        assert_eq!(icon.color, "#ef6c00");
        assert_eq!(icon.rotation_deg, 270.0);

        record.status = None;
        assert_eq!(MarkerIcon::for_vessel(&record).color, "#757575");
    }
}
