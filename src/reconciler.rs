//! Vessel state reconciliation.
//!
//! Maintains the per-MMSI vessel collection by folding heterogeneous
//! position/static events into progressive merges, and answers the
//! nearest-to-port query over the current collection.

use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use crate::geo::{haversine_km, within_region};
use crate::models::{
    HistoricalVessel, MetaData, Mmsi, NavStatus, Port, PositionPayload, StaticPayload,
    StreamEnvelope, VesselRecord, VesselType,
};

/// Vessels farther than this from the selected port are not "nearby".
pub const NEARBY_RADIUS_KM: f64 = 100.0;
/// The nearby list is truncated to the closest this-many vessels.
pub const NEARBY_LIMIT: usize = 20;

/// What applying one inbound message did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// First accepted event for this identifier
    Created,
    /// Merged into an existing record
    Updated,
    /// No-op: missing identifier, missing coordinates, or unknown kind
    Dropped,
}

/// One entry of the nearby-vessel list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyVessel {
    pub mmsi: Mmsi,
    /// Distance to the selected port, km, rounded to two decimals
    pub distance_km: f64,
}

/// In-memory vessel collection keyed by MMSI.
///
/// Records are created on the first accepted event and merged in place
/// afterwards; the collection never evicts, so vessels accumulate for
/// the lifetime of the session. Iteration is in insertion order, which
/// is what makes distance ties in [`nearest_to`](Self::nearest_to)
/// deterministic.
#[derive(Debug, Default)]
pub struct VesselReconciler {
    vessels: HashMap<Mmsi, VesselRecord>,
    order: Vec<Mmsi>,
}

impl VesselReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vessels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vessels.is_empty()
    }

    pub fn get(&self, mmsi: Mmsi) -> Option<&VesselRecord> {
        self.vessels.get(&mmsi)
    }

    /// All records, in insertion order.
    pub fn vessels(&self) -> impl Iterator<Item = &VesselRecord> {
        self.order.iter().filter_map(|mmsi| self.vessels.get(mmsi))
    }

    /// Drop every record. Used by the reconnect reset.
    pub fn clear(&mut self) {
        self.vessels.clear();
        self.order.clear();
    }

    /// Fold one inbound message into the collection.
    ///
    /// Messages without a usable identifier, position reports without
    /// both coordinates, and unknown message kinds are dropped without
    /// touching any record.
    pub fn apply(&mut self, envelope: &StreamEnvelope) -> ApplyOutcome {
        match envelope.message_type.as_str() {
            "PositionReport" => match &envelope.message.position_report {
                Some(payload) => self.apply_position(payload, &envelope.metadata),
                None => ApplyOutcome::Dropped,
            },
            "ShipStaticData" => match &envelope.message.ship_static_data {
                Some(payload) => self.apply_static(payload, &envelope.metadata),
                None => ApplyOutcome::Dropped,
            },
            other => {
                debug!(message_type = other, "ignoring unknown message kind");
                ApplyOutcome::Dropped
            }
        }
    }

    fn apply_position(&mut self, payload: &PositionPayload, meta: &MetaData) -> ApplyOutcome {
        let Some(mmsi) = extract_mmsi(payload.user_id, meta) else {
            return ApplyOutcome::Dropped;
        };

        // Partial AIS sentences are routine; a report without both
        // coordinates is skipped, not an error.
        let lat = payload.latitude.or(meta.latitude);
        let lon = payload.longitude.or(meta.longitude);
        let (Some(lat), Some(lon)) = (lat, lon) else {
            debug!(%mmsi, "position report without coordinates, dropped");
            return ApplyOutcome::Dropped;
        };
        if !within_region(lat, lon) {
            debug!(%mmsi, lat, lon, "position outside the monitored region");
        }

        let (record, outcome) = self.entry(mmsi);
        record.latitude = Some(lat);
        record.longitude = Some(lon);
        record.timestamp = Some(Utc::now());
        if let Some(sog) = payload.sog {
            record.speed = Some(sog);
        }
        if let Some(cog) = payload.cog {
            record.course = Some(cog);
        }
        if let Some(heading) = payload.true_heading {
            record.heading = Some(heading);
        }
        if let Some(code) = payload.navigational_status {
            record.status = Some(NavStatus::from_code(code));
        }
        if let Some(name) = &meta.ship_name {
            record.vessel_name = Some(name.clone());
        }
        outcome
    }

    fn apply_static(&mut self, payload: &StaticPayload, meta: &MetaData) -> ApplyOutcome {
        let Some(mmsi) = extract_mmsi(payload.user_id, meta) else {
            return ApplyOutcome::Dropped;
        };

        let (record, outcome) = self.entry(mmsi);
        if let Some(name) = payload.vessel_name.as_ref().or(meta.ship_name.as_ref()) {
            record.vessel_name = Some(name.clone());
        }
        if let Some(call_sign) = &payload.call_sign {
            record.call_sign = Some(call_sign.clone());
        }
        if let Some(imo) = payload.imo_number {
            record.imo_number = Some(imo);
        }
        if let Some(destination) = &payload.destination {
            record.destination = Some(destination.clone());
        }
        if let Some(code) = payload.type_code {
            record.vessel_type = Some(VesselType::from_code(code));
        }
        // Static reports whose receiver metadata carries a fix also
        // refresh the position.
        if let (Some(lat), Some(lon)) = (meta.latitude, meta.longitude) {
            record.latitude = Some(lat);
            record.longitude = Some(lon);
            record.timestamp = Some(Utc::now());
        }
        outcome
    }

    /// Merge one historical row, with the same field-level policy as
    /// live updates.
    pub fn merge_historical(&mut self, vessel: HistoricalVessel) -> ApplyOutcome {
        let (record, outcome) = self.entry(vessel.mmsi);
        if let (Some(lat), Some(lon)) = (vessel.latitude, vessel.longitude) {
            record.latitude = Some(lat);
            record.longitude = Some(lon);
        }
        if let Some(name) = vessel.vessel_name {
            record.vessel_name = Some(name);
        }
        if let Some(speed) = vessel.speed {
            record.speed = Some(speed);
        }
        if let Some(course) = vessel.course {
            record.course = Some(course);
        }
        if let Some(status) = vessel.status {
            record.status = Some(status);
        }
        if let Some(vessel_type) = vessel.vessel_type {
            record.vessel_type = Some(vessel_type);
        }
        if let Some(last_update) = vessel.last_update {
            record.timestamp = Some(last_update);
        }
        outcome
    }

    fn entry(&mut self, mmsi: Mmsi) -> (&mut VesselRecord, ApplyOutcome) {
        use std::collections::hash_map::Entry;

        match self.vessels.entry(mmsi) {
            Entry::Occupied(entry) => (entry.into_mut(), ApplyOutcome::Updated),
            Entry::Vacant(entry) => {
                self.order.push(mmsi);
                (entry.insert(VesselRecord::new(mmsi)), ApplyOutcome::Created)
            }
        }
    }

    /// Vessels with a known position within [`NEARBY_RADIUS_KM`] of the
    /// port, closest first, at most [`NEARBY_LIMIT`] entries. Distance
    /// ties keep insertion order.
    pub fn nearest_to(&self, port: &Port) -> Vec<NearbyVessel> {
        let mut nearby: Vec<NearbyVessel> = self
            .vessels()
            .filter_map(|record| {
                let (lat, lon) = record.coordinates()?;
                let distance = haversine_km(port.lat, port.lon, lat, lon);
                (distance <= NEARBY_RADIUS_KM).then(|| NearbyVessel {
                    mmsi: record.mmsi,
                    distance_km: round2(distance),
                })
            })
            .collect();
        nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        nearby.truncate(NEARBY_LIMIT);
        nearby
    }
}

fn extract_mmsi(raw: Option<u32>, meta: &MetaData) -> Option<Mmsi> {
    let value = raw.or(meta.mmsi)?;
    match Mmsi::try_from(value) {
        Ok(mmsi) => Some(mmsi),
        Err(_) => {
            debug!(value, "ignoring update with invalid MMSI");
            None
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
