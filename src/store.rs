//! Historical vessel store.
//!
//! The ingestion worker writes last-known vessel state into Postgres;
//! the dashboard only reads it back, once at startup and on explicit
//! reload.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::warn;

use crate::errors::DashboardError;
use crate::models::{HistoricalVessel, Mmsi, NavStatus, VesselType};

pub struct VesselStore {
    pool: PgPool,
}

impl VesselStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, DashboardError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), DashboardError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// The historical vessel query: last known state of every vessel
    /// that has ever reported a position.
    pub async fn fetch_all(&self) -> Result<Vec<HistoricalVessel>, DashboardError> {
        let rows: Vec<VesselRow> = sqlx::query_as(
            "SELECT mmsi, vessel_name, latitude, longitude, speed, course, \
                    status, last_update, vessel_type \
             FROM vessels \
             WHERE latitude IS NOT NULL AND longitude IS NOT NULL \
             ORDER BY mmsi",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(VesselRow::into_historical).collect())
    }
}

#[derive(Debug, FromRow)]
struct VesselRow {
    mmsi: i64,
    vessel_name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    speed: Option<f32>,
    course: Option<f32>,
    status: Option<String>,
    last_update: Option<DateTime<Utc>>,
    vessel_type: Option<String>,
}

impl VesselRow {
    fn into_historical(self) -> Option<HistoricalVessel> {
        let mmsi = u32::try_from(self.mmsi)
            .ok()
            .and_then(|value| Mmsi::try_from(value).ok());
        let Some(mmsi) = mmsi else {
            warn!(mmsi = self.mmsi, "skipping stored vessel with invalid MMSI");
            return None;
        };
        Some(HistoricalVessel {
            mmsi,
            vessel_name: self.vessel_name,
            latitude: self.latitude,
            longitude: self.longitude,
            speed: self.speed,
            course: self.course,
            status: self.status.as_deref().map(NavStatus::from_label),
            last_update: self.last_update,
            vessel_type: self.vessel_type.as_deref().map(VesselType::from_label),
        })
    }
}
