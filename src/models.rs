//! Data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::errors::DashboardError;
use serde_helpers::*;

/// Maritime Mobile Service Identity (MMSI)
///
/// A unique nine-digit number for identifying vessels in AIS messages.
/// Serialized as a string, since it is a key rather than a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mmsi(u32);

impl TryFrom<u32> for Mmsi {
    type Error = DashboardError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value > 999_999_999 {
            return Err(DashboardError::InvalidMmsi(value.to_string()));
        }
        Ok(Self(value))
    }
}

impl TryFrom<&str> for Mmsi {
    type Error = DashboardError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let parsed = value
            .parse::<u32>()
            .map_err(|_| DashboardError::InvalidMmsi(value.to_string()))?;
        Self::try_from(parsed)
    }
}

impl Mmsi {
    /// Get the raw MMSI value
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Mmsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Mmsi {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Navigational status category
///
/// AIS codes 0-8 map to named states; every other code, including the
/// "not defined" sentinel 15, reads as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavStatus {
    UnderWayUsingEngine,
    AtAnchor,
    NotUnderCommand,
    RestrictedManoeuvrability,
    ConstrainedByDraught,
    Moored,
    Aground,
    EngagedInFishing,
    UnderWaySailing,
    Unknown,
}

impl NavStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::UnderWayUsingEngine,
            1 => Self::AtAnchor,
            2 => Self::NotUnderCommand,
            3 => Self::RestrictedManoeuvrability,
            4 => Self::ConstrainedByDraught,
            5 => Self::Moored,
            6 => Self::Aground,
            7 => Self::EngagedInFishing,
            8 => Self::UnderWaySailing,
            _ => Self::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::UnderWayUsingEngine => "Under way using engine",
            Self::AtAnchor => "At anchor",
            Self::NotUnderCommand => "Not under command",
            Self::RestrictedManoeuvrability => "Restricted manoeuvrability",
            Self::ConstrainedByDraught => "Constrained by her draught",
            Self::Moored => "Moored",
            Self::Aground => "Aground",
            Self::EngagedInFishing => "Engaged in Fishing",
            Self::UnderWaySailing => "Under way sailing",
            Self::Unknown => "Unknown",
        }
    }

    /// Inverse of [`label`](Self::label), for status strings read back
    /// from the store. Unrecognized strings map to `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Under way using engine" => Self::UnderWayUsingEngine,
            "At anchor" => Self::AtAnchor,
            "Not under command" => Self::NotUnderCommand,
            "Restricted manoeuvrability" => Self::RestrictedManoeuvrability,
            "Constrained by her draught" => Self::ConstrainedByDraught,
            "Moored" => Self::Moored,
            "Aground" => Self::Aground,
            "Engaged in Fishing" => Self::EngagedInFishing,
            "Under way sailing" => Self::UnderWaySailing,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for NavStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for NavStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

/// Vessel type category
///
/// AIS ship type codes collapse into four named ranges:
/// - 30-32 fishing
/// - 60-69 passenger
/// - 70-79 cargo
/// - 80-89 tanker
///
/// Everything else, including the undefined code 0, is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VesselType {
    Fishing,
    Passenger,
    Cargo,
    Tanker,
    Other,
}

impl VesselType {
    pub fn from_code(code: u8) -> Self {
        match code {
            30..=32 => Self::Fishing,
            60..=69 => Self::Passenger,
            70..=79 => Self::Cargo,
            80..=89 => Self::Tanker,
            _ => Self::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Fishing => "Fishing",
            Self::Passenger => "Passenger",
            Self::Cargo => "Cargo",
            Self::Tanker => "Tanker",
            Self::Other => "Other",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            "Fishing" => Self::Fishing,
            "Passenger" => Self::Passenger,
            "Cargo" => Self::Cargo,
            "Tanker" => Self::Tanker,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for VesselType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for VesselType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

/// A monitored Saudi Arabian port.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Port {
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
}

/// Reference ports, loaded once and never mutated.
pub const PORTS: [Port; 6] = [
    Port {
        name: "Jeddah",
        lat: 21.4858,
        lon: 39.1925,
    },
    Port {
        name: "Dammam",
        lat: 26.3927,
        lon: 50.1059,
    },
    Port {
        name: "Yanbu",
        lat: 24.0896,
        lon: 38.0618,
    },
    Port {
        name: "Jizan",
        lat: 16.8892,
        lon: 42.5511,
    },
    Port {
        name: "Jubail",
        lat: 27.0174,
        lon: 49.6590,
    },
    Port {
        name: "Ras Tanura",
        lat: 26.6444,
        lon: 50.1583,
    },
];

pub fn port_by_name(name: &str) -> Option<&'static Port> {
    PORTS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Position report payload, as published on the realtime channel.
///
/// Speed, course and heading carry AIS "not available" sentinels
/// (102.3, 360 and 511 respectively) which deserialize to `None`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PositionPayload {
    #[serde(rename = "UserID")]
    pub user_id: Option<u32>,
    #[serde(rename = "Latitude")]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitude")]
    pub longitude: Option<f64>,
    /// Speed over ground in knots
    #[serde(rename = "Sog", default, deserialize_with = "deserialize_sog")]
    pub sog: Option<f32>,
    /// Course over ground in degrees
    #[serde(rename = "Cog", default, deserialize_with = "deserialize_cog")]
    pub cog: Option<f32>,
    /// Raw navigational status code, mapped through [`NavStatus::from_code`]
    #[serde(rename = "NavigationalStatus")]
    pub navigational_status: Option<u8>,
    /// Heading in degrees (0-359)
    #[serde(rename = "TrueHeading", default, deserialize_with = "deserialize_heading")]
    pub true_heading: Option<u16>,
}

/// Ship static data payload, as published on the realtime channel.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct StaticPayload {
    #[serde(rename = "UserID")]
    pub user_id: Option<u32>,
    #[serde(
        rename = "VesselName",
        default,
        deserialize_with = "deserialize_trimmed_string"
    )]
    pub vessel_name: Option<String>,
    #[serde(
        rename = "CallSign",
        default,
        deserialize_with = "deserialize_trimmed_string"
    )]
    pub call_sign: Option<String>,
    /// IMO number, `None` if not available (0)
    #[serde(rename = "ImoNumber", default, deserialize_with = "deserialize_imo")]
    pub imo_number: Option<u32>,
    #[serde(
        rename = "Destination",
        default,
        deserialize_with = "deserialize_trimmed_string"
    )]
    pub destination: Option<String>,
    /// Raw ship type code, mapped through [`VesselType::from_code`]
    #[serde(rename = "Type")]
    pub type_code: Option<u8>,
}

/// Receiver-side metadata attached to every envelope.
///
/// Used only as a fallback source: identifier when `UserID` is missing,
/// position enrichment on static reports, and ship name.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MetaData {
    #[serde(rename = "MMSI")]
    pub mmsi: Option<u32>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(
        rename = "ShipName",
        default,
        deserialize_with = "deserialize_trimmed_string"
    )]
    pub ship_name: Option<String>,
}

/// One message from the inbound realtime channel.
///
/// `message_type` discriminates which of the two payload slots is
/// populated; an unknown discriminator leaves both empty and the
/// message is dropped downstream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamEnvelope {
    #[serde(rename = "MessageType")]
    pub message_type: String,
    #[serde(rename = "Message", default)]
    pub message: MessageBody,
    #[serde(rename = "MetaData", default)]
    pub metadata: MetaData,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MessageBody {
    #[serde(rename = "PositionReport")]
    pub position_report: Option<PositionPayload>,
    #[serde(rename = "ShipStaticData")]
    pub ship_static_data: Option<StaticPayload>,
}

/// One tracked vessel, a progressive merge of every accepted update
/// for its MMSI.
///
/// Positional and static halves fill in independently; a field stays
/// `None` until some update carries it and keeps its last value after.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VesselRecord {
    pub mmsi: Mmsi,
    pub vessel_name: Option<String>,
    pub call_sign: Option<String>,
    pub imo_number: Option<u32>,
    pub destination: Option<String>,
    pub vessel_type: Option<VesselType>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Speed over ground in knots
    pub speed: Option<f32>,
    /// Course over ground in degrees
    pub course: Option<f32>,
    pub heading: Option<u16>,
    pub status: Option<NavStatus>,
    /// Time of the last positional update
    pub timestamp: Option<DateTime<Utc>>,
}

impl VesselRecord {
    pub fn new(mmsi: Mmsi) -> Self {
        Self {
            mmsi,
            vessel_name: None,
            call_sign: None,
            imo_number: None,
            destination: None,
            vessel_type: None,
            latitude: None,
            longitude: None,
            speed: None,
            course: None,
            heading: None,
            status: None,
            timestamp: None,
        }
    }

    /// Both coordinates, when the record has a known position.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// One row of the historical vessel query.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalVessel {
    pub mmsi: Mmsi,
    pub vessel_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<f32>,
    pub course: Option<f32>,
    pub status: Option<NavStatus>,
    pub last_update: Option<DateTime<Utc>>,
    pub vessel_type: Option<VesselType>,
}

/// Custom deserializers
mod serde_helpers {
    use serde::{self, Deserialize, Deserializer};

    pub fn deserialize_sog<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<f32>::deserialize(deserializer)?;
        Ok(value.filter(|v| *v != 102.3))
    }

    pub fn deserialize_cog<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<f32>::deserialize(deserializer)?;
        Ok(value.filter(|v| *v != 360.0))
    }

    pub fn deserialize_heading<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<u16>::deserialize(deserializer)?;
        Ok(value.filter(|v| *v != 511))
    }

    pub fn deserialize_imo<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<u32>::deserialize(deserializer)?;
        Ok(value.filter(|v| *v != 0))
    }

    pub fn deserialize_trimmed_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        Ok(s.and_then(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }))
    }
}
