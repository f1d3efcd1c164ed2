//! Application configuration

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;

use crate::errors::DashboardError;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub mqtt: MqttConfig,
    pub store: StoreConfig,
    pub map: MapConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// Inbound channel carrying the AIS message envelopes
    pub topic: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub url: String,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    /// Delay before the first surface load attempt, to let layout settle
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub settle_delay: Duration,
    /// Ceiling on the surface load itself
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub load_timeout: Duration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub port: u16,
}

impl AppConfig {
    /// Load configuration, preferring environment variables over the
    /// optional config file
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config/default")
    }

    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix("AISDASH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), DashboardError> {
        if self.mqtt.host.trim().is_empty() {
            return Err(ConfigError::Message("mqtt.host cannot be empty".to_string()).into());
        }
        if self.mqtt.topic.trim().is_empty() {
            return Err(ConfigError::Message("mqtt.topic cannot be empty".to_string()).into());
        }
        if self.map.load_timeout.is_zero() {
            return Err(
                ConfigError::Message("map.load_timeout must be greater than zero".to_string())
                    .into(),
            );
        }
        Ok(())
    }
}
