//! Realtime channel subscription.

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};

use crate::{config::MqttConfig, errors::DashboardError, models::StreamEnvelope};

/// Wait between poll attempts after a transport error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Events delivered to the dashboard driver.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// Parsed inbound AIS message
    Message(StreamEnvelope),
    /// Broker connection (re-)established, subscription in place
    Connected,
    /// Broker connection lost; the client keeps retrying on its own
    Disconnected,
}

/// Builder for a channel subscription
pub struct BridgeBuilder {
    client: AsyncClient,
    event_loop: EventLoop,
    tx: mpsc::Sender<BridgeEvent>,
    rx: mpsc::Receiver<BridgeEvent>,
}

/// Owned handle to a live subscription.
///
/// Dropping the handle detaches the listener deterministically: the
/// background event loop task is aborted and no further events are
/// delivered to anyone.
pub struct Subscription {
    _client: AsyncClient,
    rx: mpsc::Receiver<BridgeEvent>,
    handle: tokio::task::JoinHandle<()>,
}

impl BridgeBuilder {
    /// Create a new MQTT client for the configured broker
    pub fn new(config: &MqttConfig) -> Result<Self, DashboardError> {
        let mut mqtt_options =
            MqttOptions::new(config.client_id.as_str(), config.host.as_str(), config.port);

        mqtt_options.set_transport(Transport::wss_with_default_config());
        mqtt_options.set_keep_alive(Duration::from_secs(5));

        let (client, event_loop) = AsyncClient::new(mqtt_options, 100);

        // Channel between the spawned event loop and the driver
        let (tx, rx) = mpsc::channel(100);

        Ok(Self {
            client,
            event_loop,
            tx,
            rx,
        })
    }

    /// Connect to the broker and subscribe to the inbound topic.
    ///
    /// Note: the subscription itself is established from the event
    /// loop on every ConnAck, because the broker forgets topic
    /// subscriptions across reconnects.
    pub async fn connect(self, topic: &str) -> Result<Subscription, DashboardError> {
        let handle = tokio::spawn(Self::process_events(
            self.tx,
            self.event_loop,
            self.client.clone(), // Clone client for event loop
            topic.to_string(),
        ));

        Ok(Subscription {
            _client: self.client,
            rx: self.rx,
            handle,
        })
    }

    /// Process MQTT events
    ///
    /// Malformed publishes are logged and skipped; they must never take
    /// the subscription down. Transport errors surface as a
    /// `Disconnected` event and the loop keeps polling, since `rumqttc`
    /// reconnects by itself.
    async fn process_events(
        tx: mpsc::Sender<BridgeEvent>,
        mut event_loop: EventLoop,
        client: AsyncClient,
        topic: String,
    ) {
        loop {
            let event = match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("connected to broker, subscribing to topic: {}", topic);
                    if let Err(e) = client.subscribe(topic.as_str(), QoS::AtLeastOnce).await {
                        error!("failed to subscribe: {}", e);
                        break;
                    }
                    BridgeEvent::Connected
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match parse_message(&publish.payload) {
                        Ok(envelope) => BridgeEvent::Message(envelope),
                        Err(e) => {
                            warn!("discarding malformed AIS message: {}", e);
                            continue;
                        }
                    }
                }
                Ok(_) => continue,
                Err(e) => {
                    error!("MQTT error: {}", e);
                    if tx.send(BridgeEvent::Disconnected).await.is_err() {
                        break;
                    }
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    continue;
                }
            };

            if tx.send(event).await.is_err() {
                // Receiver gone, the subscription handle was dropped
                break;
            }
        }
    }
}

/// Parse one raw payload from the channel
pub fn parse_message(payload: &[u8]) -> Result<StreamEnvelope, DashboardError> {
    Ok(serde_json::from_slice(payload)?)
}

impl Subscription {
    /// Receive next event. `None` means the channel closed.
    pub async fn recv(&mut self) -> Option<BridgeEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_position_report_message() {
        let payload = r#"{
            "MessageType": "PositionReport",
            "Message": {
                "PositionReport": {
                    "UserID": 403456789,
                    "Latitude": 21.5,
                    "Longitude": 39.2,
                    "Sog": 12.0,
                    "Cog": 270.0,
                    "NavigationalStatus": 0,
                    "TrueHeading": 268
                }
            },
            "MetaData": {"MMSI": 403456789, "ShipName": "SAUDI TRADER"}
        }"#
        .as_bytes();

        let envelope = parse_message(payload).unwrap();

        assert_eq!(envelope.message_type, "PositionReport");
        let position = envelope.message.position_report.unwrap();
        assert_eq!(position.user_id, Some(403456789));
        assert_eq!(position.latitude, Some(21.5));
        assert_eq!(position.longitude, Some(39.2));
        assert_eq!(position.sog, Some(12.0));
        assert_eq!(position.cog, Some(270.0));
        assert_eq!(position.navigational_status, Some(0));
        assert_eq!(envelope.metadata.ship_name.as_deref(), Some("SAUDI TRADER"));
    }

    #[test]
    fn parse_static_data_message() {
        let payload = r#"{
            "MessageType": "ShipStaticData",
            "Message": {
                "ShipStaticData": {
                    "UserID": 403456789,
                    "VesselName": "GULF STAR",
                    "CallSign": "HZGS",
                    "ImoNumber": 9543756,
                    "Destination": "DAMMAM",
                    "Type": 80
                }
            }
        }"#
        .as_bytes();

        let envelope = parse_message(payload).unwrap();

        assert_eq!(envelope.message_type, "ShipStaticData");
        let statics = envelope.message.ship_static_data.unwrap();
        assert_eq!(statics.vessel_name.as_deref(), Some("GULF STAR"));
        assert_eq!(statics.call_sign.as_deref(), Some("HZGS"));
        assert_eq!(statics.imo_number, Some(9543756));
        assert_eq!(statics.destination.as_deref(), Some("DAMMAM"));
        assert_eq!(statics.type_code, Some(80));
    }

    #[test]
    fn parse_rejects_invalid_json() {
        assert!(parse_message(b"{not json").is_err());
        assert!(parse_message(b"").is_err());
    }
}
