//! # hauslink-adapter-mqtt
//!
//! MQTT adapter — bridges the device-telemetry transport into hauslink.
//!
//! ## Responsibilities
//! - Connect to the broker configured in the document
//! - Subscribe to every device's relevant suffixes after each (re)connect
//! - Publish a discovery announcement once subscriptions are established
//! - Deliver inbound `(topic, payload)` pairs to the engine
//! - Implement the [`TransportPublisher`] port for subscriber commands
//!
//! Everything is QoS 0: inbound drops and failed publishes are logged, never
//! retried (at-most-once end to end). Reconnection is rumqttc's concern; the
//! poll loop just keeps polling.
//!
//! ## Dependency rule
//! Depends on `hauslink-app` and `hauslink-domain`. Never imported by either.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};

use hauslink_app::engine::EngineHandle;
use hauslink_app::ports::TransportPublisher;

mod error;
pub mod topics;

pub use error::MqttBridgeError;

/// Topic announced once after every (re)connect so devices can re-publish
/// their state.
pub const DISCOVERY_TOPIC: &str = "/devices/discovery";

const CLIENT_ID: &str = "hauslink";
const CHANNEL_CAPACITY: usize = 100;
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// The transport bridge. Built in two phases so the publisher port exists
/// before the engine does: [`MqttBridge::new`] prepares the client,
/// [`MqttBridge::start`] spawns the poll loop once an engine handle is
/// available.
pub struct MqttBridge {
    client: AsyncClient,
    eventloop: EventLoop,
    subscriptions: Vec<String>,
}

impl MqttBridge {
    /// Prepare a client for `broker_url`. Nothing touches the network until
    /// [`start`](Self::start).
    ///
    /// `subscriptions` is the per-device topic list (see
    /// [`topics::subscriptions`]); it is re-applied after every reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`MqttBridgeError::InvalidBrokerUrl`] when the url cannot be
    /// split into host and port.
    pub fn new(broker_url: &str, subscriptions: Vec<String>) -> Result<Self, MqttBridgeError> {
        let (host, port) = parse_broker_url(broker_url)?;
        let mut options = MqttOptions::new(CLIENT_ID, host, port);
        options.set_keep_alive(Duration::from_secs(5));

        let (client, eventloop) = AsyncClient::new(options, CHANNEL_CAPACITY);
        Ok(Self {
            client,
            eventloop,
            subscriptions,
        })
    }

    /// The publisher port, usable before and after [`start`](Self::start).
    #[must_use]
    pub fn publisher(&self) -> MqttPublisher {
        MqttPublisher {
            client: self.client.clone(),
        }
    }

    /// Spawn the poll loop delivering inbound messages to the engine.
    pub fn start(self, engine: EngineHandle) {
        tokio::spawn(poll_loop(
            self.client,
            self.eventloop,
            self.subscriptions,
            engine,
        ));
    }
}

/// Split `host[:port]` (optionally `mqtt://` / `tcp://` prefixed) into host
/// and port, defaulting to 1883.
fn parse_broker_url(url: &str) -> Result<(String, u16), MqttBridgeError> {
    let bare = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);
    if bare.is_empty() {
        return Err(MqttBridgeError::InvalidBrokerUrl(url.to_string()));
    }
    match bare.rsplit_once(':') {
        None => Ok((bare.to_string(), 1883)),
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| MqttBridgeError::InvalidBrokerUrl(url.to_string()))?;
            if host.is_empty() {
                return Err(MqttBridgeError::InvalidBrokerUrl(url.to_string()));
            }
            Ok((host.to_string(), port))
        }
    }
}

async fn poll_loop(
    client: AsyncClient,
    mut eventloop: EventLoop,
    subscriptions: Vec<String>,
    engine: EngineHandle,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!("transport connected");
                for topic in &subscriptions {
                    tracing::info!(topic = %topic, "subscribing");
                    if let Err(err) = client.subscribe(topic.clone(), QoS::AtMostOnce).await {
                        tracing::error!(topic = %topic, %err, "subscription failed");
                    }
                }
                if let Err(err) =
                    client.try_publish(DISCOVERY_TOPIC, QoS::AtMostOnce, false, Vec::new())
                {
                    tracing::warn!(%err, "discovery announcement failed");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                engine
                    .transport_message(publish.topic, publish.payload.to_vec())
                    .await;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(%err, "transport connection error");
                tokio::time::sleep(POLL_ERROR_BACKOFF).await;
            }
        }
    }
}

/// [`TransportPublisher`] backed by the rumqttc client's non-blocking
/// request queue.
pub struct MqttPublisher {
    client: AsyncClient,
}

impl TransportPublisher for MqttPublisher {
    fn publish(&self, topic: &str, body: &str) {
        // try_publish keeps the engine's mutation path non-blocking; a full
        // queue counts as the one allowed delivery attempt.
        match self
            .client
            .try_publish(topic, QoS::AtMostOnce, false, body.as_bytes().to_vec())
        {
            Ok(()) => tracing::debug!(topic, "publish queued"),
            Err(err) => tracing::warn!(topic, %err, "publishing failed"),
        }
    }
}
