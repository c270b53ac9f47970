//! MQTT adapter errors.

/// Errors raised while setting up the MQTT bridge.
#[derive(Debug, thiserror::Error)]
pub enum MqttBridgeError {
    /// The configured broker url could not be split into host and port.
    #[error("invalid broker url `{0}`")]
    InvalidBrokerUrl(String),
}
