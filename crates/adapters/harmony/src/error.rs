//! Harmony adapter errors.

/// Errors raised by the hub link.
#[derive(Debug, thiserror::Error)]
pub enum HarmonyError {
    /// The provisioning request to the hub failed.
    #[error("hub provisioning request failed")]
    Provision(#[from] reqwest::Error),
    /// The hub websocket failed.
    #[error("hub websocket failure")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    /// The provisioning response carried no remote id.
    #[error("hub did not report a remote id")]
    MissingRemoteId,
}
