//! # hauslink-adapter-harmony
//!
//! Harmony hub adapter — the remote-control-hub collaborator.
//!
//! ## Responsibilities
//! - Provision the hub's remote id over HTTP, then hold a WebSocket session
//!   against its local API, reconnecting with a fixed delay
//! - On every (re)connect, signal the engine and issue the two bootstrap
//!   queries (state digest → power + current activity, config → activity
//!   list), feeding the results back as engine events
//! - Forward `stateDigest` notifications to the engine
//! - Implement the [`HubCommands`] port: start-activity and power-off are
//!   queued onto the session, failures logged and never surfaced
//!
//! ## Dependency rule
//! Depends on `hauslink-app` and `hauslink-domain`. Never imported by either.

use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use hauslink_app::engine::EngineHandle;
use hauslink_app::ports::HubCommands;
use hauslink_domain::hub::{ActivityInfo, POWER_ACTIVITY_ID};

mod error;
pub mod protocol;

pub use error::HarmonyError;

const HUB_PORT: u16 = 8088;
const RECONNECT_DELAY: Duration = Duration::from_secs(10);
const DIGEST_REQUEST_ID: &str = "bootstrap-digest";
const CONFIG_REQUEST_ID: &str = "bootstrap-config";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Commands forwarded to the hub session.
#[derive(Debug, Clone, Copy)]
enum HubCommand {
    StartActivity(i64),
    PowerOff,
}

/// [`HubCommands`] port backed by the hub link's command queue.
///
/// Commands issued while the hub is unreachable wait in the queue until the
/// next session; there is no acknowledgement either way.
pub struct HarmonyCommands {
    queue: mpsc::UnboundedSender<HubCommand>,
}

impl HubCommands for HarmonyCommands {
    fn start_activity(&self, activity_id: i64) {
        if self.queue.send(HubCommand::StartActivity(activity_id)).is_err() {
            tracing::warn!(activity_id, "could not start activity, hub link is gone");
        }
    }

    fn power_off(&self) {
        if self.queue.send(HubCommand::PowerOff).is_err() {
            tracing::warn!("could not power off, hub link is gone");
        }
    }
}

/// The hub link. Built in two phases so the command port exists before the
/// engine does: [`HarmonyLink::new`] prepares the command queue,
/// [`HarmonyLink::start`] spawns the session task once an engine handle is
/// available.
pub struct HarmonyLink {
    hub_host: String,
    queue: mpsc::UnboundedSender<HubCommand>,
    commands: mpsc::UnboundedReceiver<HubCommand>,
}

impl HarmonyLink {
    #[must_use]
    pub fn new(hub_host: String) -> Self {
        let (queue, commands) = mpsc::unbounded_channel();
        Self {
            hub_host,
            queue,
            commands,
        }
    }

    /// The command port, usable before and after [`start`](Self::start).
    #[must_use]
    pub fn commands(&self) -> HarmonyCommands {
        HarmonyCommands {
            queue: self.queue.clone(),
        }
    }

    /// Spawn the connect/session loop feeding hub events to the engine.
    pub fn start(self, engine: EngineHandle) {
        tokio::spawn(run(self.hub_host, engine, self.commands));
    }
}

async fn run(
    hub_host: String,
    engine: EngineHandle,
    mut commands: mpsc::UnboundedReceiver<HubCommand>,
) {
    loop {
        match connect(&hub_host).await {
            Ok((ws, remote_id)) => {
                tracing::info!(hub = %hub_host, "connected to hub");
                engine.hub_connected().await;
                if let Err(err) = session(ws, &remote_id, &engine, &mut commands).await {
                    tracing::error!(%err, "hub session ended");
                }
            }
            Err(err) => tracing::error!(hub = %hub_host, %err, "hub connection failed"),
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// Fetch the hub's active remote id, then open the WebSocket session.
async fn connect(hub_host: &str) -> Result<(WsStream, String), HarmonyError> {
    let remote_id = provision(hub_host).await?;
    let url = format!(
        "ws://{hub_host}:{HUB_PORT}/?domain=svcs.myharmony.com&hubId={remote_id}"
    );
    let (ws, _) = tokio_tungstenite::connect_async(&url).await?;
    Ok((ws, remote_id))
}

async fn provision(hub_host: &str) -> Result<String, HarmonyError> {
    let response: serde_json::Value = reqwest::Client::new()
        .post(format!("http://{hub_host}:{HUB_PORT}/"))
        .header("Origin", "http://sl.dhg.myharmony.com")
        .json(&json!({
            "id": 124,
            "cmd": protocol::PROVISION_CMD,
            "params": {},
        }))
        .send()
        .await?
        .json()
        .await?;

    let remote_id = &response["data"]["activeRemoteId"];
    match remote_id {
        serde_json::Value::String(id) => Ok(id.clone()),
        serde_json::Value::Number(id) => Ok(id.to_string()),
        _ => Err(HarmonyError::MissingRemoteId),
    }
}

/// Bootstrap resolutions gathered from the two one-shot queries. The
/// activity list is handed to the engine once both halves are in.
#[derive(Default)]
struct Bootstrap {
    current: Option<i64>,
    activities: Option<Vec<ActivityInfo>>,
    delivered: bool,
}

async fn session(
    ws: WsStream,
    remote_id: &str,
    engine: &EngineHandle,
    commands: &mut mpsc::UnboundedReceiver<HubCommand>,
) -> Result<(), HarmonyError> {
    let (mut sink, mut stream) = ws.split();

    send(
        &mut sink,
        protocol::request(
            remote_id,
            DIGEST_REQUEST_ID,
            protocol::DIGEST_CMD,
            json!({"verb": "get", "format": "json"}),
        ),
    )
    .await?;
    send(
        &mut sink,
        protocol::request(
            remote_id,
            CONFIG_REQUEST_ID,
            protocol::CONFIG_CMD,
            json!({"verb": "get"}),
        ),
    )
    .await?;

    let mut bootstrap = Bootstrap::default();
    loop {
        tokio::select! {
            message = stream.next() => {
                let Some(message) = message else {
                    tracing::info!("hub closed the session");
                    return Ok(());
                };
                if let Message::Text(text) = message? {
                    handle_frame(&text, engine, &mut bootstrap).await;
                }
            }
            command = commands.recv() => {
                let Some(command) = command else { return Ok(()) };
                let (id, activity_id) = match command {
                    HubCommand::StartActivity(activity_id) => ("run-activity", activity_id),
                    HubCommand::PowerOff => ("power-off", POWER_ACTIVITY_ID),
                };
                send(
                    &mut sink,
                    protocol::request(
                        remote_id,
                        id,
                        protocol::RUN_ACTIVITY_CMD,
                        json!({"activityId": activity_id.to_string(), "timestamp": 0}),
                    ),
                )
                .await?;
            }
        }
    }
}

async fn handle_frame(text: &str, engine: &EngineHandle, bootstrap: &mut Bootstrap) {
    let message: protocol::HubMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            tracing::warn!(%err, "undecodable hub frame");
            return;
        }
    };

    // Correlated responses first: a bootstrap response may echo the digest
    // command in its `type` field and must not be mistaken for a
    // notification.
    match message.id.as_deref() {
        Some(DIGEST_REQUEST_ID) => {
            let current = message
                .data
                .as_ref()
                .and_then(protocol::parse_current_activity);
            if let Some(current) = current {
                engine.hub_power(current == POWER_ACTIVITY_ID).await;
                bootstrap.current = Some(current);
                deliver_activities(bootstrap, engine).await;
            }
            return;
        }
        Some(CONFIG_REQUEST_ID) => {
            if let Some(data) = &message.data {
                bootstrap.activities = Some(protocol::parse_activities(data));
                deliver_activities(bootstrap, engine).await;
            }
            return;
        }
        _ => {}
    }

    if message.is_digest_notification()
        && let Some(digest) = message.data.as_ref().and_then(protocol::parse_digest)
    {
        engine.hub_digest(digest).await;
    }
}

async fn deliver_activities(bootstrap: &mut Bootstrap, engine: &EngineHandle) {
    if bootstrap.delivered {
        return;
    }
    if let Some(current) = bootstrap.current
        && let Some(activities) = bootstrap.activities.take()
    {
        bootstrap.delivered = true;
        engine.hub_activities(current, activities).await;
    }
}

async fn send(
    sink: &mut SplitSink<WsStream, Message>,
    request: serde_json::Value,
) -> Result<(), HarmonyError> {
    sink.send(Message::Text(request.to_string().into())).await?;
    Ok(())
}
