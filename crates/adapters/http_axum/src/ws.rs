//! The realtime WebSocket channel.
//!
//! Wire contract: every frame in either direction is a JSON object
//! `{"event": <name>, "payload": <value>}`. On connect the server pushes
//! `dump` (full registry) then `harmony` (hub state), in that order, before
//! anything else; each subsequent change arrives as `data` (one device
//! record) or `harmony`. Clients send `mqtt {topic, body}`,
//! `activity {activityId}`, and `powerOff {}`.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;

use hauslink_app::engine::Command;
use hauslink_app::fanout::Update;

use crate::state::AppState;

/// One realtime frame in either direction.
#[derive(Debug, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

/// `GET /ws` — upgrade to the realtime channel.
pub async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let subscriber_id = uuid::Uuid::new_v4();
    tracing::info!(%subscriber_id, "subscriber connected");

    let (mut sink, mut stream) = socket.split();

    // Subscribe before taking the snapshot so no change between the two is
    // lost; a duplicate update is possible, a gap is not.
    let mut updates = state.engine.updates();

    let Some(snapshot) = state.engine.snapshot().await else {
        tracing::warn!(%subscriber_id, "engine is gone, dropping subscriber");
        return;
    };
    if emit(&mut sink, "dump", &snapshot.devices).await.is_err() {
        return;
    }
    if emit(&mut sink, "harmony", &snapshot.hub).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(Update::Device(record)) => {
                    if emit(&mut sink, "data", &record).await.is_err() {
                        break;
                    }
                }
                Ok(Update::Hub(hub)) => {
                    if emit(&mut sink, "harmony", &hub).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(%subscriber_id, skipped, "subscriber lagged, updates were dropped");
                }
                Err(RecvError::Closed) => break,
            },
            message = stream.next() => {
                let Some(Ok(message)) = message else { break };
                match message {
                    Message::Text(text) => handle_client_frame(&text, &state).await,
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }
    tracing::info!(%subscriber_id, "subscriber disconnected");
}

async fn handle_client_frame(text: &str, state: &AppState) {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(%err, "undecodable subscriber frame");
            return;
        }
    };
    match parse_command(&frame) {
        Some(command) => state.engine.command(command).await,
        // No error ever goes back across the channel.
        None => tracing::warn!(event = %frame.event, "unrecognized subscriber frame"),
    }
}

fn parse_command(frame: &Frame) -> Option<Command> {
    match frame.event.as_str() {
        "mqtt" => {
            #[derive(Deserialize)]
            struct Publish {
                topic: String,
                body: String,
            }
            let payload: Publish = serde_json::from_value(frame.payload.clone()).ok()?;
            Some(Command::Publish {
                topic: payload.topic,
                body: payload.body,
            })
        }
        "activity" => {
            #[derive(Deserialize)]
            struct Activity {
                #[serde(rename = "activityId")]
                activity_id: i64,
            }
            let payload: Activity = serde_json::from_value(frame.payload.clone()).ok()?;
            Some(Command::SetActivity {
                activity_id: payload.activity_id,
            })
        }
        "powerOff" => Some(Command::PowerOff),
        _ => None,
    }
}

async fn emit<T: Serialize>(
    sink: &mut SplitSink<WebSocket, Message>,
    event: &str,
    payload: &T,
) -> Result<(), axum::Error> {
    let frame = serde_json::json!({ "event": event, "payload": payload });
    sink.send(Message::Text(frame.to_string().into())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(event: &str, payload: Value) -> Frame {
        Frame {
            event: event.to_string(),
            payload,
        }
    }

    #[test]
    fn should_parse_mqtt_frame_into_publish_command() {
        let command = parse_command(&frame(
            "mqtt",
            json!({"topic": "/r1/cmd/1", "body": "{\"state\":true}"}),
        ))
        .unwrap();
        assert_eq!(
            command,
            Command::Publish {
                topic: "/r1/cmd/1".to_string(),
                body: "{\"state\":true}".to_string(),
            }
        );
    }

    #[test]
    fn should_parse_activity_frame_with_camel_case_id() {
        let command = parse_command(&frame("activity", json!({"activityId": 28710893}))).unwrap();
        assert_eq!(
            command,
            Command::SetActivity {
                activity_id: 28_710_893
            }
        );
    }

    #[test]
    fn should_parse_power_off_frame_with_empty_payload() {
        let command = parse_command(&frame("powerOff", json!({}))).unwrap();
        assert_eq!(command, Command::PowerOff);
    }

    #[test]
    fn should_reject_unknown_event_names() {
        assert_eq!(parse_command(&frame("restart", json!({}))), None);
    }

    #[test]
    fn should_reject_malformed_payloads() {
        assert_eq!(parse_command(&frame("mqtt", json!({"topic": "/x"}))), None);
        assert_eq!(
            parse_command(&frame("activity", json!({"activityId": "five"}))),
            None
        );
    }

    #[test]
    fn should_default_missing_payload_to_null_when_deserializing_frame() {
        let frame: Frame = serde_json::from_str(r#"{"event":"powerOff"}"#).unwrap();
        assert_eq!(frame.event, "powerOff");
        assert_eq!(frame.payload, Value::Null);
        assert_eq!(parse_command(&frame), Some(Command::PowerOff));
    }
}
