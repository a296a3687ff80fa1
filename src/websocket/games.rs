use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
};
use ethers::types::Address;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

use crate::{
    api::{games::ViewerQuery, resolve_viewer, AppState},
    constants::WS_HEARTBEAT_INTERVAL_SECS,
    error::Result,
    services::{spawn_game_watcher, WatchEvent, WatchHandle},
};

const WATCH_CHANNEL_CAPACITY: usize = 16;

fn connected_payload(game_id: u64, viewer: Option<Address>) -> String {
    serde_json::json!({
        "type": "connected",
        "game_id": game_id,
        "viewer": viewer,
    })
    .to_string()
}

#[derive(Debug, Deserialize)]
struct ClientMessage {
    #[serde(rename = "type")]
    msg_type: String,
}

/// WebSocket handler for live updates of one game.
///
/// Streams `snapshot` events until the watcher stops; a `{"type":"refresh"}`
/// message from the client restarts it, e.g. after the client submitted a move.
pub async fn handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(game_id): Path<u64>,
    Query(query): Query<ViewerQuery>,
) -> Result<Response> {
    let viewer = resolve_viewer(&state, query.viewer.as_deref())?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, game_id, viewer)))
}

fn start_watch(
    state: &AppState,
    game_id: u64,
    viewer: Option<Address>,
) -> (WatchHandle, mpsc::Receiver<WatchEvent>) {
    let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
    let handle = spawn_game_watcher(
        state.contract.clone(),
        game_id,
        viewer,
        Duration::from_millis(state.config.polling_interval_ms),
        tx,
    );
    (handle, rx)
}

async fn handle_socket(socket: WebSocket, state: AppState, game_id: u64, viewer: Option<Address>) {
    let (mut sender, mut receiver) = socket.split();
    let (refresh_tx, mut refresh_rx) = mpsc::channel::<()>(4);

    let _ = sender
        .send(Message::Text(connected_payload(game_id, viewer).into()))
        .await;

    let mut send_task = tokio::spawn(async move {
        let (mut _watch, mut events) = start_watch(&state, game_id, viewer);
        let mut watching = true;
        let mut heartbeat = interval(Duration::from_secs(WS_HEARTBEAT_INTERVAL_SECS));

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                Some(()) = refresh_rx.recv() => {
                    // replacing the handle aborts the previous watcher
                    let (handle, rx) = start_watch(&state, game_id, viewer);
                    _watch = handle;
                    events = rx;
                    watching = true;
                }
                event = events.recv(), if watching => {
                    match event {
                        Some(event) => {
                            let json = serde_json::to_string(&event).unwrap_or_default();
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                        None => watching = false,
                    }
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(message) if message.msg_type == "refresh" => {
                            if refresh_tx.send(()).await.is_err() {
                                break;
                            }
                        }
                        _ => tracing::debug!("Ignoring client message: {}", text),
                    }
                }
                Message::Close(_) => {
                    tracing::info!("Game {} watcher client disconnected", game_id);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    tracing::info!("Game {} WebSocket connection closed", game_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::StopReason;

    #[test]
    fn connected_payload_names_game() {
        let payload: serde_json::Value =
            serde_json::from_str(&connected_payload(7, None)).unwrap();
        assert_eq!(payload["type"], "connected");
        assert_eq!(payload["game_id"], 7);
        assert!(payload["viewer"].is_null());
    }

    #[test]
    fn stop_event_wire_shape() {
        let json = serde_json::to_value(WatchEvent::Stopped {
            reason: StopReason::YourTurn,
        })
        .unwrap();
        assert_eq!(json["type"], "stopped");
        assert_eq!(json["reason"], "your_turn");
    }

    #[test]
    fn refresh_message_parses() {
        let message: ClientMessage = serde_json::from_str(r#"{"type":"refresh"}"#).unwrap();
        assert_eq!(message.msg_type, "refresh");
    }
}
