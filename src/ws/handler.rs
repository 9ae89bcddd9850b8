//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::runner::{InboundEvent, WorldHandle, OUTBOUND_QUEUE};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{encode, ClientMsg, ServerMsg};

/// WebSocket upgrade handler. Joins the least-populated world.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    match state.worlds.least_populated() {
        Some(world) => ws.on_upgrade(move |socket| handle_socket(socket, world)),
        None => {
            error!("WebSocket upgrade refused, no world is running");
            (StatusCode::SERVICE_UNAVAILABLE, "No world available").into_response()
        }
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, world: WorldHandle) {
    let player_id = Uuid::new_v4();
    info!(player_id = %player_id, world_id = %world.id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        player_id,
        server_time: unix_millis(),
    };
    let sent = match encode(&welcome) {
        Ok(json) => ws_sink.send(Message::Text(json)).await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    if let Err(e) = sent {
        error!(player_id = %player_id, error = %e, "Failed to send welcome");
        return;
    }

    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
    let connected = InboundEvent::Connected {
        player_id,
        outbound: outbound_tx,
    };
    if world.inbound_tx.send(connected).await.is_err() {
        warn!(player_id = %player_id, world_id = %world.id, "World stopped before join");
        return;
    }

    run_session(player_id, &world, ws_sink, ws_stream, outbound_rx).await;

    // The world may already be gone; nothing left to clean up then
    let _ = world
        .inbound_tx
        .send(InboundEvent::Disconnected { player_id })
        .await;

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player_id: Uuid,
    world: &WorldHandle,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    mut outbound_rx: mpsc::Receiver<String>,
) {
    let rate_limiter = ConnectionRateLimiter::new();

    // Writer task: world payloads -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(payload) = outbound_rx.recv().await {
            if let Err(e) = ws_sink.send(Message::Text(payload)).await {
                debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> world
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => {
                        let event = InboundEvent::Message { player_id, msg };
                        if world.inbound_tx.send(event).await.is_err() {
                            debug!(player_id = %player_id, "Inbound channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                debug!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}
