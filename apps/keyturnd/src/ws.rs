use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use keyproto::{ClientFrame, ServerFrame};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::AppState;

pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| session_task(socket, state))
}

/// One task per connection. Outbound frames go through a bounded channel
/// drained by a writer task, so the registry can fan out without touching
/// the socket directly. Inbound frames are handled to completion in order:
/// a join (including peer notification) finishes before the next frame is
/// read, which is what guarantees peers see `player_joined` before any
/// relayed message from the newcomer.
async fn session_task(socket: WebSocket, state: AppState) {
    let (mut ws_w, mut ws_r) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(32);

    let writer = tokio::spawn(async move {
        while let Some(s) = rx.recv().await {
            if ws_w.send(Message::Text(s)).await.is_err() {
                break;
            }
        }
    });

    // Set once the client joins; a second join moves the member.
    let mut joined: Option<(String, String)> = None;

    while let Some(msg) = ws_r.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(_) => break, // transport error: treated as an implicit leave
        };
        match msg {
            Message::Text(text) => match keyproto::parse_client_frame(&text) {
                Ok(ClientFrame::Join { room_id, player_id }) => {
                    if let Some((old_room, old_id)) = joined.take() {
                        state.rooms.leave(&old_room, &old_id).await;
                    }
                    let snap = state.rooms.join(&room_id, &player_id, tx.clone()).await;
                    info!(room = %room_id, player = %player_id, players = snap.player_count, "player joined");
                    let frame = ServerFrame::RoomState {
                        player_count: snap.player_count,
                        players: snap.players,
                    };
                    if let Ok(s) = serde_json::to_string(&frame) {
                        let _ = tx.send(s).await;
                    }
                    joined = Some((room_id, player_id));
                }
                Ok(ClientFrame::Ping) => {
                    if let Ok(s) = serde_json::to_string(&ServerFrame::Pong {}) {
                        let _ = tx.send(s).await;
                    }
                }
                Ok(ClientFrame::App { ty, body }) => {
                    let Some((room_id, player_id)) = &joined else {
                        debug!(ty = %ty, "application frame before join; dropped");
                        continue;
                    };
                    let out = keyproto::stamp_sender(body, player_id);
                    state.rooms.relay(room_id, player_id, &out).await;
                }
                // Malformed frames are dropped; no error goes back, the
                // connection stays open.
                Err(e) => debug!(err = %e, "malformed frame dropped"),
            },
            Message::Close(_) => break,
            // JSON text protocol only; transport ping/pong is handled by the
            // websocket layer itself.
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    if let Some((room_id, player_id)) = joined {
        state.rooms.leave(&room_id, &player_id).await;
        info!(room = %room_id, player = %player_id, "player left");
    }
    drop(tx);
    let _ = writer.await;
}
