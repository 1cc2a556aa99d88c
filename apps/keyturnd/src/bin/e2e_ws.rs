//! End-to-end relay smoke test: boots keyturnd, connects two websocket
//! clients, and walks the join / relay / leave protocol. Run after
//! `cargo build` from the workspace root.

use std::process::Stdio;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dedicated port.
    let bind = "127.0.0.1:48091";
    let ws_url = format!("ws://{bind}/ws");

    let mut daemon = Command::new("target/debug/keyturnd")
        .env("KEYTURN_BIND", bind)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    tokio::time::sleep(Duration::from_millis(300)).await;
    wait_tcp(bind, Duration::from_secs(10)).await?;

    let res = run_clients(&ws_url).await;

    let _ = daemon.kill().await;
    res?;
    println!("e2e_ws: OK");
    Ok(())
}

async fn wait_tcp(bind: &str, timeout: Duration) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match TcpStream::connect(bind).await {
            Ok(_) => return Ok(()),
            Err(_) if tokio::time::Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn run_clients(ws_url: &str) -> anyhow::Result<()> {
    let (mut p1, _) = connect_async(ws_url).await?;
    send(&mut p1, json!({"type": "join", "roomId": "R", "playerId": "p1"})).await?;
    let state = recv(&mut p1).await?;
    anyhow::ensure!(state["type"] == "room_state", "p1 expected room_state, got {state}");
    anyhow::ensure!(state["playerCount"] == 1, "room should have 1 player: {state}");

    let (mut p2, _) = connect_async(ws_url).await?;
    send(&mut p2, json!({"type": "join", "roomId": "R", "playerId": "p2"})).await?;
    let state = recv(&mut p2).await?;
    anyhow::ensure!(state["playerCount"] == 2, "room should have 2 players: {state}");
    anyhow::ensure!(state["players"] == json!(["p1", "p2"]), "players list: {state}");

    let joined = recv(&mut p1).await?;
    anyhow::ensure!(joined["type"] == "player_joined", "p1 expected player_joined: {joined}");
    anyhow::ensure!(joined["playerId"] == "p2", "wrong joiner: {joined}");

    // Liveness echo, room state irrelevant.
    send(&mut p1, json!({"type": "ping"})).await?;
    let pong = recv(&mut p1).await?;
    anyhow::ensure!(pong["type"] == "pong", "expected pong: {pong}");

    // Application frame: relayed to p2 with the sender stamped, never echoed
    // back to p1.
    send(&mut p1, json!({"type": "move", "x": 3, "y": 4})).await?;
    let moved = recv(&mut p2).await?;
    anyhow::ensure!(moved["type"] == "move", "p2 expected move: {moved}");
    anyhow::ensure!(moved["fromPlayerId"] == "p1", "sender not stamped: {moved}");
    anyhow::ensure!(moved["x"] == 3, "payload not verbatim: {moved}");

    // Malformed frames are dropped without closing the connection.
    p1.send(Message::Text("not json".to_string())).await?;
    send(&mut p1, json!({"type": "ping"})).await?;
    let pong = recv(&mut p1).await?;
    anyhow::ensure!(pong["type"] == "pong", "connection should survive junk: {pong}");

    // p2 disconnects; p1 hears player_left. If the earlier move had been
    // echoed to p1, it would surface here instead and fail the assert.
    p2.close(None).await?;
    let left = recv(&mut p1).await?;
    anyhow::ensure!(left["type"] == "player_left", "p1 expected player_left: {left}");
    anyhow::ensure!(left["playerId"] == "p2", "wrong leaver: {left}");
    anyhow::ensure!(left["playerCount"] == 1, "room should be back to 1: {left}");

    Ok(())
}

async fn send(ws: &mut Ws, frame: Value) -> anyhow::Result<()> {
    ws.send(Message::Text(frame.to_string())).await?;
    Ok(())
}

async fn recv(ws: &mut Ws) -> anyhow::Result<Value> {
    let deadline = Duration::from_secs(5);
    loop {
        let msg = tokio::time::timeout(deadline, ws.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("connection closed"))??;
        match msg {
            Message::Text(s) => return Ok(serde_json::from_str(&s)?),
            _ => continue,
        }
    }
}
