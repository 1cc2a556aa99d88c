//! `keyproto`: JSON frames spoken between keyturn clients and the room relay.
//!
//! Client frames are JSON objects tagged by `"type"`. Two types are control
//! frames the relay handles itself (`join`, `ping`); every other tagged
//! object is an application frame the relay fans out verbatim to the
//! sender's room peers, with `"fromPlayerId"` injected. The relay never
//! interprets application payloads, so this crate keeps them as opaque maps.

use serde::Serialize;
use serde_json::{Map, Value};

/// Field injected into every relayed application frame. The server is
/// authoritative about sender identity; a client-supplied value is
/// overwritten.
pub const FROM_PLAYER_ID: &str = "fromPlayerId";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    NotJson,
    NotObject,
    MissingType,
    BadJoin(&'static str),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::NotJson => write!(f, "frame is not valid JSON"),
            FrameError::NotObject => write!(f, "frame is not a JSON object"),
            FrameError::MissingType => write!(f, "frame has no string \"type\" field"),
            FrameError::BadJoin(field) => write!(f, "join frame missing \"{field}\""),
        }
    }
}

impl std::error::Error for FrameError {}

/// A classified inbound frame. `App` keeps the whole original object so the
/// relay stays payload-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    Join { room_id: String, player_id: String },
    Ping,
    App { ty: String, body: Map<String, Value> },
}

pub fn parse_client_frame(text: &str) -> Result<ClientFrame, FrameError> {
    let value: Value = serde_json::from_str(text).map_err(|_| FrameError::NotJson)?;
    let Value::Object(body) = value else {
        return Err(FrameError::NotObject);
    };
    let Some(ty) = body.get("type").and_then(|t| t.as_str()) else {
        return Err(FrameError::MissingType);
    };
    match ty {
        "join" => {
            let room_id = join_field(&body, "roomId")?;
            let player_id = join_field(&body, "playerId")?;
            Ok(ClientFrame::Join { room_id, player_id })
        }
        "ping" => Ok(ClientFrame::Ping),
        _ => Ok(ClientFrame::App {
            ty: ty.to_string(),
            body,
        }),
    }
}

fn join_field(body: &Map<String, Value>, key: &'static str) -> Result<String, FrameError> {
    body.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or(FrameError::BadJoin(key))
}

/// Serialize an application frame for relay, stamping the sender's id.
pub fn stamp_sender(mut body: Map<String, Value>, player_id: &str) -> String {
    body.insert(
        FROM_PLAYER_ID.to_string(),
        Value::String(player_id.to_string()),
    );
    Value::Object(body).to_string()
}

/// Server->client frames. Tags are snake_case, fields camelCase, matching
/// what the browser client speaks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    /// Sent to a joining member only: its room-state snapshot.
    RoomState {
        player_count: usize,
        players: Vec<String>,
    },
    PlayerJoined {
        player_id: String,
        player_count: usize,
    },
    PlayerLeft {
        player_id: String,
        player_count: usize,
    },
    Pong {},
}
