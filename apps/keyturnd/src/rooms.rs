use std::collections::HashMap;

use keyproto::ServerFrame;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// Outbound channel for one session member; the receiving end is drained by
/// that member's websocket writer task.
pub type MemberSender = mpsc::Sender<String>;

/// What a joining member gets back: its room-state snapshot.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub players: Vec<String>,
    pub player_count: usize,
}

/// In-memory room registry. Rooms exist from first join to last leave;
/// nothing is persisted and nothing is replayed. Mutations happen under one
/// lock; sends happen after it is dropped so a slow peer never blocks the
/// registry.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, HashMap<String, MemberSender>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or overwrite) the member's channel in the named room, creating
    /// the room if absent. Peers are notified of the arrival; the snapshot is
    /// for the joining member itself.
    pub async fn join(&self, room_id: &str, player_id: &str, tx: MemberSender) -> RoomSnapshot {
        let (snapshot, peers) = {
            let mut rooms = self.rooms.lock().await;
            let members = rooms.entry(room_id.to_string()).or_default();
            members.insert(player_id.to_string(), tx);
            let mut players: Vec<String> = members.keys().cloned().collect();
            players.sort();
            let peers: Vec<MemberSender> = members
                .iter()
                .filter(|(id, _)| id.as_str() != player_id)
                .map(|(_, tx)| tx.clone())
                .collect();
            (
                RoomSnapshot {
                    player_count: players.len(),
                    players,
                },
                peers,
            )
        };

        let frame = ServerFrame::PlayerJoined {
            player_id: player_id.to_string(),
            player_count: snapshot.player_count,
        };
        if let Ok(s) = serde_json::to_string(&frame) {
            for tx in peers {
                let _ = tx.send(s.clone()).await;
            }
        }
        snapshot
    }

    /// Deliver `text` to every member of the room except the sender. Closed
    /// channels are skipped, not queued. Unknown rooms are a no-op. Returns
    /// the delivery count (observability only).
    pub async fn relay(&self, room_id: &str, sender_id: &str, text: &str) -> usize {
        let peers: Vec<MemberSender> = {
            let rooms = self.rooms.lock().await;
            let Some(members) = rooms.get(room_id) else {
                return 0;
            };
            members
                .iter()
                .filter(|(id, _)| id.as_str() != sender_id)
                .map(|(_, tx)| tx.clone())
                .collect()
        };

        let mut delivered = 0;
        for tx in peers {
            if tx.send(text.to_string()).await.is_ok() {
                delivered += 1;
            }
        }
        debug!(room = %room_id, from = %sender_id, delivered, "relayed frame");
        delivered
    }

    /// Remove the member; delete the room when it empties; notify the rest.
    /// Double-leave is a no-op.
    pub async fn leave(&self, room_id: &str, player_id: &str) {
        let peers = {
            let mut rooms = self.rooms.lock().await;
            let Some(members) = rooms.get_mut(room_id) else {
                return;
            };
            if members.remove(player_id).is_none() {
                return;
            }
            if members.is_empty() {
                rooms.remove(room_id);
                Vec::new()
            } else {
                members.values().cloned().collect::<Vec<_>>()
            }
        };

        let frame = ServerFrame::PlayerLeft {
            player_id: player_id.to_string(),
            player_count: peers.len(),
        };
        if let Ok(s) = serde_json::to_string(&frame) {
            for tx in &peers {
                let _ = tx.send(s.clone()).await;
            }
        }
    }

    #[cfg(test)]
    pub async fn has_room(&self, room_id: &str) -> bool {
        self.rooms.lock().await.contains_key(room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn member() -> (MemberSender, mpsc::Receiver<String>) {
        mpsc::channel(32)
    }

    async fn recv_json(rx: &mut mpsc::Receiver<String>) -> Value {
        let s = rx.recv().await.expect("frame");
        serde_json::from_str(&s).expect("json")
    }

    #[tokio::test]
    async fn join_returns_snapshot_and_notifies_peers() {
        let reg = RoomRegistry::new();
        let (tx1, mut rx1) = member();
        let (tx2, _rx2) = member();

        let snap = reg.join("R", "p1", tx1).await;
        assert_eq!(snap.player_count, 1);
        assert_eq!(snap.players, vec!["p1"]);

        let snap = reg.join("R", "p2", tx2).await;
        assert_eq!(snap.player_count, 2);
        assert_eq!(snap.players, vec!["p1", "p2"]);

        let v = recv_json(&mut rx1).await;
        assert_eq!(v["type"], "player_joined");
        assert_eq!(v["playerId"], "p2");
        assert_eq!(v["playerCount"], 2);
    }

    #[tokio::test]
    async fn relay_skips_the_sender() {
        let reg = RoomRegistry::new();
        let (tx1, mut rx1) = member();
        let (tx2, mut rx2) = member();
        reg.join("R", "p1", tx1).await;
        reg.join("R", "p2", tx2).await;
        let _ = recv_json(&mut rx1).await; // p2's join notification

        let delivered = reg.relay("R", "p1", r#"{"type":"move","fromPlayerId":"p1"}"#).await;
        assert_eq!(delivered, 1);

        let v = recv_json(&mut rx2).await;
        assert_eq!(v["type"], "move");
        assert!(rx1.try_recv().is_err(), "sender must not hear its own message");
    }

    #[tokio::test]
    async fn relay_to_unknown_room_is_a_no_op() {
        let reg = RoomRegistry::new();
        assert_eq!(reg.relay("nope", "p1", "{}").await, 0);
    }

    #[tokio::test]
    async fn closed_channels_are_silently_skipped() {
        let reg = RoomRegistry::new();
        let (tx1, rx1) = member();
        let (tx2, _rx2) = member();
        reg.join("R", "p1", tx1).await;
        reg.join("R", "p2", tx2).await;
        drop(rx1); // p1's connection is gone; its channel is closed

        let delivered = reg.relay("R", "p2", r#"{"type":"move"}"#).await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn leave_notifies_and_empty_rooms_are_deleted() {
        let reg = RoomRegistry::new();
        let (tx1, mut rx1) = member();
        let (tx2, _rx2) = member();
        reg.join("R", "p1", tx1).await;
        reg.join("R", "p2", tx2).await;
        let _ = recv_json(&mut rx1).await;

        reg.leave("R", "p2").await;
        let v = recv_json(&mut rx1).await;
        assert_eq!(v["type"], "player_left");
        assert_eq!(v["playerId"], "p2");
        assert_eq!(v["playerCount"], 1);
        assert!(reg.has_room("R").await);

        reg.leave("R", "p1").await;
        assert!(!reg.has_room("R").await);

        // Double-leave and post-deletion relay are both no-ops.
        reg.leave("R", "p1").await;
        assert_eq!(reg.relay("R", "p1", "{}").await, 0);
    }

    #[tokio::test]
    async fn rejoin_overwrites_the_member_channel() {
        let reg = RoomRegistry::new();
        let (tx_old, mut rx_old) = member();
        let (tx_new, mut rx_new) = member();
        let (tx_peer, _rx_peer) = member();
        reg.join("R", "p1", tx_old).await;
        reg.join("R", "peer", tx_peer).await;
        let _ = recv_json(&mut rx_old).await;

        let snap = reg.join("R", "p1", tx_new).await;
        assert_eq!(snap.player_count, 2);

        reg.relay("R", "peer", r#"{"type":"move"}"#).await;
        let v = recv_json(&mut rx_new).await;
        assert_eq!(v["type"], "move");
        assert!(rx_old.try_recv().is_err());
    }
}
