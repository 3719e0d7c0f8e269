//! Per-connection session management.
//!
//! Each WebSocket connection gets a [`PlayerSession`] that joins one room,
//! forwards the connection's frames to the room, and forwards the room's
//! frames (plus relay heartbeats) back to the connection.

use crate::error::RelayError;
use crate::server::{ping_frame, relay_frame, DuelRelay, RoomFrame};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use duel_types::{ErrorNotice, Message, RoomId, RuleSet, SenderId};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// A per-connection session.
pub struct PlayerSession {
    relay: Arc<DuelRelay>,
    room_id: RoomId,
    sender_id: SenderId,
    rule_set: RuleSet,
}

impl PlayerSession {
    /// Create a new session for a connection.
    pub fn new(
        relay: Arc<DuelRelay>,
        room_id: RoomId,
        sender_id: SenderId,
        rule_set: RuleSet,
    ) -> Self {
        Self {
            relay,
            room_id,
            sender_id,
            rule_set,
        }
    }

    /// Run the session until either side of the connection ends.
    pub async fn run(self, socket: WebSocket) {
        let (mut sink, mut stream) = socket.split();

        let membership = match self
            .relay
            .join_room(&self.room_id, &self.sender_id, &self.rule_set)
        {
            Ok(membership) => membership,
            Err(e) => {
                if let Some(text) = rejection_frame(&self.room_id, &e) {
                    let _ = sink.send(WsMessage::Text(text)).await;
                }
                let _ = sink.close().await;
                return;
            }
        };

        let mut room_rx = membership.receiver;
        let mut heartbeat_rx = self.relay.subscribe_heartbeat();
        let own_id = self.sender_id.clone();
        let ping_room = self.room_id.clone();

        // Room frames and heartbeats -> this connection
        let mut send_task = tokio::spawn(async move {
            loop {
                let text = tokio::select! {
                    frame = room_rx.recv() => match frame {
                        Ok(frame) if frame.sender_id == own_id => continue,
                        Ok(frame) => frame.text,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!("Connection {} lagged, {} frames dropped", own_id, skipped);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    },
                    tick = heartbeat_rx.recv() => match tick {
                        Ok(()) | Err(RecvError::Lagged(_)) => match ping_frame(&ping_room) {
                            Ok(text) => text,
                            Err(e) => {
                                tracing::error!("Failed to encode ping: {}", e);
                                continue;
                            }
                        },
                        Err(RecvError::Closed) => break,
                    },
                };

                if sink.send(WsMessage::Text(text)).await.is_err() {
                    break;
                }
            }
        });

        // This connection -> room
        let room_tx = membership.sender;
        let from = self.sender_id.clone();
        let room = self.room_id.clone();
        let mut recv_task = tokio::spawn(async move {
            while let Some(Ok(message)) = stream.next().await {
                match message {
                    WsMessage::Text(text) => {
                        tracing::debug!("Frame from {} to room {} ({} bytes)", from, room, text.len());
                        let frame = RoomFrame {
                            sender_id: from.clone(),
                            text,
                        };
                        if room_tx.send(frame).is_err() {
                            break;
                        }
                    }
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }
        });

        tokio::select! {
            _ = &mut send_task => recv_task.abort(),
            _ = &mut recv_task => send_task.abort(),
        }

        self.relay.leave_room(&self.room_id, &self.sender_id);
    }
}

/// The `error` envelope telling a rejected connection why.
fn rejection_frame(room_id: &RoomId, error: &RelayError) -> Option<String> {
    let notice = Message::Error(ErrorNotice {
        text: error.to_string(),
    });
    match relay_frame(room_id, &notice) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!("Failed to encode rejection: {}", e);
            None
        }
    }
}
