//! Main DuelRelay server coordination.
//!
//! DuelRelay owns the room registry and the heartbeat channel. Each
//! connection joins one room and talks to it through a broadcast channel;
//! see [`crate::session`] for the per-connection side.

use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::heartbeat::spawn_heartbeat_task;
use crate::http::build_router;
use dashmap::DashMap;
use duel_types::{Envelope, Leave, Message, Ping, RoomId, RuleSet, SenderId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// One frame published to a room, tagged with the connection that sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomFrame {
    /// Connection the frame came from.
    pub sender_id: SenderId,
    /// Envelope JSON, forwarded untouched.
    pub text: String,
}

/// A live room.
#[derive(Debug)]
struct Room {
    rule_set: RuleSet,
    /// Open connections per sender id.
    players: HashMap<SenderId, usize>,
    tx: broadcast::Sender<RoomFrame>,
}

impl Room {
    fn new(rule_set: RuleSet, capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            rule_set,
            players: HashMap::new(),
            tx,
        }
    }

    fn connections(&self) -> usize {
        self.players.values().sum()
    }
}

/// What a connection gets back from a successful join.
#[derive(Debug)]
pub struct RoomMembership {
    /// The room's rule set (set by whoever created the room).
    pub rule_set: RuleSet,
    /// Publish frames to the room.
    pub sender: broadcast::Sender<RoomFrame>,
    /// Frames published to the room, including our own.
    pub receiver: broadcast::Receiver<RoomFrame>,
}

/// Room counts by occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Occupancy {
    /// Rooms with a player waiting for an opponent.
    pub waiting: usize,
    /// Rooms at capacity.
    pub full: usize,
}

/// Main relay server.
pub struct DuelRelay {
    config: Config,
    started_at: Instant,
    /// Live rooms by id.
    rooms: DashMap<RoomId, Room>,
    /// Global heartbeat; every connection subscribes.
    heartbeat: broadcast::Sender<()>,
}

impl std::fmt::Debug for DuelRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuelRelay")
            .field("config", &self.config)
            .field("rooms_count", &self.rooms.len())
            .finish_non_exhaustive()
    }
}

impl DuelRelay {
    /// Create a new DuelRelay with the given config.
    pub fn new(config: Config) -> Self {
        let (heartbeat, _rx) = broadcast::channel(16);
        Self {
            config,
            started_at: Instant::now(),
            rooms: DashMap::new(),
            heartbeat,
        }
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Add a player to a room, creating the room on first join.
    ///
    /// The first joiner fixes the room's rule set; later joiners are
    /// admitted regardless and left to detect a mismatch themselves.
    /// Capacity counts connections, so a sender id that connects twice
    /// takes two slots.
    pub fn join_room(
        &self,
        room_id: &RoomId,
        sender_id: &SenderId,
        rule_set: &RuleSet,
    ) -> Result<RoomMembership> {
        let mut room = self.rooms.entry(room_id.clone()).or_insert_with(|| {
            tracing::info!("Creating room {} (rule set: {})", room_id, rule_set);
            Room::new(rule_set.clone(), self.config.rooms.channel_capacity)
        });

        if room.connections() >= self.config.rooms.max_players {
            tracing::warn!("Rejecting {} from full room {}", sender_id, room_id);
            return Err(RelayError::RoomFull {
                room_id: room_id.clone(),
            });
        }

        *room.players.entry(sender_id.clone()).or_insert(0) += 1;
        tracing::info!(
            "Player {} joined room {} ({} connections)",
            sender_id,
            room_id,
            room.connections()
        );

        Ok(RoomMembership {
            rule_set: room.rule_set.clone(),
            sender: room.tx.clone(),
            receiver: room.tx.subscribe(),
        })
    }

    /// Close one of a player's connections to a room.
    ///
    /// Once the player's last connection is gone the remaining player is
    /// told with a `leave` on its behalf. An empty room is deleted.
    pub fn leave_room(&self, room_id: &RoomId, sender_id: &SenderId) {
        let now_empty = match self.rooms.get_mut(room_id) {
            Some(mut room) => {
                let departed = match room.players.get(sender_id).copied() {
                    None => false,
                    Some(open) if open > 1 => {
                        room.players.insert(sender_id.clone(), open - 1);
                        false
                    }
                    Some(_) => {
                        room.players.remove(sender_id);
                        true
                    }
                };
                if departed && !room.players.is_empty() {
                    match leave_frame(room_id, sender_id) {
                        Ok(text) => {
                            let _ = room.tx.send(RoomFrame {
                                sender_id: sender_id.clone(),
                                text,
                            });
                        }
                        Err(e) => tracing::error!("Failed to encode leave frame: {}", e),
                    }
                }
                room.players.is_empty()
            }
            None => false,
        };

        tracing::info!("Player {} left room {}", sender_id, room_id);

        if now_empty
            && self
                .rooms
                .remove_if(room_id, |_, room| room.players.is_empty())
                .is_some()
        {
            tracing::info!("Deleting room {}", room_id);
        }
    }

    /// The rule set of a live room.
    pub fn room_rules(&self, room_id: &RoomId) -> Option<RuleSet> {
        self.rooms.get(room_id).map(|room| room.rule_set.clone())
    }

    /// Number of open player connections in a room.
    pub fn player_count(&self, room_id: &RoomId) -> usize {
        self.rooms
            .get(room_id)
            .map(|room| room.connections())
            .unwrap_or(0)
    }

    /// Subscribe to the global heartbeat.
    pub fn subscribe_heartbeat(&self) -> broadcast::Receiver<()> {
        self.heartbeat.subscribe()
    }

    /// Fire one heartbeat. Returns how many connections will see it.
    pub fn pulse(&self) -> usize {
        self.heartbeat.send(()).unwrap_or(0)
    }

    /// Get total player connections across all rooms.
    pub fn total_clients(&self) -> usize {
        self.rooms.iter().map(|entry| entry.connections()).sum()
    }

    /// Get total live rooms.
    pub fn total_rooms(&self) -> usize {
        self.rooms.len()
    }

    /// Split live rooms into waiting and full.
    pub fn occupancy(&self) -> Occupancy {
        let capacity = self.config.rooms.max_players;
        self.rooms
            .iter()
            .fold(Occupancy::default(), |mut counts, entry| {
                if entry.connections() >= capacity {
                    counts.full += 1;
                } else {
                    counts.waiting += 1;
                }
                counts
            })
    }

    /// Time since this relay was created.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Encode a relay-originated frame for a room.
pub fn relay_frame(room_id: &RoomId, message: &Message) -> Result<String> {
    Ok(Envelope::seal(SenderId::relay(), room_id.clone(), message)?.to_json()?)
}

/// The heartbeat frame for a room.
pub fn ping_frame(room_id: &RoomId) -> Result<String> {
    relay_frame(room_id, &Message::Ping(Ping::default()))
}

fn leave_frame(room_id: &RoomId, sender_id: &SenderId) -> Result<String> {
    let leave = Message::Leave(Leave {
        text: "Disconnected".to_string(),
    });
    Ok(Envelope::seal(sender_id.clone(), room_id.clone(), &leave)?.to_json()?)
}

/// Bind the configured address and serve until the listener fails.
pub async fn serve(relay: Arc<DuelRelay>) -> Result<()> {
    let listener = TcpListener::bind(&relay.config().server.bind_address).await?;
    tracing::info!("duel-relay listening on {}", listener.local_addr()?);
    serve_on(listener, relay).await
}

/// Serve on an already-bound listener (used by tests to pick a free port).
pub async fn serve_on(listener: TcpListener, relay: Arc<DuelRelay>) -> Result<()> {
    let heartbeat = spawn_heartbeat_task(
        relay.clone(),
        relay.config().rooms.heartbeat_interval(),
    );
    let result = axum::serve(listener, build_router(relay)).await;
    heartbeat.abort();
    result?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoomsConfig;

    const ROOM: &str = "a1b2c3";

    fn test_relay() -> DuelRelay {
        DuelRelay::new(Config::default())
    }

    fn room() -> RoomId {
        RoomId::from(ROOM)
    }

    #[test]
    fn first_join_creates_room_with_rule_set() {
        let relay = test_relay();
        let membership = relay
            .join_room(&room(), &SenderId::from("a"), &RuleSet::new("chess960"))
            .unwrap();

        assert_eq!(membership.rule_set, RuleSet::new("chess960"));
        assert_eq!(relay.room_rules(&room()), Some(RuleSet::new("chess960")));
        assert_eq!(relay.total_rooms(), 1);
    }

    #[test]
    fn second_join_keeps_creator_rule_set() {
        let relay = test_relay();
        relay
            .join_room(&room(), &SenderId::from("a"), &RuleSet::standard())
            .unwrap();
        let membership = relay
            .join_room(&room(), &SenderId::from("b"), &RuleSet::new("chess960"))
            .unwrap();

        assert_eq!(membership.rule_set, RuleSet::standard());
        assert_eq!(relay.player_count(&room()), 2);
    }

    #[test]
    fn third_player_is_rejected() {
        let relay = test_relay();
        relay
            .join_room(&room(), &SenderId::from("a"), &RuleSet::standard())
            .unwrap();
        relay
            .join_room(&room(), &SenderId::from("b"), &RuleSet::standard())
            .unwrap();

        let result = relay.join_room(&room(), &SenderId::from("c"), &RuleSet::standard());
        assert!(matches!(result, Err(RelayError::RoomFull { .. })));
        assert_eq!(relay.player_count(&room()), 2);
    }

    #[test]
    fn capacity_is_configurable() {
        let config = Config {
            rooms: RoomsConfig {
                max_players: 1,
                ..RoomsConfig::default()
            },
            ..Config::default()
        };
        let relay = DuelRelay::new(config);
        relay
            .join_room(&room(), &SenderId::from("a"), &RuleSet::standard())
            .unwrap();
        assert!(relay
            .join_room(&room(), &SenderId::from("b"), &RuleSet::standard())
            .is_err());
    }

    #[test]
    fn leave_deletes_empty_room() {
        let relay = test_relay();
        let a = SenderId::from("a");
        relay.join_room(&room(), &a, &RuleSet::standard()).unwrap();

        relay.leave_room(&room(), &a);

        assert_eq!(relay.total_rooms(), 0);
        assert_eq!(relay.room_rules(&room()), None);
    }

    #[test]
    fn leave_announces_departure_to_remaining_player() {
        let relay = test_relay();
        let a = SenderId::from("a");
        let b = SenderId::from("b");
        relay.join_room(&room(), &a, &RuleSet::standard()).unwrap();
        let mut b_membership = relay.join_room(&room(), &b, &RuleSet::standard()).unwrap();

        relay.leave_room(&room(), &a);

        let frame = b_membership.receiver.try_recv().unwrap();
        assert_eq!(frame.sender_id, a);
        let envelope = Envelope::from_json(&frame.text).unwrap();
        assert_eq!(envelope.sender_id, a);
        assert_eq!(envelope.room_id, room());
        assert_eq!(
            envelope.open().unwrap(),
            Message::Leave(Leave {
                text: "Disconnected".to_string()
            })
        );
        assert_eq!(relay.total_rooms(), 1);
        assert_eq!(relay.total_clients(), 1);
    }

    #[test]
    fn reused_sender_id_takes_a_slot() {
        let relay = test_relay();
        let a = SenderId::from("a");
        relay.join_room(&room(), &a, &RuleSet::standard()).unwrap();
        relay
            .join_room(&room(), &SenderId::from("b"), &RuleSet::standard())
            .unwrap();

        let again = relay.join_room(&room(), &a, &RuleSet::standard());
        assert!(matches!(again, Err(RelayError::RoomFull { .. })));
        assert_eq!(relay.player_count(&room()), 2);
        assert_eq!(relay.total_clients(), 2);
    }

    #[test]
    fn leave_waits_for_the_last_connection_of_an_id() {
        let config = Config {
            rooms: RoomsConfig {
                max_players: 3,
                ..RoomsConfig::default()
            },
            ..Config::default()
        };
        let relay = DuelRelay::new(config);
        let a = SenderId::from("a");
        relay.join_room(&room(), &a, &RuleSet::standard()).unwrap();
        let mut b_membership = relay
            .join_room(&room(), &SenderId::from("b"), &RuleSet::standard())
            .unwrap();
        relay.join_room(&room(), &a, &RuleSet::standard()).unwrap();
        assert_eq!(relay.player_count(&room()), 3);

        relay.leave_room(&room(), &a);
        assert!(b_membership.receiver.try_recv().is_err());
        assert_eq!(relay.player_count(&room()), 2);

        relay.leave_room(&room(), &a);
        let frame = b_membership.receiver.try_recv().unwrap();
        assert_eq!(frame.sender_id, a);
        assert_eq!(relay.player_count(&room()), 1);
        assert_eq!(relay.total_clients(), 1);
    }

    #[test]
    fn leave_of_unknown_room_is_harmless() {
        let relay = test_relay();
        relay.leave_room(&room(), &SenderId::from("a"));
        assert_eq!(relay.total_rooms(), 0);
    }

    #[test]
    fn rooms_are_isolated() {
        let relay = test_relay();
        let mut first = relay
            .join_room(&RoomId::from("aaaaaa"), &SenderId::from("a"), &RuleSet::standard())
            .unwrap();
        let second = relay
            .join_room(&RoomId::from("bbbbbb"), &SenderId::from("b"), &RuleSet::standard())
            .unwrap();

        second
            .sender
            .send(RoomFrame {
                sender_id: SenderId::from("b"),
                text: "{}".to_string(),
            })
            .unwrap();

        assert!(first.receiver.try_recv().is_err());
        assert_eq!(relay.total_clients(), 2);
    }

    #[test]
    fn occupancy_splits_waiting_and_full_rooms() {
        let relay = test_relay();
        for id in ["a", "b"] {
            relay
                .join_room(&RoomId::from("aaaaaa"), &SenderId::from(id), &RuleSet::standard())
                .unwrap();
        }
        relay
            .join_room(&RoomId::from("bbbbbb"), &SenderId::from("c"), &RuleSet::standard())
            .unwrap();

        assert_eq!(relay.occupancy(), Occupancy { waiting: 1, full: 1 });

        relay.leave_room(&RoomId::from("aaaaaa"), &SenderId::from("a"));
        assert_eq!(relay.occupancy(), Occupancy { waiting: 2, full: 0 });
    }

    #[test]
    fn pulse_reaches_every_subscriber() {
        let relay = test_relay();
        let mut one = relay.subscribe_heartbeat();
        let mut two = relay.subscribe_heartbeat();

        assert_eq!(relay.pulse(), 2);
        assert!(one.try_recv().is_ok());
        assert!(two.try_recv().is_ok());
    }

    #[test]
    fn pulse_without_subscribers_is_harmless() {
        assert_eq!(test_relay().pulse(), 0);
    }

    #[test]
    fn ping_frame_comes_from_relay() {
        let envelope = Envelope::from_json(&ping_frame(&room()).unwrap()).unwrap();
        assert!(envelope.is_from_relay());
        assert_eq!(envelope.room_id, room());
        assert_eq!(envelope.open().unwrap(), Message::Ping(Ping::default()));
    }
}
