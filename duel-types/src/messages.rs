//! Protocol messages for duel-sync.
//!
//! These are the inner payloads that get serialized into the `data` field
//! of an [`Envelope`](crate::Envelope). Every message is a JSON object
//! tagged by `message_type`.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::{PieceKind, RuleSet, SessionSnapshot, Square, Tiebreak, WireError};

/// All possible protocol messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum Message {
    /// Announce presence and offer a tiebreak
    Join(Join),
    /// Reply to a join with the rule set and own tiebreak
    Init(Init),
    /// An applied move, with optional promotion
    Move(MovePayload),
    /// Full session handoff to a rejoining peer
    Reset(Reset),
    /// Draw negotiation step
    Draw(Draw),
    /// Unconditional resignation
    Resign(Resign),
    /// Advisory departure notice
    Leave(Leave),
    /// Heartbeat
    Ping(Ping),
    /// Relay-originated rejection
    Error(ErrorNotice),
}

impl Message {
    /// Serialize to JSON text.
    pub fn to_json(&self) -> Result<String, WireError> {
        serde_json::to_string(self).map_err(WireError::Serialization)
    }

    /// Deserialize from JSON text.
    pub fn from_json(text: &str) -> Result<Self, WireError> {
        serde_json::from_str(text).map_err(WireError::Deserialization)
    }

    /// The discriminator of this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Join(_) => MessageType::Join,
            Message::Init(_) => MessageType::Init,
            Message::Move(_) => MessageType::Move,
            Message::Reset(_) => MessageType::Reset,
            Message::Draw(_) => MessageType::Draw,
            Message::Resign(_) => MessageType::Resign,
            Message::Leave(_) => MessageType::Leave,
            Message::Ping(_) => MessageType::Ping,
            Message::Error(_) => MessageType::Error,
        }
    }
}

/// Message type discriminator, used for logging and routing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// `join`
    Join,
    /// `init`
    Init,
    /// `move`
    Move,
    /// `reset`
    Reset,
    /// `draw`
    Draw,
    /// `resign`
    Resign,
    /// `leave`
    Leave,
    /// `ping`
    Ping,
    /// `error`
    Error,
}

impl MessageType {
    /// The wire tag for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Join => "join",
            MessageType::Init => "init",
            MessageType::Move => "move",
            MessageType::Reset => "reset",
            MessageType::Draw => "draw",
            MessageType::Resign => "resign",
            MessageType::Leave => "leave",
            MessageType::Ping => "ping",
            MessageType::Error => "error",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presence announcement sent when a peer connects to a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    /// The sender's tiebreak value
    pub num: Tiebreak,
}

/// Reply to [`Join`] from a peer with an empty session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Init {
    /// Rule set the replying peer is playing
    pub rule_set: RuleSet,
    /// The replying peer's tiebreak value
    pub num: Tiebreak,
}

/// A move the sender has already applied locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovePayload {
    /// Origin square
    pub start_sq_coords: Square,
    /// Destination square
    pub end_sq_coords: Square,
    /// Sender's clock in milliseconds (advisory, display only)
    #[serde(rename = "myTime", default)]
    pub my_time: u64,
    /// Promotion choice, if the move promoted a pawn
    #[serde(
        rename = "lastPawnAction",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_piece_as_none"
    )]
    pub last_pawn_action: Option<PieceKind>,
    /// Index of this move in the sender's move log. Lets the receiver tell
    /// a redelivery from the same move played again later.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ply: Option<u32>,
}

/// Some senders encode "no promotion" as an empty string.
fn empty_piece_as_none<'de, D>(deserializer: D) -> Result<Option<PieceKind>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(name) => name.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Full-state handoff for a rejoining peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reset {
    /// Snapshot as seen by the sender
    pub game_data: SessionSnapshot,
}

/// Draw negotiation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    /// Which step this is
    #[serde(rename = "type")]
    pub kind: DrawKind,
}

/// The three steps of a draw negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawKind {
    /// Offer a draw
    Extend,
    /// Accept an outstanding offer
    Accept,
    /// Decline an outstanding offer
    Reject,
}

/// Resignation. Terminal, no acknowledgement expected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resign {
    /// Free-form text
    pub text: String,
}

/// Departure notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leave {
    /// Free-form text
    pub text: String,
}

/// Heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    /// Liveness marker, conventionally `"is_up"`
    pub is_up: String,
}

impl Default for Ping {
    fn default() -> Self {
        Self {
            is_up: "is_up".to_string(),
        }
    }
}

/// Rejection sent by the relay, e.g. when a room is full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    /// Human-readable reason
    pub text: String,
}
