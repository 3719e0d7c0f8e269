//! Full session state handed to a rejoining peer.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::{PieceKind, RuleSet, SenderId, Side, Square, Tiebreak, WireError};

/// Opaque serialized rules-engine state.
///
/// Encoded as standard base64 in JSON.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct StateBlob(Vec<u8>);

impl StateBlob {
    /// Wrap raw engine bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decode from base64 text.
    pub fn from_base64(text: &str) -> Result<Self, WireError> {
        STANDARD
            .decode(text)
            .map(Self)
            .map_err(|e| WireError::InvalidBlob(e.to_string()))
    }

    /// Encode as base64 text.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

impl fmt::Debug for StateBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateBlob({} bytes)", self.0.len())
    }
}

impl Serialize for StateBlob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for StateBlob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_base64(&text).map_err(serde::de::Error::custom)
    }
}

/// One applied move. Append-only; log order is turn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Origin square
    pub from: Square,
    /// Destination square
    pub to: Square,
    /// Promotion choice, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PieceKind>,
    /// Side that made the move
    pub originator: Side,
}

/// Everything a rejoining peer needs to resume a game.
///
/// All perspective fields (`local_*`, `remote_*`) are from the point of
/// view of the sender. The receiver swaps them on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Serialized rules-engine state
    pub game_dump: StateBlob,
    /// Rule set the game is played under
    pub rule_set: RuleSet,
    /// Sender id of the White player, if known
    pub white_id: Option<SenderId>,
    /// Sender id of the Black player, if known
    pub black_id: Option<SenderId>,
    /// The sender's side
    pub local_side: Side,
    /// The receiver's side
    pub remote_side: Side,
    /// The sender's tiebreak
    pub local_tiebreak: Tiebreak,
    /// The receiver's tiebreak, if one was exchanged
    pub remote_tiebreak: Option<Tiebreak>,
    /// Side to move
    pub turn_owner: Side,
    /// Squares vacated by the last move
    #[serde(rename = "movedFrom", default)]
    pub moved_from: Vec<Square>,
    /// Squares occupied by the last move
    #[serde(rename = "movedTo", default)]
    pub moved_to: Vec<Square>,
    /// Applied moves in turn order
    pub move_log: Vec<MoveRecord>,
}

impl SessionSnapshot {
    /// Number of moves recorded in the snapshot.
    pub fn move_count(&self) -> usize {
        self.move_log.len()
    }
}
