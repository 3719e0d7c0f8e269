//! Identity and role-negotiation types for duel-sync.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sender id reserved for frames originated by the relay itself.
const RELAY_SENDER: &str = "server";

/// A per-connection identifier for a participant in a room.
///
/// Random for every connection, so it is not a stable player identity:
/// a peer that reconnects shows up with a new `SenderId`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenderId(String);

impl SenderId {
    /// Create a new random SenderId (UUID v4, simple form).
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// The id the relay stamps on its own frames (heartbeats, rejections).
    pub fn relay() -> Self {
        Self(RELAY_SENDER.to_string())
    }

    /// Whether this id belongs to the relay rather than a peer.
    pub fn is_relay(&self) -> bool {
        self.0 == RELAY_SENDER
    }

    /// Borrow the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SenderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SenderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.0.get(..8).unwrap_or(&self.0);
        write!(f, "SenderId({})", short)
    }
}

/// A room code shared out-of-band between the two players.
///
/// Generated rooms use 6 lowercase hex digits, but any string the relay
/// accepts in a URL path segment is a valid room id.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Create a new random 6-hex-digit room code.
    pub fn random() -> Self {
        let mut bytes = [0u8; 3];
        getrandom::getrandom(&mut bytes).expect("getrandom failed");
        Self(hex::encode(bytes))
    }

    /// Borrow the room id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoomId({})", self.0)
    }
}

/// A random value exchanged during role negotiation.
///
/// Generated once per session instance. Only the raw values travel on the
/// wire; each peer compares them locally to derive its side.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tiebreak(u64);

impl Tiebreak {
    /// Create a new random tiebreak value.
    pub fn random() -> Self {
        let mut bytes = [0u8; 8];
        getrandom::getrandom(&mut bytes).expect("getrandom failed");
        Self(u64::from_le_bytes(bytes))
    }

    /// Create a tiebreak with a fixed value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Tiebreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Tiebreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tiebreak({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_id_is_uuid_simple() {
        let id = SenderId::random();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn sender_ids_differ() {
        assert_ne!(SenderId::random(), SenderId::random());
    }

    #[test]
    fn relay_sender_is_recognised() {
        assert!(SenderId::relay().is_relay());
        assert!(SenderId::from("server").is_relay());
        assert!(!SenderId::random().is_relay());
    }

    #[test]
    fn sender_id_debug_is_truncated() {
        let id = SenderId::from("0123456789abcdef");
        assert_eq!(format!("{:?}", id), "SenderId(01234567)");
        let short = SenderId::from("abc");
        assert_eq!(format!("{:?}", short), "SenderId(abc)");
    }

    #[test]
    fn sender_id_serializes_as_plain_string() {
        let id = SenderId::from("peer-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"peer-1\"");
    }

    #[test]
    fn room_id_is_six_hex_digits() {
        let room = RoomId::random();
        assert_eq!(room.as_str().len(), 6);
        assert!(room.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tiebreak_ordering() {
        let low = Tiebreak::new(100_000);
        let high = Tiebreak::new(900_000);
        assert!(high > low);
        assert_eq!(high.value(), 900_000);
    }

    #[test]
    fn tiebreak_serializes_as_number() {
        let t = Tiebreak::new(42);
        assert_eq!(serde_json::to_string(&t).unwrap(), "42");
        let back: Tiebreak = serde_json::from_str("42").unwrap();
        assert_eq!(back, t);
    }
}
