//! Envelope - the wire format wrapper for all session messages.

use serde::{Deserialize, Serialize};

use crate::{Message, RoomId, SenderId, WireError};

/// The envelope wraps every protocol message with routing metadata.
///
/// This is the outer layer that the relay sees. `data` holds the JSON text
/// of a [`Message`] and is opaque to the relay, which routes on `room_id`
/// only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sender's per-connection id
    pub sender_id: SenderId,
    /// Room the envelope is addressed to
    pub room_id: RoomId,
    /// JSON-encoded inner message
    pub data: String,
}

impl Envelope {
    /// Wrap a message for sending.
    pub fn seal(sender_id: SenderId, room_id: RoomId, message: &Message) -> Result<Self, WireError> {
        Ok(Self {
            sender_id,
            room_id,
            data: message.to_json()?,
        })
    }

    /// Decode the inner message.
    pub fn open(&self) -> Result<Message, WireError> {
        Message::from_json(&self.data)
    }

    /// Serialize to JSON text.
    pub fn to_json(&self) -> Result<String, WireError> {
        serde_json::to_string(self).map_err(WireError::Serialization)
    }

    /// Deserialize from JSON text.
    pub fn from_json(text: &str) -> Result<Self, WireError> {
        serde_json::from_str(text).map_err(WireError::Deserialization)
    }

    /// Whether this envelope was sent by the relay itself.
    pub fn is_from_relay(&self) -> bool {
        self.sender_id.is_relay()
    }
}
