//! Error types for duel-relay.

use duel_types::{RoomId, WireError};

/// Main error type for duel-relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// The room already holds the maximum number of players.
    ///
    /// The message is shown verbatim to the rejected peer.
    #[error("Game is full")]
    RoomFull {
        /// The room that rejected the player.
        room_id: RoomId,
    },

    /// A relay frame could not be encoded.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
