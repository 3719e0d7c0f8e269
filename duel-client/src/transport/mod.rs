//! Transport abstraction for duel-sync.
//!
//! This module provides a pluggable transport layer that abstracts
//! the connection to the room relay (WebSocket, mock for testing).
//!
//! # Design
//!
//! The transport trait is async and connection-oriented:
//! - `connect()` establishes a connection to a room URL
//! - `send()` transmits one envelope as JSON text
//! - `recv()` receives the next envelope
//! - `close()` gracefully terminates
//!
//! Delivery is at-least-once and unordered from the session's point of
//! view; the session logic tolerates redelivery.
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.connect("ws://relay/websocket/a1b2c3/peer/standard").await?;
//! transport.send(envelope_json.as_bytes()).await?;
//! let frame = transport.recv().await?;
//! ```

mod mock;
mod websocket;

pub use mock::MockTransport;
pub use websocket::WebSocketTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// Transport trait for sending and receiving envelopes.
///
/// Implementations handle the underlying connection mechanism
/// (WebSocket, mock, etc).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the relay at the given address.
    ///
    /// For WebSocket this is the full room URL. For testing, it's arbitrary.
    async fn connect(&self, address: &str) -> Result<(), TransportError>;

    /// Send one frame over the connection.
    ///
    /// The bytes are the JSON text of an envelope.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Receive the next frame from the connection.
    ///
    /// Blocks until data is available or connection closes.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}
