//! # duel-client
//!
//! Client library for the duel-sync two-peer session protocol.
//!
//! This is the library that applications use to play through a room relay.
//!
//! ## Features
//!
//! - **Transport Abstraction**: Pluggable transport layer (WebSocket, mock)
//! - **Pure Controller**: Uses duel-core for side-effect-free session logic
//! - **Heartbeats**: Periodic `ping` plus peer liveness reporting
//!
//! ## Example
//!
//! ```ignore
//! use duel_client::{ClientConfig, DuelClient, WebSocketTransport};
//!
//! let config = ClientConfig::new("ws://localhost:8080", RoomId::random());
//! let client = DuelClient::new(config, WebSocketTransport::new(), engine);
//!
//! client.connect().await?;
//! client.play_move("e2".parse()?, "e4".parse()?, None, 300_000).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod transport;

pub use client::{ClientConfig, ClientError, DuelClient};
pub use transport::{MockTransport, Transport, TransportError, WebSocketTransport};
