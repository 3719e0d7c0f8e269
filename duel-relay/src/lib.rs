//! # duel-relay
//!
//! Room relay server for duel-sync.
//!
//! This crate implements a relay server that:
//! - Accepts WebSocket connections at `/websocket/:room/:id/:rule_set`
//! - Admits two players per room and forwards every frame to the other
//! - Announces a `leave` on behalf of a player whose connection drops
//! - Sends periodic `ping` heartbeats to every connection
//! - Never looks inside envelopes (the relay is a "dumb pipe")
//!
//! ## Architecture
//!
//! ```text
//! Player A ──┐                    ┌── Player B
//!            │     WebSocket      │
//!            ├───────────────────►│
//!            │                    │
//!        ┌───┴────────────────────┴───┐
//!        │         duel-relay         │
//!        │  ┌─────────────────────┐   │
//!        │  │ rooms (broadcast)   │   │
//!        │  └─────────────────────┘   │
//!        └────────────────────────────┘
//! ```
//!
//! ## HTTP
//!
//! - `GET /websocket/:room/:id/:rule_set` → room connection
//! - `GET /getroomrules/:room_id` → `{"rule_set": ...}` or 404
//! - `GET /health` → status, version, waiting/full room counts, uptime

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod heartbeat;
pub mod http;
pub mod server;
pub mod session;

pub use config::{Config, ConfigError};
pub use error::RelayError;
pub use server::{serve, serve_on, DuelRelay};
