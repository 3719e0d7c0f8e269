//! # duel-types
//!
//! Wire format types for the duel-sync session protocol.
//!
//! This crate provides the foundational types used across all duel-sync crates:
//! - [`SenderId`], [`RoomId`], [`Tiebreak`] - Identity and role-negotiation types
//! - [`Side`], [`Square`], [`PieceKind`], [`RuleSet`] - Game vocabulary
//! - [`Envelope`] - Routed wrapper whose payload is opaque to the relay
//! - [`Message`] - Protocol messages (join, init, move, reset, ...)
//! - [`SessionSnapshot`] - Full session handoff for a rejoining peer
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod board;
mod envelope;
mod error;
mod ids;
mod messages;
mod snapshot;

pub use board::{PieceKind, RuleSet, Side, Square};
pub use envelope::Envelope;
pub use error::WireError;
pub use ids::{RoomId, SenderId, Tiebreak};
pub use messages::{
    DrawKind, Draw, ErrorNotice, Init, Join, Leave, Message, MessageType, MovePayload, Ping,
    Reset, Resign,
};
pub use snapshot::{MoveRecord, SessionSnapshot, StateBlob};
