//! # duel-core
//!
//! Pure session logic for duel-sync (no I/O, instant tests).
//!
//! This crate implements the two-peer session protocol: role negotiation,
//! move relay, rejoin reconciliation, draw negotiation and liveness
//! tracking, without any network access.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! Game rules live behind the [`RulesEngine`] trait. The actual I/O is
//! performed by `duel-client`, which interprets the [`Action`]s produced by
//! the [`SessionController`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod controller;
pub mod engine;
pub mod error;
pub mod liveness;
pub mod moves;
pub mod negotiation;
pub mod reconcile;
pub mod role;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use controller::{AbortReason, Action, SessionController, SessionEvent, SessionPhase};
pub use engine::{EngineError, MoveOutcome, RulesEngine};
pub use error::SessionError;
pub use liveness::{
    LivenessChange, LivenessMonitor, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_LIVENESS_TIMEOUT,
};
pub use moves::{LocalMove, RemoteMove};
pub use negotiation::{DrawAction, DrawEvent, DrawState};
pub use role::{resolve_side, RoleAssignment};
pub use session::{EndReason, MoveKey, PendingPromotion, Session, SessionEnded};
