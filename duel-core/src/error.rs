//! Error types for session handling.

use std::time::Duration;

use duel_types::{RuleSet, Square, Tiebreak, WireError};
use thiserror::Error;

use crate::engine::EngineError;

/// Errors produced by session operations.
///
/// Invalid moves and malformed envelopes are recovered locally and never
/// reach the opponent. Rule-set mismatches and tiebreak collisions abort
/// session establishment.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The rules engine rejected a move
    #[error("illegal move {from} -> {to}")]
    InvalidMove {
        /// Origin square
        from: Square,
        /// Destination square
        to: Square,
    },

    /// Both peers drew the same tiebreak value
    #[error("tiebreak collision on {0}")]
    TiebreakCollision(Tiebreak),

    /// The peers are playing different rule sets (fatal)
    #[error("rule set mismatch: local {local}, remote {remote}")]
    RuleSetMismatch {
        /// Our rule set
        local: RuleSet,
        /// The peer's rule set
        remote: RuleSet,
    },

    /// Nothing heard from the peer within the liveness timeout
    #[error("no sign of life from peer for {elapsed:?}")]
    StaleConnection {
        /// Time since the peer was last heard from
        elapsed: Duration,
    },

    /// An inbound envelope could not be decoded
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] WireError),

    /// Sides have not been negotiated yet
    #[error("session is not ready")]
    NotReady,

    /// The local side does not own the turn
    #[error("not our turn")]
    OutOfTurn,

    /// A promotion choice is still outstanding
    #[error("waiting for a promotion choice")]
    PromotionPending,

    /// A promotion choice was given with nothing to promote
    #[error("no promotion pending")]
    NoPendingPromotion,

    /// An answer was given with no draw offer outstanding
    #[error("no draw offer to answer")]
    NoDrawOffer,

    /// The session has ended
    #[error("session is over")]
    SessionOver,

    /// The rules engine failed for a reason other than an illegal move
    #[error("engine error: {0}")]
    Engine(EngineError),
}

impl SessionError {
    /// Whether this error permanently ends session establishment.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::RuleSetMismatch { .. })
    }
}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidMove { from, to } => SessionError::InvalidMove { from, to },
            other => SessionError::Engine(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn engine_invalid_move_maps_to_invalid_move() {
        let err: SessionError = EngineError::InvalidMove {
            from: sq("e2"),
            to: sq("e5"),
        }
        .into();
        assert!(matches!(err, SessionError::InvalidMove { .. }));
        assert_eq!(err.to_string(), "illegal move e2 -> e5");
    }

    #[test]
    fn other_engine_errors_are_wrapped() {
        let err: SessionError = EngineError::CorruptState("truncated".into()).into();
        assert!(matches!(
            err,
            SessionError::Engine(EngineError::CorruptState(_))
        ));
    }

    #[test]
    fn only_rule_set_mismatch_is_fatal() {
        let mismatch = SessionError::RuleSetMismatch {
            local: RuleSet::standard(),
            remote: RuleSet::new("chess960"),
        };
        assert!(mismatch.is_fatal());
        assert!(!SessionError::TiebreakCollision(Tiebreak::new(1)).is_fatal());
        assert!(!SessionError::NotReady.is_fatal());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SessionError>();
    }
}
