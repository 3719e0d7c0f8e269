//! The rules-engine seam.
//!
//! Move legality, check detection and board mutation live outside this
//! crate. The session logic only talks to an engine through
//! [`RulesEngine`], which lets it stay pure and lets tests swap in
//! [`FakeEngine`](crate::testing::FakeEngine).

use duel_types::{PieceKind, Side, Square, StateBlob};
use thiserror::Error;

/// Errors reported by a rules engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The move is not legal in the current position
    #[error("illegal move {from} -> {to}")]
    InvalidMove {
        /// Origin square
        from: Square,
        /// Destination square
        to: Square,
    },

    /// Promotion requested with no pawn waiting, or to an invalid piece
    #[error("invalid promotion")]
    InvalidPromotion,

    /// A state blob could not be restored
    #[error("corrupt engine state: {0}")]
    CorruptState(String),
}

/// What a successful `apply_move` changed on the board.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MoveOutcome {
    /// Every piece displacement the move caused, in order.
    ///
    /// Usually one entry; castling also moves the rook.
    pub moved: Vec<(Square, Square)>,
}

impl MoveOutcome {
    /// Outcome of a plain single-piece move.
    pub fn single(from: Square, to: Square) -> Self {
        Self {
            moved: vec![(from, to)],
        }
    }

    /// Squares pieces left.
    pub fn from_squares(&self) -> Vec<Square> {
        self.moved.iter().map(|(from, _)| *from).collect()
    }

    /// Squares pieces arrived on.
    pub fn to_squares(&self) -> Vec<Square> {
        self.moved.iter().map(|(_, to)| *to).collect()
    }
}

/// An opaque rules engine for one board.
///
/// Implementations must leave the position untouched when `apply_move` or
/// `restore_state` returns an error.
pub trait RulesEngine {
    /// Apply a move for the side to move.
    fn apply_move(&mut self, from: Square, to: Square) -> Result<MoveOutcome, EngineError>;

    /// Whether the last applied move left a pawn waiting for promotion.
    fn has_pending_promotion(&self) -> bool;

    /// Replace the waiting pawn with `kind`.
    fn promote(&mut self, kind: PieceKind) -> Result<(), EngineError>;

    /// Whether `side`'s king is attacked.
    fn is_in_check(&self, side: Side) -> bool;

    /// Whether `side` is checkmated.
    fn is_checkmate(&self, side: Side) -> bool;

    /// Serialize the full position.
    fn serialize_state(&self) -> StateBlob;

    /// Replace the position with a serialized one.
    fn restore_state(&mut self, blob: &StateBlob) -> Result<(), EngineError>;

    /// The side to move.
    fn turn_owner(&self) -> Side;

    /// Return to the initial position.
    fn reset(&mut self);
}
