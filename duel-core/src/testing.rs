//! Test doubles for the rules engine.
//!
//! [`FakeEngine`] knows nothing about chess. It accepts any move except the
//! ones it is told to reject, alternates the turn, and reports promotion or
//! checkmate only where configured. That is enough to drive every session
//! path deterministically.

use std::collections::HashSet;

use duel_types::{PieceKind, Side, Square, StateBlob};
use serde::{Deserialize, Serialize};

use crate::engine::{EngineError, MoveOutcome, RulesEngine};

/// The part of a [`FakeEngine`] that travels in a state blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Position {
    turn: Side,
    moves: Vec<(Square, Square, Option<PieceKind>)>,
    awaiting_promotion: bool,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            turn: Side::White,
            moves: Vec::new(),
            awaiting_promotion: false,
        }
    }
}

/// A scriptable [`RulesEngine`].
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    position: Position,
    illegal: HashSet<(Square, Square)>,
    promotion_squares: HashSet<Square>,
    castles: Vec<(Square, Square, Square, Square)>,
    checkmate_after: Option<usize>,
}

impl FakeEngine {
    /// An engine in the initial position that accepts every move.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject `from -> to` as illegal.
    pub fn reject(mut self, from: &str, to: &str) -> Self {
        self.illegal.insert((parse(from), parse(to)));
        self
    }

    /// Any move landing on `square` leaves a pawn waiting for promotion.
    pub fn promote_on(mut self, square: &str) -> Self {
        self.promotion_squares.insert(parse(square));
        self
    }

    /// `king_from -> king_to` also moves a rook from `rook_from` to `rook_to`.
    pub fn castle(mut self, king_from: &str, king_to: &str, rook_from: &str, rook_to: &str) -> Self {
        self.castles.push((
            parse(king_from),
            parse(king_to),
            parse(rook_from),
            parse(rook_to),
        ));
        self
    }

    /// The side to move is checkmated once `count` moves have been played.
    pub fn checkmate_after(mut self, count: usize) -> Self {
        self.checkmate_after = Some(count);
        self
    }

    /// Moves applied so far, with their promotion choices.
    pub fn moves(&self) -> &[(Square, Square, Option<PieceKind>)] {
        &self.position.moves
    }
}

fn parse(square: &str) -> Square {
    square
        .parse()
        .unwrap_or_else(|_| panic!("bad square in test setup: {square}"))
}

impl RulesEngine for FakeEngine {
    fn apply_move(&mut self, from: Square, to: Square) -> Result<MoveOutcome, EngineError> {
        if from == to || self.position.awaiting_promotion || self.illegal.contains(&(from, to)) {
            return Err(EngineError::InvalidMove { from, to });
        }

        let mut outcome = MoveOutcome::single(from, to);
        if let Some(&(_, _, rook_from, rook_to)) = self
            .castles
            .iter()
            .find(|(king_from, king_to, _, _)| *king_from == from && *king_to == to)
        {
            outcome.moved.push((rook_from, rook_to));
        }

        self.position.moves.push((from, to, None));
        self.position.turn = self.position.turn.opposite();
        self.position.awaiting_promotion = self.promotion_squares.contains(&to);
        Ok(outcome)
    }

    fn has_pending_promotion(&self) -> bool {
        self.position.awaiting_promotion
    }

    fn promote(&mut self, kind: PieceKind) -> Result<(), EngineError> {
        if !self.position.awaiting_promotion {
            return Err(EngineError::InvalidPromotion);
        }
        if let Some(last) = self.position.moves.last_mut() {
            last.2 = Some(kind);
        }
        self.position.awaiting_promotion = false;
        Ok(())
    }

    fn is_in_check(&self, side: Side) -> bool {
        self.is_checkmate(side)
    }

    fn is_checkmate(&self, side: Side) -> bool {
        match self.checkmate_after {
            Some(count) => {
                self.position.moves.len() >= count
                    && side == self.position.turn
                    && !self.position.awaiting_promotion
            }
            None => false,
        }
    }

    fn serialize_state(&self) -> StateBlob {
        StateBlob::new(serde_json::to_vec(&self.position).unwrap_or_default())
    }

    fn restore_state(&mut self, blob: &StateBlob) -> Result<(), EngineError> {
        let position: Position = serde_json::from_slice(blob.as_bytes())
            .map_err(|e| EngineError::CorruptState(e.to_string()))?;
        self.position = position;
        Ok(())
    }

    fn turn_owner(&self) -> Side {
        self.position.turn
    }

    fn reset(&mut self) {
        self.position = Position::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn accepts_and_alternates_turn() {
        let mut engine = FakeEngine::new();
        assert_eq!(engine.turn_owner(), Side::White);
        let outcome = engine.apply_move(sq("e2"), sq("e4")).unwrap();
        assert_eq!(outcome.moved, vec![(sq("e2"), sq("e4"))]);
        assert_eq!(engine.turn_owner(), Side::Black);
    }

    #[test]
    fn rejected_move_leaves_position() {
        let mut engine = FakeEngine::new().reject("e2", "e4");
        let before = engine.serialize_state();
        assert!(matches!(
            engine.apply_move(sq("e2"), sq("e4")),
            Err(EngineError::InvalidMove { .. })
        ));
        assert_eq!(engine.serialize_state(), before);
    }

    #[test]
    fn castling_moves_rook() {
        let mut engine = FakeEngine::new().castle("e1", "g1", "h1", "f1");
        let outcome = engine.apply_move(sq("e1"), sq("g1")).unwrap();
        assert_eq!(outcome.from_squares(), vec![sq("e1"), sq("h1")]);
        assert_eq!(outcome.to_squares(), vec![sq("g1"), sq("f1")]);
    }

    #[test]
    fn promotion_blocks_until_chosen() {
        let mut engine = FakeEngine::new().promote_on("a8");
        engine.apply_move(sq("a7"), sq("a8")).unwrap();
        assert!(engine.has_pending_promotion());
        assert!(engine.apply_move(sq("h7"), sq("h6")).is_err());
        engine.promote(PieceKind::Rook).unwrap();
        assert!(!engine.has_pending_promotion());
        assert_eq!(engine.moves()[0].2, Some(PieceKind::Rook));
        assert_eq!(engine.promote(PieceKind::Queen), Err(EngineError::InvalidPromotion));
    }

    #[test]
    fn state_blob_restores_position() {
        let mut a = FakeEngine::new();
        a.apply_move(sq("e2"), sq("e4")).unwrap();
        let mut b = FakeEngine::new();
        b.restore_state(&a.serialize_state()).unwrap();
        assert_eq!(b.moves(), a.moves());
        assert_eq!(b.turn_owner(), Side::Black);
    }

    #[test]
    fn corrupt_blob_is_rejected() {
        let mut engine = FakeEngine::new();
        let err = engine
            .restore_state(&StateBlob::new(b"garbage".to_vec()))
            .unwrap_err();
        assert!(matches!(err, EngineError::CorruptState(_)));
        assert!(engine.moves().is_empty());
    }

    #[test]
    fn checkmate_applies_to_side_to_move() {
        let mut engine = FakeEngine::new().checkmate_after(1);
        assert!(!engine.is_checkmate(Side::White));
        engine.apply_move(sq("f2"), sq("f3")).unwrap();
        assert!(engine.is_checkmate(Side::Black));
        assert!(!engine.is_checkmate(Side::White));
    }

    #[test]
    fn reset_returns_to_start() {
        let mut engine = FakeEngine::new();
        engine.apply_move(sq("e2"), sq("e4")).unwrap();
        engine.reset();
        assert!(engine.moves().is_empty());
        assert_eq!(engine.turn_owner(), Side::White);
    }
}
