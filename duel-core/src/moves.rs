//! Move relay: local moves out, remote moves in.
//!
//! Local moves are applied to the engine before anything is transmitted,
//! so an illegal move never reaches the opponent. Remote moves are applied
//! atomically against an engine checkpoint. A redelivered or out-of-turn
//! remote move is dropped without touching the session.
//!
//! Outbound moves carry their ply index, so a redelivery is recognised even
//! after the same move has become legal again. Payloads without a ply fall
//! back to the set of payloads already applied.

use duel_types::{MovePayload, MoveRecord, PieceKind, Side, Square};

use crate::engine::{EngineError, RulesEngine};
use crate::error::SessionError;
use crate::session::{EndReason, MoveKey, PendingPromotion, Session, SessionEnded};

/// Result of [`send_local_move`].
#[derive(Debug, Clone, PartialEq)]
pub enum LocalMove {
    /// The move is recorded; transmit this payload.
    Sent(MovePayload),
    /// The engine wants a promotion choice before the move is final.
    AwaitingPromotion,
}

/// Result of [`receive_remote_move`].
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteMove {
    /// The move was applied and recorded.
    Applied(MoveRecord),
    /// A redelivery of a move already recorded; dropped.
    Duplicate,
    /// The peer does not own the turn, or the move skips ahead; dropped.
    OutOfTurn,
}

/// Apply and record a move for the local side.
///
/// On any error the engine and session are unchanged.
pub fn send_local_move<E: RulesEngine>(
    session: &mut Session,
    engine: &mut E,
    from: Square,
    to: Square,
    promotion: Option<PieceKind>,
    clock: u64,
) -> Result<LocalMove, SessionError> {
    let local = session.local_side.ok_or(SessionError::NotReady)?;
    if session.pending_promotion.is_some() {
        return Err(SessionError::PromotionPending);
    }
    if session.turn_owner != local {
        return Err(SessionError::OutOfTurn);
    }

    let checkpoint = engine.serialize_state();
    let outcome = engine.apply_move(from, to)?;

    if !engine.has_pending_promotion() {
        let record = session.record(from, to, None, local, &outcome);
        return Ok(LocalMove::Sent(payload(session, &record, clock)));
    }

    match promotion {
        Some(kind) => {
            if let Err(e) = engine.promote(kind) {
                let _ = engine.restore_state(&checkpoint);
                return Err(e.into());
            }
            let record = session.record(from, to, Some(kind), local, &outcome);
            Ok(LocalMove::Sent(payload(session, &record, clock)))
        }
        None => {
            session.pending_promotion = Some(PendingPromotion {
                from,
                to,
                outcome,
                checkpoint,
            });
            Ok(LocalMove::AwaitingPromotion)
        }
    }
}

/// Finish a local move that was waiting for a promotion choice.
pub fn complete_promotion<E: RulesEngine>(
    session: &mut Session,
    engine: &mut E,
    kind: PieceKind,
    clock: u64,
) -> Result<MovePayload, SessionError> {
    let local = session.local_side.ok_or(SessionError::NotReady)?;
    let pending = session
        .pending_promotion
        .take()
        .ok_or(SessionError::NoPendingPromotion)?;

    if let Err(e) = engine.promote(kind) {
        session.pending_promotion = Some(pending);
        return Err(e.into());
    }

    let record = session.record(pending.from, pending.to, Some(kind), local, &pending.outcome);
    Ok(payload(session, &record, clock))
}

/// Apply a move received from the peer.
///
/// Applied atomically: if the engine rejects the move or its promotion,
/// the engine is rolled back and the session is untouched.
pub fn receive_remote_move<E: RulesEngine>(
    session: &mut Session,
    engine: &mut E,
    msg: &MovePayload,
) -> Result<RemoteMove, SessionError> {
    let remote = session.remote_side.ok_or(SessionError::NotReady)?;
    let from = msg.start_sq_coords;
    let to = msg.end_sq_coords;
    let key = MoveKey::from(msg);

    match msg.ply.map(|ply| ply as usize) {
        Some(ply) if ply < session.move_count() => {
            let recorded = &session.move_log[ply];
            let same = recorded.originator == remote
                && recorded.from == from
                && recorded.to == to
                && recorded.promotion == msg.last_pawn_action;
            return Ok(if same {
                RemoteMove::Duplicate
            } else {
                RemoteMove::OutOfTurn
            });
        }
        Some(ply) if ply > session.move_count() => return Ok(RemoteMove::OutOfTurn),
        Some(_) => {}
        None if session.seen_remote_moves.contains(&key) => return Ok(RemoteMove::Duplicate),
        None => {}
    }

    if session.turn_owner != remote {
        let redelivered = session.last_move_by(remote).is_some_and(|last| {
            last.from == from && last.to == to && last.promotion == msg.last_pawn_action
        });
        return Ok(if redelivered {
            RemoteMove::Duplicate
        } else {
            RemoteMove::OutOfTurn
        });
    }

    let checkpoint = engine.serialize_state();
    let outcome = engine.apply_move(from, to)?;

    let promotion = if engine.has_pending_promotion() {
        let result = match msg.last_pawn_action {
            Some(kind) => engine.promote(kind).map(|_| Some(kind)),
            None => Err(EngineError::InvalidPromotion),
        };
        match result {
            Ok(kind) => kind,
            Err(e) => {
                let _ = engine.restore_state(&checkpoint);
                return Err(e.into());
            }
        }
    } else {
        None
    };

    let record = session.record(from, to, promotion, remote, &outcome);
    session.last_remote_clock = Some(msg.my_time);
    session.seen_remote_moves.insert(key);
    Ok(RemoteMove::Applied(record))
}

/// Whether the side to move is checkmated, and who won if so.
pub fn checkmate<E: RulesEngine>(session: &Session, engine: &E) -> Option<SessionEnded> {
    let to_move = session.turn_owner;
    engine
        .is_checkmate(to_move)
        .then(|| SessionEnded::won(EndReason::Checkmate, to_move.opposite()))
}

/// The side to move, if it is in check.
pub fn check<E: RulesEngine>(session: &Session, engine: &E) -> Option<Side> {
    let to_move = session.turn_owner;
    engine.is_in_check(to_move).then_some(to_move)
}

/// The wire payload for `record`, which must be the last entry of the log.
fn payload(session: &Session, record: &MoveRecord, clock: u64) -> MovePayload {
    MovePayload {
        start_sq_coords: record.from,
        end_sq_coords: record.to,
        my_time: clock,
        last_pawn_action: record.promotion,
        ply: u32::try_from(session.move_count().saturating_sub(1)).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::RoleAssignment;
    use crate::testing::FakeEngine;
    use duel_types::{RoomId, RuleSet, SenderId, Tiebreak};

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    fn session(local: Side) -> Session {
        let mut s = Session::with_tiebreak(
            RoomId::from("abc123"),
            SenderId::from("me"),
            RuleSet::standard(),
            Tiebreak::new(1),
        );
        s.assign(
            RoleAssignment {
                local,
                remote: local.opposite(),
            },
            SenderId::from("them"),
            Tiebreak::new(2),
        );
        s
    }

    fn remote(from: &str, to: &str) -> MovePayload {
        MovePayload {
            start_sq_coords: sq(from),
            end_sq_coords: sq(to),
            my_time: 1_000,
            last_pawn_action: None,
            ply: None,
        }
    }

    // ===== Local Move Tests =====

    #[test]
    fn local_move_is_recorded_and_sent() {
        let mut s = session(Side::White);
        let mut engine = FakeEngine::new();
        let result = send_local_move(&mut s, &mut engine, sq("e2"), sq("e4"), None, 77).unwrap();

        match result {
            LocalMove::Sent(p) => {
                assert_eq!(p.start_sq_coords, sq("e2"));
                assert_eq!(p.end_sq_coords, sq("e4"));
                assert_eq!(p.my_time, 77);
                assert_eq!(p.last_pawn_action, None);
            }
            other => panic!("Expected Sent, got {:?}", other),
        }
        assert_eq!(s.move_count(), 1);
        assert_eq!(s.turn_owner, Side::Black);
        assert_eq!(s.moved_to, vec![sq("e4")]);
    }

    #[test]
    fn illegal_local_move_changes_nothing() {
        let mut s = session(Side::White);
        let mut engine = FakeEngine::new().reject("e2", "e4");
        let result = send_local_move(&mut s, &mut engine, sq("e2"), sq("e4"), None, 0);

        assert!(matches!(result, Err(SessionError::InvalidMove { .. })));
        assert_eq!(s.move_count(), 0);
        assert_eq!(s.turn_owner, Side::White);
        assert!(engine.moves().is_empty());
    }

    #[test]
    fn local_move_out_of_turn() {
        let mut s = session(Side::Black);
        let mut engine = FakeEngine::new();
        let result = send_local_move(&mut s, &mut engine, sq("e7"), sq("e5"), None, 0);
        assert!(matches!(result, Err(SessionError::OutOfTurn)));
        assert!(engine.moves().is_empty());
    }

    #[test]
    fn promotion_waits_for_choice() {
        let mut s = session(Side::White);
        let mut engine = FakeEngine::new().promote_on("a8");

        let result = send_local_move(&mut s, &mut engine, sq("a7"), sq("a8"), None, 0).unwrap();
        assert_eq!(result, LocalMove::AwaitingPromotion);
        assert_eq!(s.move_count(), 0);
        assert!(s.pending_promotion.is_some());

        let again = send_local_move(&mut s, &mut engine, sq("b2"), sq("b3"), None, 0);
        assert!(matches!(again, Err(SessionError::PromotionPending)));

        let p = complete_promotion(&mut s, &mut engine, PieceKind::Knight, 5).unwrap();
        assert_eq!(p.last_pawn_action, Some(PieceKind::Knight));
        assert_eq!(s.move_count(), 1);
        assert_eq!(s.move_log[0].promotion, Some(PieceKind::Knight));
        assert!(s.pending_promotion.is_none());
    }

    #[test]
    fn promotion_given_up_front() {
        let mut s = session(Side::White);
        let mut engine = FakeEngine::new().promote_on("a8");
        let result =
            send_local_move(&mut s, &mut engine, sq("a7"), sq("a8"), Some(PieceKind::Queen), 0)
                .unwrap();
        assert!(matches!(result, LocalMove::Sent(p) if p.last_pawn_action == Some(PieceKind::Queen)));
    }

    #[test]
    fn complete_without_pending_fails() {
        let mut s = session(Side::White);
        let mut engine = FakeEngine::new();
        let result = complete_promotion(&mut s, &mut engine, PieceKind::Queen, 0);
        assert!(matches!(result, Err(SessionError::NoPendingPromotion)));
    }

    // ===== Remote Move Tests =====

    #[test]
    fn remote_move_is_applied() {
        let mut s = session(Side::Black);
        let mut engine = FakeEngine::new();
        let result = receive_remote_move(&mut s, &mut engine, &remote("e2", "e4")).unwrap();

        assert!(matches!(result, RemoteMove::Applied(r) if r.originator == Side::White));
        assert_eq!(s.move_count(), 1);
        assert_eq!(s.turn_owner, Side::Black);
        assert_eq!(s.last_remote_clock, Some(1_000));
    }

    #[test]
    fn redelivered_move_is_duplicate() {
        let mut s = session(Side::Black);
        let mut engine = FakeEngine::new();
        receive_remote_move(&mut s, &mut engine, &remote("e2", "e4")).unwrap();
        let again = receive_remote_move(&mut s, &mut engine, &remote("e2", "e4")).unwrap();

        assert_eq!(again, RemoteMove::Duplicate);
        assert_eq!(s.move_count(), 1);
        assert_eq!(engine.moves().len(), 1);
    }

    /// White shuffles a knight out and back; the first `g1 -> f3` arrives
    /// again once White owns the turn and the move is legal again.
    fn knight_shuffle(first: &MovePayload) -> (Session, FakeEngine) {
        let mut s = session(Side::Black);
        let mut engine = FakeEngine::new();
        receive_remote_move(&mut s, &mut engine, first).unwrap();
        send_local_move(&mut s, &mut engine, sq("g8"), sq("f6"), None, 0).unwrap();
        let mut back = remote("f3", "g1");
        back.ply = first.ply.map(|_| 2);
        receive_remote_move(&mut s, &mut engine, &back).unwrap();
        send_local_move(&mut s, &mut engine, sq("f6"), sq("g8"), None, 0).unwrap();
        (s, engine)
    }

    #[test]
    fn late_redelivery_is_duplicate_by_ply() {
        let mut first = remote("g1", "f3");
        first.ply = Some(0);
        let (mut s, mut engine) = knight_shuffle(&first);

        let late = receive_remote_move(&mut s, &mut engine, &first).unwrap();
        assert_eq!(late, RemoteMove::Duplicate);
        assert_eq!(s.move_count(), 4);

        // The same move played again is a new ply and is applied.
        let mut replay = remote("g1", "f3");
        replay.ply = Some(4);
        let result = receive_remote_move(&mut s, &mut engine, &replay).unwrap();
        assert!(matches!(result, RemoteMove::Applied(_)));
        assert_eq!(s.move_count(), 5);
    }

    #[test]
    fn late_redelivery_without_ply_is_duplicate() {
        let (mut s, mut engine) = knight_shuffle(&remote("g1", "f3"));

        let late = receive_remote_move(&mut s, &mut engine, &remote("g1", "f3")).unwrap();
        assert_eq!(late, RemoteMove::Duplicate);
        assert_eq!(s.move_count(), 4);
        assert_eq!(engine.moves().len(), 4);

        let mut replay = remote("g1", "f3");
        replay.my_time = 900;
        let result = receive_remote_move(&mut s, &mut engine, &replay).unwrap();
        assert!(matches!(result, RemoteMove::Applied(_)));
    }

    #[test]
    fn move_from_a_future_ply_is_dropped() {
        let mut s = session(Side::Black);
        let mut engine = FakeEngine::new();
        let mut msg = remote("e2", "e4");
        msg.ply = Some(2);

        let result = receive_remote_move(&mut s, &mut engine, &msg).unwrap();
        assert_eq!(result, RemoteMove::OutOfTurn);
        assert_eq!(s.move_count(), 0);
    }

    #[test]
    fn local_moves_carry_their_ply() {
        let mut s = session(Side::White);
        let mut engine = FakeEngine::new();
        let first = send_local_move(&mut s, &mut engine, sq("e2"), sq("e4"), None, 0).unwrap();
        receive_remote_move(&mut s, &mut engine, &remote("e7", "e5")).unwrap();
        let second = send_local_move(&mut s, &mut engine, sq("g1"), sq("f3"), None, 0).unwrap();

        assert!(matches!(first, LocalMove::Sent(p) if p.ply == Some(0)));
        assert!(matches!(second, LocalMove::Sent(p) if p.ply == Some(2)));
    }

    #[test]
    fn remote_move_out_of_turn_is_dropped() {
        let mut s = session(Side::White);
        let mut engine = FakeEngine::new();
        let result = receive_remote_move(&mut s, &mut engine, &remote("e7", "e5")).unwrap();
        assert_eq!(result, RemoteMove::OutOfTurn);
        assert_eq!(s.move_count(), 0);
    }

    #[test]
    fn illegal_remote_move_rolls_back() {
        let mut s = session(Side::Black);
        let mut engine = FakeEngine::new().reject("e2", "e5");
        let result = receive_remote_move(&mut s, &mut engine, &remote("e2", "e5"));
        assert!(matches!(result, Err(SessionError::InvalidMove { .. })));
        assert_eq!(s.move_count(), 0);
    }

    #[test]
    fn remote_promotion_without_choice_rolls_back() {
        let mut s = session(Side::Black);
        let mut engine = FakeEngine::new().promote_on("a8");
        let before = engine.serialize_state();

        let result = receive_remote_move(&mut s, &mut engine, &remote("a7", "a8"));
        assert!(matches!(
            result,
            Err(SessionError::Engine(EngineError::InvalidPromotion))
        ));
        assert_eq!(engine.serialize_state(), before);
        assert_eq!(s.move_count(), 0);
    }

    #[test]
    fn remote_promotion_is_applied() {
        let mut s = session(Side::Black);
        let mut engine = FakeEngine::new().promote_on("a8");
        let mut msg = remote("a7", "a8");
        msg.last_pawn_action = Some(PieceKind::Bishop);

        let result = receive_remote_move(&mut s, &mut engine, &msg).unwrap();
        assert!(matches!(result, RemoteMove::Applied(r) if r.promotion == Some(PieceKind::Bishop)));
        assert!(!engine.has_pending_promotion());
    }

    // ===== Check Tests =====

    #[test]
    fn checkmate_names_the_mover_as_winner() {
        let mut s = session(Side::White);
        let mut engine = FakeEngine::new().checkmate_after(1);
        send_local_move(&mut s, &mut engine, sq("d1"), sq("h5"), None, 0).unwrap();

        let ended = checkmate(&s, &engine).unwrap();
        assert_eq!(ended.reason, EndReason::Checkmate);
        assert_eq!(ended.winner, Some(Side::White));
        assert_eq!(check(&s, &engine), Some(Side::Black));
    }

    #[test]
    fn no_checkmate_in_quiet_position() {
        let s = session(Side::White);
        let engine = FakeEngine::new();
        assert_eq!(checkmate(&s, &engine), None);
        assert_eq!(check(&s, &engine), None);
    }
}
