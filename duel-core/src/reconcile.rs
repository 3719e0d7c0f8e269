//! State reconciliation for a peer that rejoins mid-game.
//!
//! The peer that still holds the game answers a `join` with a `reset`
//! carrying a [`SessionSnapshot`]. The rejoining peer restores it with the
//! perspective swapped: the sender's "remote" fields become our "local"
//! fields and vice versa.

use duel_types::{RoomId, SenderId, SessionSnapshot, Side, Tiebreak};

use crate::engine::{EngineError, RulesEngine};
use crate::error::SessionError;
use crate::session::Session;

/// Capture the full session state, from our point of view.
///
/// A local move waiting for its promotion choice has not been recorded
/// yet, so the engine state from before that move is captured instead.
pub fn snapshot<E: RulesEngine>(
    session: &Session,
    engine: &E,
) -> Result<SessionSnapshot, SessionError> {
    let (Some(local_side), Some(remote_side)) = (session.local_side, session.remote_side) else {
        return Err(SessionError::NotReady);
    };

    let game_dump = match &session.pending_promotion {
        Some(pending) => pending.checkpoint.clone(),
        None => engine.serialize_state(),
    };

    Ok(SessionSnapshot {
        game_dump,
        rule_set: session.rule_set.clone(),
        white_id: session.id_for(Side::White).cloned(),
        black_id: session.id_for(Side::Black).cloned(),
        local_side,
        remote_side,
        local_tiebreak: session.local_tiebreak,
        remote_tiebreak: session.remote_tiebreak,
        turn_owner: session.turn_owner,
        moved_from: session.moved_from.clone(),
        moved_to: session.moved_to.clone(),
        move_log: session.move_log.clone(),
    })
}

/// Build our session from a peer's snapshot.
///
/// All-or-nothing: the engine is checkpointed first and rolled back if the
/// blob is rejected or disagrees with the snapshot about the side to move.
pub fn restore<E: RulesEngine>(
    snapshot: &SessionSnapshot,
    engine: &mut E,
    room_id: RoomId,
    local_id: SenderId,
) -> Result<Session, SessionError> {
    if snapshot.local_side == snapshot.remote_side {
        return Err(EngineError::CorruptState("snapshot assigns both peers one side".into()).into());
    }

    let checkpoint = engine.serialize_state();
    if let Err(e) = engine.restore_state(&snapshot.game_dump) {
        let _ = engine.restore_state(&checkpoint);
        return Err(e.into());
    }
    if engine.turn_owner() != snapshot.turn_owner {
        let _ = engine.restore_state(&checkpoint);
        return Err(EngineError::CorruptState(format!(
            "engine has {} to move, snapshot has {}",
            engine.turn_owner(),
            snapshot.turn_owner
        ))
        .into());
    }

    let remote_id = match snapshot.local_side {
        Side::White => snapshot.white_id.clone(),
        Side::Black => snapshot.black_id.clone(),
    };

    Ok(Session {
        room_id,
        local_id,
        remote_id,
        rule_set: snapshot.rule_set.clone(),
        local_side: Some(snapshot.remote_side),
        remote_side: Some(snapshot.local_side),
        local_tiebreak: snapshot.remote_tiebreak.unwrap_or_else(Tiebreak::random),
        remote_tiebreak: Some(snapshot.local_tiebreak),
        turn_owner: snapshot.turn_owner,
        move_log: snapshot.move_log.clone(),
        pending_promotion: None,
        moved_from: snapshot.moved_from.clone(),
        moved_to: snapshot.moved_to.clone(),
        last_remote_clock: None,
        seen_remote_moves: Default::default(),
    })
}
