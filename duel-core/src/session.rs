//! The per-game session record.

use std::collections::HashSet;

use duel_types::{
    MovePayload, MoveRecord, PieceKind, RoomId, RuleSet, SenderId, Side, Square, StateBlob, Tiebreak,
};

use crate::engine::MoveOutcome;
use crate::role::RoleAssignment;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Both peers agreed to a draw
    Draw,
    /// One peer resigned
    Resignation,
    /// The side to move was checkmated
    Checkmate,
}

/// Terminal outcome of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEnded {
    /// How the session ended
    pub reason: EndReason,
    /// The winning side, `None` for a draw
    pub winner: Option<Side>,
}

impl SessionEnded {
    /// A drawn session.
    pub fn draw() -> Self {
        Self {
            reason: EndReason::Draw,
            winner: None,
        }
    }

    /// A session won by `winner`.
    pub fn won(reason: EndReason, winner: Side) -> Self {
        Self {
            reason,
            winner: Some(winner),
        }
    }
}

/// A local move the engine has applied but that waits for a promotion
/// choice before it is recorded and transmitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPromotion {
    /// Origin square
    pub from: Square,
    /// Destination square
    pub to: Square,
    /// What the engine moved
    pub outcome: MoveOutcome,
    /// Engine state from before the move
    pub checkpoint: StateBlob,
}

/// Identity of a remote `move` payload: squares, promotion and the sender's
/// clock. Used to spot redeliveries of payloads that carry no ply index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoveKey {
    from: Square,
    to: Square,
    promotion: Option<PieceKind>,
    clock: u64,
}

impl From<&MovePayload> for MoveKey {
    fn from(msg: &MovePayload) -> Self {
        Self {
            from: msg.start_sq_coords,
            to: msg.end_sq_coords,
            promotion: msg.last_pawn_action,
            clock: msg.my_time,
        }
    }
}

/// Everything one peer knows about the game in progress.
///
/// Owned by the [`SessionController`](crate::SessionController); created on
/// join and replaced wholesale on reset or rematch.
#[derive(Debug, Clone)]
pub struct Session {
    /// Room this session lives in
    pub room_id: RoomId,
    /// Our per-connection id
    pub local_id: SenderId,
    /// The peer's per-connection id, once heard from
    pub remote_id: Option<SenderId>,
    /// Rule set we play under
    pub rule_set: RuleSet,
    /// Our side, once negotiated
    pub local_side: Option<Side>,
    /// The peer's side, once negotiated
    pub remote_side: Option<Side>,
    /// Our tiebreak
    pub local_tiebreak: Tiebreak,
    /// The peer's tiebreak, once announced
    pub remote_tiebreak: Option<Tiebreak>,
    /// Side to move
    pub turn_owner: Side,
    /// Applied moves in turn order
    pub move_log: Vec<MoveRecord>,
    /// Local move waiting for a promotion choice
    pub pending_promotion: Option<PendingPromotion>,
    /// Squares vacated by the last move
    pub moved_from: Vec<Square>,
    /// Squares occupied by the last move
    pub moved_to: Vec<Square>,
    /// The peer's clock as of its last move (advisory)
    pub last_remote_clock: Option<u64>,
    /// Remote payloads applied in this session
    pub seen_remote_moves: HashSet<MoveKey>,
}

impl Session {
    /// A fresh, unnegotiated session with a random tiebreak.
    pub fn new(room_id: RoomId, local_id: SenderId, rule_set: RuleSet) -> Self {
        Self::with_tiebreak(room_id, local_id, rule_set, Tiebreak::random())
    }

    /// A fresh, unnegotiated session with a fixed tiebreak.
    pub fn with_tiebreak(
        room_id: RoomId,
        local_id: SenderId,
        rule_set: RuleSet,
        local_tiebreak: Tiebreak,
    ) -> Self {
        Self {
            room_id,
            local_id,
            remote_id: None,
            rule_set,
            local_side: None,
            remote_side: None,
            local_tiebreak,
            remote_tiebreak: None,
            turn_owner: Side::White,
            move_log: Vec::new(),
            pending_promotion: None,
            moved_from: Vec::new(),
            moved_to: Vec::new(),
            last_remote_clock: None,
            seen_remote_moves: HashSet::new(),
        }
    }

    /// Number of recorded moves.
    pub fn move_count(&self) -> usize {
        self.move_log.len()
    }

    /// Whether sides have been assigned.
    pub fn is_negotiated(&self) -> bool {
        self.local_side.is_some() && self.remote_side.is_some()
    }

    /// Whether we may move now.
    pub fn local_owns_turn(&self) -> bool {
        self.local_side == Some(self.turn_owner)
    }

    /// Sender id of whoever plays `side`.
    pub fn id_for(&self, side: Side) -> Option<&SenderId> {
        if self.local_side == Some(side) {
            Some(&self.local_id)
        } else if self.remote_side == Some(side) {
            self.remote_id.as_ref()
        } else {
            None
        }
    }

    /// Record the outcome of role negotiation with `remote_id`.
    pub fn assign(&mut self, roles: RoleAssignment, remote_id: SenderId, remote_tiebreak: Tiebreak) {
        self.local_side = Some(roles.local);
        self.remote_side = Some(roles.remote);
        self.remote_id = Some(remote_id);
        self.remote_tiebreak = Some(remote_tiebreak);
    }

    /// Append a move, flip the turn and move the last-move cursors.
    pub(crate) fn record(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
        originator: Side,
        outcome: &MoveOutcome,
    ) -> MoveRecord {
        let record = MoveRecord {
            from,
            to,
            promotion,
            originator,
        };
        self.move_log.push(record);
        self.turn_owner = originator.opposite();
        self.moved_from = outcome.from_squares();
        self.moved_to = outcome.to_squares();
        record
    }

    /// The most recent move made by `side`.
    pub fn last_move_by(&self, side: Side) -> Option<&MoveRecord> {
        self.move_log.iter().rev().find(|r| r.originator == side)
    }
}
