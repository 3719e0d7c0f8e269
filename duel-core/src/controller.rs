//! Session controller: the single owner of a peer's session state.
//!
//! Every inbound envelope and every local command goes through
//! [`SessionController`], which dispatches it to exactly one component and
//! returns the resulting [`Action`]s. Nothing here performs I/O; the
//! caller (`duel-client`) sends the messages and surfaces the events.

use std::time::{Duration, Instant};

use duel_types::{
    Draw, Envelope, Init, Join, Leave, Message, MovePayload, MoveRecord, PieceKind,
    Ping, Reset, Resign, RoomId, RuleSet, SenderId, Side, Square, Tiebreak,
};
use tracing::{debug, info, warn};

use crate::engine::RulesEngine;
use crate::error::SessionError;
use crate::liveness::{LivenessChange, LivenessMonitor, DEFAULT_LIVENESS_TIMEOUT};
use crate::moves::{self, LocalMove, RemoteMove};
use crate::negotiation::{DrawAction, DrawEvent, DrawState};
use crate::reconcile;
use crate::role::resolve_side;
use crate::session::{EndReason, Session, SessionEnded};

/// Why session establishment was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Equal tiebreaks; recoverable with `renegotiate()`.
    TiebreakCollision,
    /// Different rule sets; fatal.
    RuleSetMismatch,
}

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for the peer's `join`, `init` or `reset`.
    Waiting,
    /// Sides are assigned and moves may be played.
    Playable,
    /// The game is over.
    Ended(SessionEnded),
    /// Establishment failed.
    Aborted(AbortReason),
}

/// Events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Sides were assigned.
    Ready {
        /// Our side.
        local_side: Side,
    },
    /// The peer rejoined a game in progress and was sent a snapshot.
    OpponentRejoined {
        /// Moves in the snapshot.
        move_count: usize,
    },
    /// We rejoined a game in progress from the peer's snapshot.
    Restored {
        /// Moves restored.
        move_count: usize,
        /// Our side in the restored game.
        local_side: Side,
    },
    /// The peer joined after the game ended; a fresh game has begun.
    RematchStarted,
    /// The peer's move was applied.
    MoveApplied(MoveRecord),
    /// The side to move is in check.
    Check {
        /// The side in check.
        side: Side,
    },
    /// A local move needs a promotion choice before it is sent.
    PromotionRequired {
        /// Origin square.
        from: Square,
        /// Destination square.
        to: Square,
    },
    /// The peer offers a draw.
    DrawOffered,
    /// The peer declined our draw offer.
    DrawDeclined,
    /// The game is over.
    Ended(SessionEnded),
    /// The peer announced its departure.
    OpponentLeft {
        /// Free-form text from the peer or relay.
        text: String,
    },
    /// Nothing heard from the peer for longer than the timeout.
    ConnectionLost {
        /// Time since the peer was last heard from.
        elapsed: Duration,
    },
    /// The peer was heard from again.
    ConnectionRestored,
    /// Session establishment failed.
    Aborted {
        /// Human-readable cause.
        reason: String,
        /// Whether the abort is permanent.
        fatal: bool,
    },
    /// The relay rejected us (e.g. the room is full).
    RelayNotice {
        /// Relay-provided text.
        text: String,
    },
}

impl From<LivenessChange> for SessionEvent {
    fn from(change: LivenessChange) -> Self {
        match change {
            LivenessChange::Lost { elapsed } => SessionEvent::ConnectionLost { elapsed },
            LivenessChange::Restored => SessionEvent::ConnectionRestored,
        }
    }
}

/// Instructions for the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Transmit this message to the room.
    Send(Message),
    /// Surface this event to the application.
    Emit(SessionEvent),
}

/// Owns one peer's [`Session`], rules engine, draw machine and liveness
/// monitor.
///
/// All mutation goes through `&mut self`, so each envelope is handled to
/// completion before the next.
pub struct SessionController<E: RulesEngine> {
    session: Session,
    engine: E,
    draw: DrawState,
    liveness: LivenessMonitor,
    phase: SessionPhase,
}

impl<E: RulesEngine> SessionController<E> {
    /// A controller for a fresh session with a random tiebreak.
    pub fn new(room_id: RoomId, local_id: SenderId, rule_set: RuleSet, engine: E, now: Instant) -> Self {
        Self::from_session(Session::new(room_id, local_id, rule_set), engine, now)
    }

    /// A controller around an existing session.
    pub fn from_session(session: Session, engine: E, now: Instant) -> Self {
        Self {
            session,
            engine,
            draw: DrawState::Idle,
            liveness: LivenessMonitor::new(DEFAULT_LIVENESS_TIMEOUT, now),
            phase: SessionPhase::Waiting,
        }
    }

    /// Set the liveness timeout.
    pub fn with_liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness = LivenessMonitor::new(timeout, self.liveness.last_seen());
        self
    }

    /// The current session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The rules engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// The draw negotiation state.
    pub fn draw_state(&self) -> DrawState {
        self.draw
    }

    /// The liveness monitor.
    pub fn liveness(&self) -> &LivenessMonitor {
        &self.liveness
    }

    /// Whether moves may be played.
    pub fn is_playable(&self) -> bool {
        self.phase == SessionPhase::Playable
    }

    // ===== Local Commands =====

    /// Announce ourselves to the room.
    pub fn start(&mut self) -> Vec<Action> {
        info!(
            room = %self.session.room_id,
            tiebreak = %self.session.local_tiebreak,
            "joining room"
        );
        vec![self.join_action()]
    }

    /// Play a move for the local side.
    pub fn play_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
        clock: u64,
    ) -> Result<Vec<Action>, SessionError> {
        self.ensure_playable()?;
        match moves::send_local_move(
            &mut self.session,
            &mut self.engine,
            from,
            to,
            promotion,
            clock,
        )? {
            LocalMove::Sent(payload) => Ok(self.after_local_move(payload)),
            LocalMove::AwaitingPromotion => {
                debug!(%from, %to, "waiting for promotion choice");
                Ok(vec![Action::Emit(SessionEvent::PromotionRequired { from, to })])
            }
        }
    }

    /// Supply the promotion piece for a waiting local move.
    pub fn choose_promotion(
        &mut self,
        kind: PieceKind,
        clock: u64,
    ) -> Result<Vec<Action>, SessionError> {
        self.ensure_playable()?;
        let payload = moves::complete_promotion(&mut self.session, &mut self.engine, kind, clock)?;
        Ok(self.after_local_move(payload))
    }

    /// Offer a draw. A no-op while an offer is outstanding.
    pub fn offer_draw(&mut self) -> Result<Vec<Action>, SessionError> {
        self.ensure_playable()?;
        Ok(self.apply_draw(DrawEvent::LocalOffer))
    }

    /// Accept or decline the peer's draw offer.
    pub fn answer_draw(&mut self, accept: bool) -> Result<Vec<Action>, SessionError> {
        self.ensure_playable()?;
        if !self.draw.awaiting_local_answer() {
            return Err(SessionError::NoDrawOffer);
        }
        Ok(self.apply_draw(DrawEvent::LocalAnswer { accept }))
    }

    /// Resign the game.
    pub fn resign(&mut self) -> Result<Vec<Action>, SessionError> {
        self.ensure_playable()?;
        let winner = self.session.remote_side.ok_or(SessionError::NotReady)?;
        let ended = SessionEnded::won(EndReason::Resignation, winner);
        self.phase = SessionPhase::Ended(ended);
        info!(room = %self.session.room_id, "resigned");
        Ok(vec![
            Action::Send(Message::Resign(Resign {
                text: "resigned".to_string(),
            })),
            Action::Emit(SessionEvent::Ended(ended)),
        ])
    }

    /// Announce our departure. Session state is kept.
    pub fn leave(&mut self) -> Vec<Action> {
        info!(room = %self.session.room_id, "leaving room");
        vec![Action::Send(Message::Leave(Leave {
            text: "Left the game".to_string(),
        }))]
    }

    /// Start a new game after the current one ended.
    pub fn rematch(&mut self) -> Result<Vec<Action>, SessionError> {
        if !matches!(self.phase, SessionPhase::Ended(_)) {
            return Err(SessionError::NotReady);
        }
        self.begin_rematch();
        info!(room = %self.session.room_id, "requesting rematch");
        Ok(vec![self.join_action()])
    }

    /// Redraw our tiebreak and announce again after a collision.
    pub fn renegotiate(&mut self) -> Result<Vec<Action>, SessionError> {
        match self.phase {
            SessionPhase::Waiting | SessionPhase::Aborted(AbortReason::TiebreakCollision) => {}
            SessionPhase::Playable => return Err(SessionError::NotReady),
            SessionPhase::Ended(_) | SessionPhase::Aborted(AbortReason::RuleSetMismatch) => {
                return Err(SessionError::SessionOver)
            }
        }
        self.session.local_tiebreak = Tiebreak::random();
        self.session.local_side = None;
        self.session.remote_side = None;
        self.phase = SessionPhase::Waiting;
        info!(tiebreak = %self.session.local_tiebreak, "renegotiating sides");
        Ok(vec![self.join_action()])
    }

    /// A heartbeat to send.
    pub fn heartbeat(&self) -> Vec<Action> {
        vec![Action::Send(Message::Ping(Ping::default()))]
    }

    /// Report liveness transitions as of `now`.
    pub fn tick(&mut self, now: Instant) -> Vec<Action> {
        self.liveness
            .poll(now)
            .map(|change| {
                if let LivenessChange::Lost { elapsed } = change {
                    warn!(?elapsed, "peer unreachable");
                }
                Action::Emit(change.into())
            })
            .into_iter()
            .collect()
    }

    /// Fail if the peer has been silent longer than the timeout.
    pub fn check_liveness(&self, now: Instant) -> Result<(), SessionError> {
        self.liveness.check(now)
    }

    // ===== Inbound Dispatch =====

    /// Handle one inbound envelope. Never fails: anything that cannot be
    /// applied is logged and dropped.
    pub fn handle_envelope(&mut self, envelope: &Envelope, now: Instant) -> Vec<Action> {
        if envelope.sender_id == self.session.local_id {
            return vec![];
        }
        if envelope.room_id != self.session.room_id {
            warn!(room = %envelope.room_id, "dropping envelope for another room");
            return vec![];
        }

        let message = match envelope.open() {
            Ok(message) => message,
            Err(e) => {
                let err = SessionError::MalformedEnvelope(e);
                warn!(sender = %envelope.sender_id, error = %err, "dropping envelope");
                return vec![];
            }
        };
        debug!(
            sender = %envelope.sender_id,
            message_type = %message.message_type(),
            "dispatching"
        );

        let mut actions = Vec::new();
        self.liveness.record_ping(now);
        if let Some(change) = self.liveness.poll(now) {
            info!("peer reachable again");
            actions.push(Action::Emit(change.into()));
        }

        let sender = envelope.sender_id.clone();
        actions.extend(match message {
            Message::Join(join) => self.on_join(sender, join),
            Message::Init(init) => self.on_init(sender, init),
            Message::Reset(reset) => self.on_reset(reset),
            Message::Move(payload) => self.on_move(payload),
            Message::Draw(draw) => self.on_draw(draw),
            Message::Resign(_) => self.on_resign(),
            Message::Leave(leave) => {
                info!(sender = %sender, "opponent left");
                vec![Action::Emit(SessionEvent::OpponentLeft { text: leave.text })]
            }
            Message::Ping(_) => vec![],
            Message::Error(notice) => {
                warn!(text = %notice.text, "relay notice");
                vec![Action::Emit(SessionEvent::RelayNotice { text: notice.text })]
            }
        });
        actions
    }

    fn on_join(&mut self, sender: SenderId, join: Join) -> Vec<Action> {
        let mut actions = Vec::new();
        match self.phase {
            SessionPhase::Aborted(AbortReason::RuleSetMismatch) => return actions,
            SessionPhase::Ended(_) => {
                info!("peer joined after the game ended, starting a rematch");
                self.begin_rematch();
                actions.push(Action::Emit(SessionEvent::RematchStarted));
            }
            _ => {}
        }

        if self.session.move_count() > 0 {
            self.answer_rejoin(sender, join.num, &mut actions);
            return actions;
        }

        actions.push(Action::Send(Message::Init(Init {
            rule_set: self.session.rule_set.clone(),
            num: self.session.local_tiebreak,
        })));
        actions.extend(self.negotiate(sender, join.num));
        actions
    }

    fn answer_rejoin(&mut self, sender: SenderId, num: Tiebreak, actions: &mut Vec<Action>) {
        self.session.remote_id = Some(sender);
        self.session.remote_tiebreak = Some(num);
        self.draw = DrawState::Idle;
        match reconcile::snapshot(&self.session, &self.engine) {
            Ok(game_data) => {
                let move_count = game_data.move_count();
                info!(move_count, "opponent rejoined, sending reset");
                actions.push(Action::Send(Message::Reset(Reset { game_data })));
                actions.push(Action::Emit(SessionEvent::OpponentRejoined { move_count }));
            }
            Err(e) => warn!(error = %e, "cannot snapshot session for rejoin"),
        }
    }

    fn on_init(&mut self, sender: SenderId, init: Init) -> Vec<Action> {
        match self.phase {
            SessionPhase::Waiting => {}
            SessionPhase::Playable if self.session.move_count() == 0 => {}
            _ => {
                debug!("ignoring init outside negotiation");
                return vec![];
            }
        }
        if init.rule_set != self.session.rule_set {
            let err = SessionError::RuleSetMismatch {
                local: self.session.rule_set.clone(),
                remote: init.rule_set,
            };
            return self.abort(AbortReason::RuleSetMismatch, err);
        }
        self.negotiate(sender, init.num)
    }

    fn negotiate(&mut self, sender: SenderId, num: Tiebreak) -> Vec<Action> {
        match resolve_side(self.session.local_tiebreak, num) {
            Ok(roles) => {
                let repeated = self.phase == SessionPhase::Playable
                    && self.session.local_side == Some(roles.local)
                    && self.session.remote_tiebreak == Some(num)
                    && self.session.remote_id.as_ref() == Some(&sender);
                self.session.assign(roles, sender, num);
                self.phase = SessionPhase::Playable;
                if repeated {
                    return vec![];
                }
                info!(local_side = %roles.local, "sides assigned");
                vec![Action::Emit(SessionEvent::Ready {
                    local_side: roles.local,
                })]
            }
            Err(err) => self.abort(AbortReason::TiebreakCollision, err),
        }
    }

    fn on_reset(&mut self, reset: Reset) -> Vec<Action> {
        if matches!(
            self.phase,
            SessionPhase::Ended(_) | SessionPhase::Aborted(AbortReason::RuleSetMismatch)
        ) {
            debug!("ignoring reset");
            return vec![];
        }

        let snapshot = reset.game_data;
        if snapshot.rule_set != self.session.rule_set {
            let err = SessionError::RuleSetMismatch {
                local: self.session.rule_set.clone(),
                remote: snapshot.rule_set,
            };
            return self.abort(AbortReason::RuleSetMismatch, err);
        }
        if snapshot.move_count() < self.session.move_count() {
            warn!(
                theirs = snapshot.move_count(),
                ours = self.session.move_count(),
                "ignoring reset older than local state"
            );
            return vec![];
        }

        let restored = reconcile::restore(
            &snapshot,
            &mut self.engine,
            self.session.room_id.clone(),
            self.session.local_id.clone(),
        );
        match restored {
            Ok(session) => {
                let move_count = session.move_count();
                let local_side = snapshot.remote_side;
                self.session = session;
                self.draw = DrawState::Idle;
                self.phase = SessionPhase::Playable;
                info!(move_count, %local_side, "session restored");

                let mut actions = vec![Action::Emit(SessionEvent::Restored {
                    move_count,
                    local_side,
                })];
                actions.extend(self.evaluate_position());
                actions
            }
            Err(e) => {
                warn!(error = %e, "rejected reset");
                vec![]
            }
        }
    }

    fn on_move(&mut self, payload: MovePayload) -> Vec<Action> {
        if !self.is_playable() {
            debug!(phase = ?self.phase, "ignoring move");
            return vec![];
        }
        match moves::receive_remote_move(&mut self.session, &mut self.engine, &payload) {
            Ok(RemoteMove::Applied(record)) => {
                debug!(from = %record.from, to = %record.to, "remote move applied");
                let mut actions = vec![Action::Emit(SessionEvent::MoveApplied(record))];
                actions.extend(self.evaluate_position());
                actions
            }
            Ok(RemoteMove::Duplicate) => {
                debug!("dropping redelivered move");
                vec![]
            }
            Ok(RemoteMove::OutOfTurn) => {
                warn!(
                    from = %payload.start_sq_coords,
                    to = %payload.end_sq_coords,
                    "dropping out-of-turn move"
                );
                vec![]
            }
            Err(e) => {
                warn!(error = %e, "rejected remote move");
                vec![]
            }
        }
    }

    fn on_draw(&mut self, draw: Draw) -> Vec<Action> {
        if !self.is_playable() {
            return vec![];
        }
        self.apply_draw(DrawEvent::Remote(draw.kind))
    }

    fn on_resign(&mut self) -> Vec<Action> {
        let (SessionPhase::Playable, Some(local)) = (self.phase, self.session.local_side) else {
            return vec![];
        };
        let ended = SessionEnded::won(EndReason::Resignation, local);
        self.phase = SessionPhase::Ended(ended);
        info!("opponent resigned");
        vec![Action::Emit(SessionEvent::Ended(ended))]
    }

    // ===== Helpers =====

    fn ensure_playable(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Playable => Ok(()),
            SessionPhase::Ended(_) => Err(SessionError::SessionOver),
            SessionPhase::Waiting | SessionPhase::Aborted(_) => Err(SessionError::NotReady),
        }
    }

    fn join_action(&self) -> Action {
        Action::Send(Message::Join(Join {
            num: self.session.local_tiebreak,
        }))
    }

    fn after_local_move(&mut self, payload: MovePayload) -> Vec<Action> {
        let mut actions = vec![Action::Send(Message::Move(payload))];
        actions.extend(self.evaluate_position());
        actions
    }

    /// Check and checkmate for the side to move.
    fn evaluate_position(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if let Some(ended) = moves::checkmate(&self.session, &self.engine) {
            info!(winner = ?ended.winner, "checkmate");
            self.phase = SessionPhase::Ended(ended);
            actions.push(Action::Emit(SessionEvent::Ended(ended)));
        } else if let Some(side) = moves::check(&self.session, &self.engine) {
            actions.push(Action::Emit(SessionEvent::Check { side }));
        }
        actions
    }

    fn apply_draw(&mut self, event: DrawEvent) -> Vec<Action> {
        let (state, draw_actions) = self.draw.on_event(event);
        self.draw = state;

        let mut actions = Vec::with_capacity(draw_actions.len());
        for action in draw_actions {
            actions.push(match action {
                DrawAction::Send(kind) => Action::Send(Message::Draw(Draw { kind })),
                DrawAction::OfferReceived => Action::Emit(SessionEvent::DrawOffered),
                DrawAction::Declined => Action::Emit(SessionEvent::DrawDeclined),
                DrawAction::Agreed => {
                    let ended = SessionEnded::draw();
                    self.phase = SessionPhase::Ended(ended);
                    info!("draw agreed");
                    Action::Emit(SessionEvent::Ended(ended))
                }
            });
        }
        actions
    }

    fn begin_rematch(&mut self) {
        self.engine.reset();
        self.session = Session::new(
            self.session.room_id.clone(),
            self.session.local_id.clone(),
            self.session.rule_set.clone(),
        );
        self.draw = DrawState::Idle;
        self.phase = SessionPhase::Waiting;
    }

    fn abort(&mut self, reason: AbortReason, err: SessionError) -> Vec<Action> {
        warn!(error = %err, "session establishment aborted");
        self.phase = SessionPhase::Aborted(reason);
        vec![Action::Emit(SessionEvent::Aborted {
            reason: err.to_string(),
            fatal: err.is_fatal(),
        })]
    }
}
