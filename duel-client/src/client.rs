//! DuelClient - the main interface for duel-sync.
//!
//! This module provides [`DuelClient`], the primary API for applications
//! to play a two-peer game through a room relay.
//!
//! # Architecture
//!
//! DuelClient owns a pure [`SessionController`] (from duel-core) for
//! protocol logic and interprets the actions it returns to perform actual
//! I/O via the Transport trait.
//!
//! ```text
//! Application → DuelClient → Transport → Relay
//!                   ↓
//!              duel-core (pure controller)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use duel_client::{ClientConfig, DuelClient, WebSocketTransport};
//!
//! let config = ClientConfig::new("ws://localhost:8080", RoomId::from("a1b2c3"));
//! let client = DuelClient::new(config, WebSocketTransport::new(), engine);
//!
//! client.connect().await?;
//! let (tx, mut rx) = tokio::sync::mpsc::channel(32);
//! tokio::spawn(async move { client.run(tx).await });
//! while let Some(event) = rx.recv().await { /* update the UI */ }
//! ```

use std::time::{Duration, Instant};

use duel_core::{
    Action, RulesEngine, Session, SessionController, SessionError, SessionEvent, SessionPhase,
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_LIVENESS_TIMEOUT,
};
use duel_types::{Envelope, PieceKind, RoomId, RuleSet, SenderId, Square, Tiebreak, WireError};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::transport::{Transport, TransportError};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The session rejected the command.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// An outbound message could not be encoded.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Not connected to relay.
    #[error("not connected")]
    NotConnected,

    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

/// Configuration for DuelClient.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the relay (`ws://host:port`).
    pub relay_url: String,
    /// Room shared with the opponent.
    pub room_id: RoomId,
    /// Rule set to play under.
    pub rule_set: RuleSet,
    /// Our per-connection id.
    pub sender_id: SenderId,
    /// How often a heartbeat is sent.
    pub heartbeat_interval: Duration,
    /// How long the peer may stay silent before it is reported lost.
    pub liveness_timeout: Duration,
    /// Fixed tiebreak; random when unset.
    pub tiebreak: Option<Tiebreak>,
}

impl ClientConfig {
    /// Create a configuration with a fresh sender id and default timings.
    pub fn new(relay_url: &str, room_id: RoomId) -> Self {
        Self {
            relay_url: relay_url.to_string(),
            room_id,
            rule_set: RuleSet::standard(),
            sender_id: SenderId::random(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            liveness_timeout: DEFAULT_LIVENESS_TIMEOUT,
            tiebreak: None,
        }
    }

    /// Set the rule set.
    pub fn with_rule_set(mut self, rule_set: RuleSet) -> Self {
        self.rule_set = rule_set;
        self
    }

    /// Set the sender id.
    pub fn with_sender_id(mut self, sender_id: SenderId) -> Self {
        self.sender_id = sender_id;
        self
    }

    /// Set the heartbeat interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the liveness timeout.
    pub fn with_liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = timeout;
        self
    }

    /// Pin the tiebreak instead of drawing a random one.
    pub fn with_tiebreak(mut self, tiebreak: Tiebreak) -> Self {
        self.tiebreak = Some(tiebreak);
        self
    }

    /// The relay URL for this room and connection.
    pub fn websocket_url(&self) -> String {
        format!(
            "{}/websocket/{}/{}/{}",
            self.relay_url.trim_end_matches('/'),
            self.room_id,
            self.sender_id,
            self.rule_set
        )
    }
}

/// The main duel client.
///
/// Manages the relay connection and drives a [`SessionController`].
pub struct DuelClient<T: Transport, E: RulesEngine + Send> {
    config: ClientConfig,
    transport: T,
    controller: Mutex<SessionController<E>>,
}

impl<T: Transport, E: RulesEngine + Send> DuelClient<T, E> {
    /// Create a new DuelClient around a rules engine.
    pub fn new(config: ClientConfig, transport: T, engine: E) -> Self {
        let session = match config.tiebreak {
            Some(tiebreak) => Session::with_tiebreak(
                config.room_id.clone(),
                config.sender_id.clone(),
                config.rule_set.clone(),
                tiebreak,
            ),
            None => Session::new(
                config.room_id.clone(),
                config.sender_id.clone(),
                config.rule_set.clone(),
            ),
        };
        let controller = SessionController::from_session(session, engine, Instant::now())
            .with_liveness_timeout(config.liveness_timeout);
        Self {
            config,
            transport,
            controller: Mutex::new(controller),
        }
    }

    /// Connect to the relay and announce ourselves with `join`.
    pub async fn connect(&self) -> Result<Vec<SessionEvent>, ClientError> {
        let url = self.config.websocket_url();
        self.transport
            .connect(&url)
            .await
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;
        info!(room = %self.config.room_id, sender = %self.config.sender_id, "connected to relay");

        let actions = self.controller.lock().await.start();
        self.execute(actions).await
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Announce our departure and close the connection.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        if self.transport.is_connected() {
            let actions = self.controller.lock().await.leave();
            self.execute(actions).await?;
        }
        self.transport.close().await?;
        Ok(())
    }

    /// Receive and handle the next inbound frame.
    pub async fn recv_next(&self) -> Result<Vec<SessionEvent>, ClientError> {
        let frame = self.transport.recv().await?;
        self.process_bytes(&frame).await
    }

    /// Handle one inbound frame. Frames that are not a valid envelope are
    /// logged and dropped.
    pub async fn process_bytes(&self, frame: &[u8]) -> Result<Vec<SessionEvent>, ClientError> {
        let envelope = match std::str::from_utf8(frame)
            .map_err(|e| e.to_string())
            .and_then(|text| Envelope::from_json(text).map_err(|e| e.to_string()))
        {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(%error, len = frame.len(), "dropping malformed frame");
                return Ok(Vec::new());
            }
        };

        let actions = self
            .controller
            .lock()
            .await
            .handle_envelope(&envelope, Instant::now());
        self.execute(actions).await
    }

    // ===== Local Commands =====

    /// Play a move. `clock` is our remaining time, passed through to the peer.
    pub async fn play_move(
        &self,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
        clock: u64,
    ) -> Result<Vec<SessionEvent>, ClientError> {
        self.command(|c| c.play_move(from, to, promotion, clock)).await
    }

    /// Supply the promotion piece for a waiting move.
    pub async fn choose_promotion(
        &self,
        kind: PieceKind,
        clock: u64,
    ) -> Result<Vec<SessionEvent>, ClientError> {
        self.command(|c| c.choose_promotion(kind, clock)).await
    }

    /// Offer a draw.
    pub async fn offer_draw(&self) -> Result<Vec<SessionEvent>, ClientError> {
        self.command(|c| c.offer_draw()).await
    }

    /// Accept or decline the peer's draw offer.
    pub async fn answer_draw(&self, accept: bool) -> Result<Vec<SessionEvent>, ClientError> {
        self.command(|c| c.answer_draw(accept)).await
    }

    /// Resign the game.
    pub async fn resign(&self) -> Result<Vec<SessionEvent>, ClientError> {
        self.command(|c| c.resign()).await
    }

    /// Start a new game after the current one ended.
    pub async fn rematch(&self) -> Result<Vec<SessionEvent>, ClientError> {
        self.command(|c| c.rematch()).await
    }

    /// Redraw the tiebreak after a collision.
    pub async fn renegotiate(&self) -> Result<Vec<SessionEvent>, ClientError> {
        self.command(|c| c.renegotiate()).await
    }

    /// Send a heartbeat and report liveness transitions.
    pub async fn pulse(&self) -> Result<Vec<SessionEvent>, ClientError> {
        let actions = {
            let mut controller = self.controller.lock().await;
            let mut actions = controller.heartbeat();
            actions.extend(controller.tick(Instant::now()));
            actions
        };
        self.execute(actions).await
    }

    /// Drive the session until the connection closes or `events` is dropped.
    ///
    /// Inbound frames and heartbeats are interleaved with `select!`; every
    /// resulting [`SessionEvent`] is forwarded to `events`.
    pub async fn run(&self, events: mpsc::Sender<SessionEvent>) -> Result<(), ClientError> {
        let period = self.config.heartbeat_interval.max(Duration::from_millis(1));
        let mut heartbeat = tokio::time::interval(period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        heartbeat.tick().await;

        loop {
            let emitted = tokio::select! {
                frame = self.transport.recv() => match frame {
                    Ok(frame) => self.process_bytes(&frame).await?,
                    Err(TransportError::ConnectionClosed) => {
                        info!(room = %self.config.room_id, "relay connection closed");
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                },
                _ = heartbeat.tick() => self.pulse().await?,
            };

            for event in emitted {
                if events.send(event).await.is_err() {
                    debug!("event receiver dropped, stopping");
                    return Ok(());
                }
            }
        }
    }

    // ===== Accessors =====

    /// Current lifecycle phase.
    pub async fn phase(&self) -> SessionPhase {
        self.controller.lock().await.phase()
    }

    /// A copy of the current session.
    pub async fn session(&self) -> Session {
        self.controller.lock().await.session().clone()
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the transport (for testing).
    pub fn transport(&self) -> &T {
        &self.transport
    }

    // ===== Internals =====

    async fn command<F>(&self, f: F) -> Result<Vec<SessionEvent>, ClientError>
    where
        F: FnOnce(&mut SessionController<E>) -> Result<Vec<Action>, SessionError>,
    {
        if !self.transport.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let actions = {
            let mut controller = self.controller.lock().await;
            f(&mut *controller)?
        };
        self.execute(actions).await
    }

    /// Transmit `Send` actions and collect `Emit` events. Called without
    /// holding the controller lock.
    async fn execute(&self, actions: Vec<Action>) -> Result<Vec<SessionEvent>, ClientError> {
        let mut events = Vec::new();
        for action in actions {
            match action {
                Action::Send(message) => {
                    let envelope = Envelope::seal(
                        self.config.sender_id.clone(),
                        self.config.room_id.clone(),
                        &message,
                    )?;
                    debug!(message_type = %message.message_type(), "sending");
                    self.transport.send(envelope.to_json()?.as_bytes()).await?;
                }
                Action::Emit(event) => events.push(event),
            }
        }
        Ok(events)
    }
}

impl<T: Transport, E: RulesEngine + Send> std::fmt::Debug for DuelClient<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuelClient")
            .field("room_id", &self.config.room_id)
            .field("sender_id", &self.config.sender_id)
            .field("connected", &self.transport.is_connected())
            .finish()
    }
}
