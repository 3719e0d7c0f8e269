//! Peer liveness tracking.
//!
//! Purely advisory: the monitor reports when the peer goes quiet and when
//! it comes back, but never touches the session.

use std::time::{Duration, Instant};

use crate::error::SessionError;

/// How often a heartbeat is sent.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// How long the peer may stay silent before it is considered unreachable.
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(15);

/// A liveness transition, reported once per change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessChange {
    /// The peer has been silent longer than the timeout.
    Lost {
        /// Time since the peer was last heard from.
        elapsed: Duration,
    },
    /// The peer was heard from again after being lost.
    Restored,
}

/// Tracks when the peer was last heard from.
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    timeout: Duration,
    last_seen: Instant,
    lost: bool,
}

impl LivenessMonitor {
    /// Start monitoring as if the peer was just heard from.
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            last_seen: now,
            lost: false,
        }
    }

    /// Record a sign of life.
    pub fn record_ping(&mut self, now: Instant) {
        if now > self.last_seen {
            self.last_seen = now;
        }
    }

    /// Time since the peer was last heard from.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }

    /// Whether the peer has been silent for longer than the timeout.
    pub fn is_stale(&self, now: Instant) -> bool {
        self.elapsed(now) > self.timeout
    }

    /// Report a transition since the last poll, if any.
    pub fn poll(&mut self, now: Instant) -> Option<LivenessChange> {
        let stale = self.is_stale(now);
        match (stale, self.lost) {
            (true, false) => {
                self.lost = true;
                Some(LivenessChange::Lost {
                    elapsed: self.elapsed(now),
                })
            }
            (false, true) => {
                self.lost = false;
                Some(LivenessChange::Restored)
            }
            _ => None,
        }
    }

    /// Fail with [`SessionError::StaleConnection`] if the peer is stale.
    pub fn check(&self, now: Instant) -> Result<(), SessionError> {
        if self.is_stale(now) {
            return Err(SessionError::StaleConnection {
                elapsed: self.elapsed(now),
            });
        }
        Ok(())
    }

    /// When the peer was last heard from.
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// The configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
