//! `GET /health`: liveness plus a snapshot of room occupancy.

use crate::server::DuelRelay;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;

/// Room counts reported by the health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoomStats {
    /// Live rooms.
    pub live: usize,
    /// Rooms with one player waiting for an opponent.
    pub waiting: usize,
    /// Rooms that turn new players away.
    pub full: usize,
}

/// Health check body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Always `"ok"` while the relay answers.
    pub status: &'static str,
    /// Crate version of the running relay.
    pub version: &'static str,
    /// Room occupancy.
    pub rooms: RoomStats,
    /// Open player connections across all rooms.
    pub players: usize,
    /// Seconds between relay pings.
    pub heartbeat_interval_secs: u64,
    /// Seconds since the relay started.
    pub uptime_seconds: u64,
}

impl HealthStatus {
    /// Snapshot the relay's current state.
    pub fn of(relay: &DuelRelay) -> Self {
        let occupancy = relay.occupancy();
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            rooms: RoomStats {
                live: relay.total_rooms(),
                waiting: occupancy.waiting,
                full: occupancy.full,
            },
            players: relay.total_clients(),
            heartbeat_interval_secs: relay.config().rooms.heartbeat_interval().as_secs(),
            uptime_seconds: relay.uptime().as_secs(),
        }
    }
}

/// Health check handler.
pub async fn health_handler(Extension(relay): Extension<Arc<DuelRelay>>) -> Json<HealthStatus> {
    Json(HealthStatus::of(&relay))
}
