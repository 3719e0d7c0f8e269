//! Background heartbeat task.
//!
//! Fires the relay's global heartbeat at a fixed interval, starting one
//! interval after launch. Each connection
//! turns a tick into a `ping` envelope for its own room, so peers keep
//! seeing traffic while the opponent is thinking.

use crate::server::DuelRelay;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant};

/// Spawn a background heartbeat task.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_heartbeat_task(
    relay: Arc<DuelRelay>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Heartbeat task started (interval: {:?})", period);

        let mut timer = interval_at(Instant::now() + period, period);

        loop {
            timer.tick().await;
            let reached = relay.pulse();
            tracing::debug!(
                "Heartbeat: {} connections in {} rooms ({} players)",
                reached,
                relay.total_rooms(),
                relay.total_clients()
            );
        }
    })
}
