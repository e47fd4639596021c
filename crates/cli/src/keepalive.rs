// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background keepalive for the active connection.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::session::Session;
use crate::transport::Frame;

/// Default interval between pings.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Spawn a task that pings the active connection every `interval`.
///
/// Failures are logged only; reconnecting is left to the user.
pub fn spawn_keepalive(
    session: Arc<Session>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        timer.tick().await; // Consume the immediate first tick.

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            let Some(conn) = session.active().await else {
                continue;
            };
            if let Err(e) = conn.send(Frame::Ping(Bytes::new())).await {
                tracing::warn!(
                    room = %conn.room(),
                    generation = conn.generation(),
                    err = %e,
                    "error sending ping"
                );
            }
        }
    })
}
