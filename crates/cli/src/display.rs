// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Display dispatcher: drains the queue in order and renders each entry
//! over the input line.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::queue::{Delivery, DisplayRx};
use crate::render::Renderer;
use crate::replay::{Admit, ReplayGate};

/// Spawn the dispatcher task.
pub fn spawn_dispatcher(
    mut queue: DisplayRx,
    renderer: Arc<Renderer>,
    gate: Arc<ReplayGate>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let delivery = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = queue.next() => match next {
                    Some(d) => d,
                    None => break,
                },
            };
            dispatch(&renderer, &gate, delivery).await;
        }
    })
}

/// Render one delivery unless it is stale or already shown by history replay.
pub async fn dispatch(renderer: &Renderer, gate: &ReplayGate, delivery: Delivery) {
    let Delivery { generation, message } = delivery;
    match gate.admit(generation, message.id).await {
        Admit::Render => renderer.render_live(&message),
        Admit::Stale => {
            debug!(generation, room = %message.chat_room, "dropping message from a previous room")
        }
        Admit::Duplicate => debug!(id = message.id, "dropping message already shown in history"),
    }
}

#[cfg(test)]
#[path = "display_tests.rs"]
mod tests;
