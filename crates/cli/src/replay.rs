// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generation-gated dedup between history replay and live delivery.
//!
//! Joining a room renders its history directly while the reader is already
//! queueing live messages for the new connection. `ReplayGate` holds the
//! dispatcher back until the history block is on screen, then drops:
//! - entries from an older generation (a room that was left), and
//! - entries whose id was already rendered by the replay.
//!
//! Ordering guarantee: for one generation, every history line renders before
//! any live line.

use std::collections::HashSet;

use tokio::sync::watch;

use crate::message::UNASSIGNED_ID;

/// Decision for one queued delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admit {
    Render,
    /// Belongs to a superseded connection.
    Stale,
    /// Already rendered by history replay.
    Duplicate,
}

#[derive(Debug, Default)]
struct GateState {
    generation: u64,
    replaying: bool,
    replayed: HashSet<i64>,
}

/// Shared gate between the connection manager and the display dispatcher.
pub struct ReplayGate {
    state: watch::Sender<GateState>,
}

impl Default for ReplayGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayGate {
    pub fn new() -> Self {
        let (state, _) = watch::channel(GateState::default());
        Self { state }
    }

    /// Enter replay for `generation`. Live deliveries are held until the
    /// returned guard is dropped.
    pub fn begin(&self, generation: u64) -> ReplayGuard<'_> {
        self.state.send_modify(|s| {
            s.generation = generation;
            s.replaying = true;
            s.replayed.clear();
        });
        ReplayGuard { gate: self, generation }
    }

    /// Current generation as last announced by [`begin`](Self::begin).
    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    pub fn is_replaying(&self) -> bool {
        self.state.borrow().replaying
    }

    /// Wait out any replay in progress, then decide what to do with a delivery.
    pub async fn admit(&self, generation: u64, id: i64) -> Admit {
        let mut rx = self.state.subscribe();
        let Ok(state) = rx.wait_for(|s| !s.replaying).await else {
            return Admit::Render;
        };
        if generation < state.generation {
            Admit::Stale
        } else if id != UNASSIGNED_ID && generation == state.generation && state.replayed.contains(&id) {
            Admit::Duplicate
        } else {
            Admit::Render
        }
    }

    fn record(&self, generation: u64, id: i64) {
        if id == UNASSIGNED_ID {
            return;
        }
        self.state.send_if_modified(|s| {
            if s.generation == generation {
                s.replayed.insert(id)
            } else {
                false
            }
        });
    }

    fn finish(&self, generation: u64) {
        self.state.send_if_modified(|s| {
            if s.generation == generation && s.replaying {
                s.replaying = false;
                true
            } else {
                false
            }
        });
    }
}

/// Marks a replay in progress. Dropping it releases held deliveries.
pub struct ReplayGuard<'a> {
    gate: &'a ReplayGate,
    generation: u64,
}

impl ReplayGuard<'_> {
    /// Note a history message as rendered.
    pub fn record(&mut self, id: i64) {
        self.gate.record(self.generation, id);
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        self.gate.finish(self.generation);
    }
}

#[cfg(test)]
#[path = "replay_tests.rs"]
mod tests;
