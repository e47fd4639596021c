// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection manager: the single owner of "which connection is active".
//!
//! The session lock guards the room, the active [`Connection`] and the
//! generation counter. It is held across dial during a room switch (so
//! switches serialize) but never across a read or a close handshake, and it
//! is released before history replay so the reader and keepalive can use
//! the new connection while the backlog is fetched.

use std::sync::Arc;

use chrono::Local;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::error::{ConnectError, SendError};
use crate::history::HistoryClient;
use crate::message::Message;
use crate::render::Renderer;
use crate::replay::{ReplayGate, ReplayGuard};
use crate::transport::{self, Connection, Endpoint, Identity};

/// Everything needed to build a [`Session`].
pub struct SessionConfig {
    pub endpoint: Endpoint,
    pub identity: Identity,
    pub renderer: Arc<Renderer>,
    pub gate: Arc<ReplayGate>,
}

struct SessionState {
    room: String,
    active: Option<Arc<Connection>>,
    generation: u64,
}

/// Process-wide chat session.
pub struct Session {
    endpoint: Endpoint,
    identity: Identity,
    history: HistoryClient,
    renderer: Arc<Renderer>,
    gate: Arc<ReplayGate>,
    state: Mutex<SessionState>,
    generation_tx: watch::Sender<u64>,
}

impl Session {
    pub fn new(config: SessionConfig) -> anyhow::Result<Self> {
        let history = HistoryClient::new(config.endpoint.clone(), config.identity.clone())?;
        let (generation_tx, _) = watch::channel(0);
        Ok(Self {
            endpoint: config.endpoint,
            identity: config.identity,
            history,
            renderer: config.renderer,
            gate: config.gate,
            state: Mutex::new(SessionState { room: String::new(), active: None, generation: 0 }),
            generation_tx,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub async fn room(&self) -> String {
        self.state.lock().await.room.clone()
    }

    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }

    /// Watch generation changes (one tick per join attempt).
    pub fn subscribe_generation(&self) -> watch::Receiver<u64> {
        self.generation_tx.subscribe()
    }

    /// Snapshot the active connection. The lock is released on return.
    pub async fn active(&self) -> Option<Arc<Connection>> {
        let state = self.state.lock().await;
        state.active.as_ref().filter(|c| !c.is_closed()).map(Arc::clone)
    }

    /// Switch to `room`: close the current connection, dial the new one,
    /// then replay its history.
    ///
    /// A dial failure leaves the session with no active connection and is
    /// fatal for the caller. History failures are logged and ignored.
    pub async fn join_room(&self, room: &str) -> Result<(), ConnectError> {
        let replay = {
            let mut state = self.state.lock().await;
            // Only mark the old connection closed here; the handshake runs off-lock.
            if let Some(old) = state.active.take() {
                if old.abort() {
                    debug!(room = %old.room(), generation = old.generation(), "closing superseded connection");
                    tokio::spawn(async move { old.close_handshake().await });
                }
            }
            state.generation += 1;
            let generation = state.generation;
            state.room = room.to_owned();
            let replay = self.gate.begin(generation);

            let dialed = match self.endpoint.ws_url(room) {
                Ok(url) => transport::dial(&url, &self.identity).await,
                Err(reason) => Err(ConnectError::InvalidUrl(reason)),
            };
            let stream = match dialed {
                Ok(stream) => stream,
                Err(e) => {
                    self.generation_tx.send_replace(generation);
                    return Err(e);
                }
            };

            state.active = Some(Arc::new(Connection::new(generation, room, stream)));
            self.generation_tx.send_replace(generation);
            info!(room = %room, generation, nickname = %self.identity.nickname, "joined room");
            self.renderer
                .notice(&format!("✅ Joined room '{room}' as {}", self.identity.nickname));
            replay
        };

        self.replay_history(room, replay).await;
        Ok(())
    }

    async fn replay_history(&self, room: &str, mut replay: ReplayGuard<'_>) {
        match self.history.fetch(room).await {
            Ok(messages) => {
                self.renderer.notice("📜 Room:");
                for msg in &messages {
                    replay.record(msg.id);
                    self.renderer.render_history(msg);
                }
                debug!(room = %room, generation = replay.generation(), count = messages.len(), "history replayed");
            }
            Err(e) => warn!(room = %room, err = %e, "history unavailable"),
        }
    }

    /// Send `content` as a chat message in the current room.
    pub async fn send_chat(&self, content: &str) -> Result<(), SendError> {
        let (conn, room) = {
            let state = self.state.lock().await;
            (state.active.clone(), state.room.clone())
        };
        let conn = conn.ok_or(SendError::NotConnected)?;
        let msg =
            Message::chat(room, &self.identity.nickname, content, Local::now().fixed_offset());
        conn.send_message(&msg).await
    }

    /// Close the active connection, if any.
    pub async fn leave(&self) {
        let conn = self.state.lock().await.active.take();
        if let Some(conn) = conn {
            conn.close().await;
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
