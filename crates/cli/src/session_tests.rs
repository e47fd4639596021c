// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;
use crate::render::{Style, Theme};
use crate::test_support::PeerServer;
use crate::transport::{Frame, CLOSE_TIMEOUT};

fn offline_session(host: &str, port: u16) -> anyhow::Result<Session> {
    crate::ensure_crypto_provider();
    let style = Style { theme: Theme::plain(), ..Style::default() };
    Session::new(SessionConfig {
        endpoint: Endpoint::new(host, port),
        identity: Identity::new("me", "pw"),
        renderer: Arc::new(Renderer::new(Box::new(std::io::sink()), style)),
        gate: Arc::new(ReplayGate::new()),
    })
}

/// A port nothing listens on: bind, read the port, release it.
fn closed_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

#[tokio::test]
async fn send_without_connection_is_not_connected() -> anyhow::Result<()> {
    let session = offline_session("127.0.0.1", 1)?;
    let err = session.send_chat("hello").await;
    assert!(matches!(err, Err(SendError::NotConnected)), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn failed_dial_is_reported_and_leaves_no_connection() -> anyhow::Result<()> {
    let session = offline_session("127.0.0.1", closed_port()?)?;
    let mut generations = session.subscribe_generation();

    let err = session.join_room("general").await;
    assert!(matches!(err, Err(ConnectError::Handshake(_))), "{err:?}");
    assert!(session.active().await.is_none());
    assert_eq!(session.generation().await, 1);
    assert_eq!(session.room().await, "general");
    assert!(generations.has_changed()?);
    assert_eq!(*generations.borrow_and_update(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_dial_releases_replay_gate() -> anyhow::Result<()> {
    crate::ensure_crypto_provider();
    let gate = Arc::new(ReplayGate::new());
    let session = Session::new(SessionConfig {
        endpoint: Endpoint::new("127.0.0.1", closed_port()?),
        identity: Identity::new("me", "pw"),
        renderer: Arc::new(Renderer::new(Box::new(std::io::sink()), Style::default())),
        gate: Arc::clone(&gate),
    })?;
    let _ = session.join_room("general").await;
    assert!(!gate.is_replaying());
    assert_eq!(gate.generation(), 1);
    Ok(())
}

#[tokio::test]
async fn invalid_host_is_invalid_url() -> anyhow::Result<()> {
    let session = offline_session("bad host", 80)?;
    let err = session.join_room("general").await;
    assert!(matches!(err, Err(ConnectError::InvalidUrl(_))), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn leave_without_connection_is_noop() -> anyhow::Result<()> {
    let session = offline_session("127.0.0.1", 1)?;
    session.leave().await;
    assert!(session.active().await.is_none());
    Ok(())
}

#[tokio::test]
async fn room_switch_does_not_wait_for_a_stuck_close_handshake() -> anyhow::Result<()> {
    let mut server = PeerServer::start().await?;
    let session = offline_session("127.0.0.1", server.addr.port())?;
    session.join_room("a").await?;
    let _quiet_peer = server.next_peer().await?;
    let old = session.active().await.ok_or_else(|| anyhow::anyhow!("no active connection"))?;

    // The peer never reads, so this write fills the socket and keeps the
    // writer locked.
    let stuck = {
        let old = Arc::clone(&old);
        tokio::spawn(async move { old.send(Frame::Text("x".repeat(32 << 20).into())).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!stuck.is_finished(), "write should be blocked");

    tokio::time::timeout(CLOSE_TIMEOUT / 2, session.join_room("b")).await??;
    assert!(old.is_closed());
    assert_eq!(session.active().await.map(|c| c.generation()), Some(2));
    assert_eq!(session.room().await, "b");
    stuck.abort();
    Ok(())
}
