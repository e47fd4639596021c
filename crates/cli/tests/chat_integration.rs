// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end client tests against an in-process chat server.


use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use chat_support::{chat_json, ChatServer, WAIT};
use parkchat::client::Client;
use parkchat::test_support::{capture_renderer, wait_until, Capture};
use parkchat::transport::Identity;

async fn start_client(
    server: &ChatServer,
    room: &str,
    nickname: &str,
) -> anyhow::Result<(Client, Capture)> {
    parkchat::ensure_crypto_provider();
    let settings = server.settings(room)?;
    let (renderer, capture) = capture_renderer(nickname);
    let client = Client::start(&settings, Identity::new(nickname, "pw"), renderer, None).await?;
    Ok((client, capture))
}

fn assert_order(capture: &Capture, needles: &[&str]) {
    let positions: Vec<_> = needles.iter().map(|n| capture.position(n)).collect();
    assert!(positions.iter().all(Option::is_some), "missing line in {:?}", capture.lines());
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "out of order: {:?}", capture.lines());
}

#[tokio::test]
async fn general_history_then_echo_and_reply() -> anyhow::Result<()> {
    let server = ChatServer::start().await?;
    server.set_history(
        "general",
        vec![chat_json(1, "general", "bob", "first"), chat_json(2, "general", "bob", "second")],
    );
    let (client, capture) = start_client(&server, "general", "alice").await?;

    let (tx, mut rx) = mpsc::channel(8);
    let driver = async {
        capture.wait_for("second", WAIT).await?;
        tx.send("hi".to_owned()).await?;
        capture.wait_for(": hi", WAIT).await?;
        server.push("general", chat_json(50, "general", "bob", "hello alice"));
        capture.wait_for("hello alice", WAIT).await?;
        tx.send("/exit".to_owned()).await?;
        anyhow::Ok(())
    };
    let (input, driven) = tokio::join!(client.run_input(&mut rx), driver);
    driven?;
    input?;

    assert_order(&capture, &["Joined room 'general' as alice", "📜 Room:", "first", "second", "alice: hi", "hello alice", "👋 Logged out."]);
    for line in ["first", "second", "alice: hi", "hello alice"] {
        assert_eq!(capture.count(line), 1, "{line} in {:?}", capture.lines());
    }

    let sent = server.received();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["content"], "hi");
    assert_eq!(sent[0]["nickname"], "alice");
    assert_eq!(sent[0]["chat_room"], "general");
    assert_eq!(sent[0]["type"], "chat");
    assert_eq!(sent[0]["id"], 0);

    assert_eq!(server.auth_headers(), vec![Identity::new("alice", "pw").basic_auth()]);
    wait_until(WAIT, || server.closed() == 1).await.map_err(|_| anyhow::anyhow!("not closed"))?;
    client.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn slow_history_still_renders_before_live_messages() -> anyhow::Result<()> {
    let server = ChatServer::start().await?;
    server.set_history_delay(Duration::from_millis(300));
    server.set_history("general", vec![chat_json(1, "general", "bob", "backlog")]);
    server.set_greeting("general", vec![chat_json(10, "general", "bob", "live now").to_string()]);

    let (client, capture) = start_client(&server, "general", "alice").await?;
    capture.wait_for("live now", WAIT).await?;
    assert_order(&capture, &["📜 Room:", "backlog", "live now"]);
    client.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn message_in_history_and_live_renders_once() -> anyhow::Result<()> {
    let server = ChatServer::start().await?;
    server.set_history("general", vec![chat_json(5, "general", "bob", "overlap")]);
    server.set_greeting(
        "general",
        vec![
            chat_json(5, "general", "bob", "overlap").to_string(),
            chat_json(6, "general", "bob", "after overlap").to_string(),
        ],
    );

    let (client, capture) = start_client(&server, "general", "alice").await?;
    capture.wait_for("after overlap", WAIT).await?;
    assert_eq!(capture.count(": overlap"), 1, "{:?}", capture.lines());
    client.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn undecodable_frame_does_not_stop_the_reader() -> anyhow::Result<()> {
    let server = ChatServer::start().await?;
    server.set_greeting(
        "general",
        vec!["this is not json".to_owned(), chat_json(7, "general", "bob", "still here").to_string()],
    );

    let (client, capture) = start_client(&server, "general", "alice").await?;
    capture.wait_for("still here", WAIT).await?;
    assert_eq!(capture.count("not json"), 0);
    client.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn room_switch_closes_old_connection_and_reads_new_one() -> anyhow::Result<()> {
    let server = ChatServer::start().await?;
    server.set_history("other", vec![chat_json(1, "other", "carol", "other backlog")]);
    let (client, capture) = start_client(&server, "general", "alice").await?;
    server.wait_connections(1).await?;

    client.session().join_room("other").await?;
    server.wait_connections(2).await?;
    assert_eq!(client.session().room().await, "other");
    assert_eq!(client.session().generation().await, 2);

    // Nothing from the left room reaches the screen.
    server.push("general", chat_json(40, "general", "bob", "ghost"));
    server.push("other", chat_json(41, "other", "carol", "welcome"));
    capture.wait_for("welcome", WAIT).await?;
    assert_eq!(capture.count("ghost"), 0);
    assert_order(&capture, &["Joined room 'other' as alice", "other backlog", "welcome"]);

    client.session().join_room("third").await?;
    server.wait_connections(3).await?;
    assert_eq!(server.closed(), 2);

    client.shutdown().await;
    wait_until(WAIT, || server.closed() == 3).await.map_err(|_| anyhow::anyhow!("not closed"))?;
    Ok(())
}

#[tokio::test]
async fn room_command_switches_and_stops_general_traffic() -> anyhow::Result<()> {
    let server = ChatServer::start().await?;
    let (client, capture) = start_client(&server, "general", "alice").await?;

    let (tx, mut rx) = mpsc::channel(8);
    let driver = async {
        tx.send("/room other".to_owned()).await?;
        capture.wait_for("Joined room 'other' as alice", WAIT).await?;
        server.push("general", chat_json(60, "general", "bob", "general chatter"));
        tx.send("in other".to_owned()).await?;
        capture.wait_for("alice: in other", WAIT).await?;
        tx.send("/exit".to_owned()).await?;
        anyhow::Ok(())
    };
    let (input, driven) = tokio::join!(client.run_input(&mut rx), driver);
    driven?;
    input?;

    assert_eq!(capture.count("general chatter"), 0);
    let sent = server.received();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["chat_room"], "other");
    client.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn concurrent_switches_leave_one_live_connection() -> anyhow::Result<()> {
    let server = ChatServer::start().await?;
    let (client, _capture) = start_client(&server, "general", "alice").await?;

    let a = Arc::clone(client.session());
    let b = Arc::clone(client.session());
    let (ra, rb) = tokio::join!(
        tokio::spawn(async move { a.join_room("left").await }),
        tokio::spawn(async move { b.join_room("right").await }),
    );
    ra??;
    rb??;

    server.wait_connections(3).await?;
    assert_eq!(client.session().generation().await, 3);
    assert!(client.session().active().await.is_some());
    client.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn keepalive_pings_the_active_connection() -> anyhow::Result<()> {
    parkchat::ensure_crypto_provider();
    let server = ChatServer::start().await?;
    let mut settings = server.settings("general")?;
    settings.keepalive = Duration::from_millis(100);
    let (renderer, _capture) = capture_renderer("alice");
    let client = Client::start(&settings, Identity::new("alice", "pw"), renderer, None).await?;

    wait_until(WAIT, || server.pings() >= 2)
        .await
        .map_err(|_| anyhow::anyhow!("expected pings, got {}", server.pings()))?;
    client.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn server_ping_is_answered() -> anyhow::Result<()> {
    let server = ChatServer::start().await?;
    let (client, _capture) = start_client(&server, "general", "alice").await?;
    server.wait_connections(1).await?;

    server.ping("general", b"are you there");
    wait_until(WAIT, || server.pongs() >= 1)
        .await
        .map_err(|_| anyhow::anyhow!("no pong received"))?;
    client.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn history_failure_is_not_fatal() -> anyhow::Result<()> {
    let server = ChatServer::start().await?;
    server.fail_history("general");
    server.set_greeting("general", vec![chat_json(3, "general", "bob", "live anyway").to_string()]);

    let (client, capture) = start_client(&server, "general", "alice").await?;
    capture.wait_for("live anyway", WAIT).await?;
    assert_eq!(capture.count("📜 Room:"), 0);
    client.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn failed_first_join_is_an_error() -> anyhow::Result<()> {
    parkchat::ensure_crypto_provider();
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.local_addr()?.port()
    };
    let mut config = parkchat::config::Config::test();
    config.port = Some(port);
    let settings = parkchat::config::Settings::merge(&config, None)?;
    let (renderer, _capture) = capture_renderer("alice");

    let result = Client::start(&settings, Identity::new("alice", "pw"), renderer, None).await;
    assert!(result.is_err());
    Ok(())
}
