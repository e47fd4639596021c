// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: output capture, builders, and wait helpers.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;

use crate::message::{Message, MessageKind};
use crate::render::{Renderer, Style, Theme};

/// Terminal stand-in that records everything written to it.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Capture {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    /// Rendered lines with control sequences stripped, prompt fragments removed.
    pub fn lines(&self) -> Vec<String> {
        self.text()
            .split('\n')
            .map(|line| {
                let line = line.rsplit("\x1b[K").next().unwrap_or(line);
                line.trim_start_matches("> ").to_owned()
            })
            .filter(|line| !line.is_empty() && line != ">")
            .collect()
    }

    /// Index of the first rendered line containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.lines().iter().position(|line| line.contains(needle))
    }

    /// Number of rendered lines containing `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.lines().iter().filter(|line| line.contains(needle)).count()
    }

    /// Poll until a rendered line contains `needle`.
    pub async fn wait_for(&self, needle: &str, timeout: Duration) -> anyhow::Result<()> {
        let this = self.clone();
        let needle_owned = needle.to_owned();
        wait_until(timeout, move || this.position(&needle_owned).is_some())
            .await
            .map_err(|_| anyhow::anyhow!("timed out waiting for {needle:?}; output: {:?}", self.lines()))
    }
}

/// Style without colors, so rendered lines can be matched literally.
pub fn plain_style(own_nickname: &str) -> Style {
    Style { own_nickname: own_nickname.to_owned(), theme: Theme::plain(), ..Style::default() }
}

/// Renderer writing into a fresh [`Capture`].
pub fn capture_renderer(own_nickname: &str) -> (Arc<Renderer>, Capture) {
    let capture = Capture::default();
    let renderer = Arc::new(Renderer::new(Box::new(capture.clone()), plain_style(own_nickname)));
    (renderer, capture)
}

/// Build a message with a fixed timestamp `minute` minutes past 10:00 UTC.
pub fn message(id: i64, room: &str, nickname: &str, content: &str, minute: u32) -> Message {
    let ts = DateTime::<FixedOffset>::parse_from_rfc3339(&format!("2024-05-01T10:{minute:02}:00Z"))
        .unwrap_or_default();
    Message {
        id,
        chat_room: room.to_owned(),
        nickname: nickname.to_owned(),
        content: content.to_owned(),
        timestamp: ts,
        kind: MessageKind::Chat,
    }
}

/// Bare WebSocket server: every upgraded connection is handed to the test
/// untouched. Plain HTTP requests are dropped.
pub struct PeerServer {
    pub addr: SocketAddr,
    pub accepted: mpsc::UnboundedReceiver<WebSocketStream<TcpStream>>,
}

impl PeerServer {
    pub async fn start() -> anyhow::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, accepted) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Ok(ws) = tokio_tungstenite::accept_async(tcp).await {
                        let _ = tx.send(ws);
                    }
                });
            }
        });
        Ok(Self { addr, accepted })
    }

    /// Next upgraded connection.
    pub async fn next_peer(&mut self) -> anyhow::Result<WebSocketStream<TcpStream>> {
        tokio::time::timeout(Duration::from_secs(5), self.accepted.recv())
            .await
            .map_err(|_| anyhow::anyhow!("no connection accepted"))?
            .ok_or_else(|| anyhow::anyhow!("peer server stopped"))
    }
}

/// Poll `check` every 10ms until it returns true or `timeout` elapses.
pub async fn wait_until(
    timeout: Duration,
    mut check: impl FnMut() -> bool,
) -> Result<(), Duration> {
    let start = Instant::now();
    loop {
        if check() {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(start.elapsed());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Extension trait to convert any `Display` error into `anyhow::Error`.
/// Replaces `.map_err(|e| anyhow::anyhow!("{e}"))` with `.anyhow()`.
pub trait AnyhowExt<T> {
    fn anyhow(self) -> anyhow::Result<T>;
}

impl<T, E: std::fmt::Display> AnyhowExt<T> for Result<T, E> {
    fn anyhow(self) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::anyhow!("{e}"))
    }
}

/// Assert that `$expr` is an `Err` whose message contains `$substr`.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
