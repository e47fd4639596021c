// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket transport: endpoint addressing, authenticated dial, and the
//! per-generation [`Connection`] handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use base64::Engine;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::error::{ConnectError, SendError};
use crate::message::Message;

pub use tokio_tungstenite::tungstenite::Message as Frame;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type WsSink = SplitSink<WsStream, Frame>;
pub type WsSource = SplitStream<WsStream>;

/// Upper bound on the close handshake so a dead peer cannot stall a room switch.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Nickname and password sent with every connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub nickname: String,
    pub password: String,
}

impl Identity {
    pub fn new(nickname: impl Into<String>, password: impl Into<String>) -> Self {
        Self { nickname: nickname.into(), password: password.into() }
    }

    /// `Authorization` header value: `Basic base64(nickname:password)`.
    pub fn basic_auth(&self) -> String {
        let raw = format!("{}:{}", self.nickname, self.password);
        format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(raw))
    }
}

/// Chat server address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    /// `ws://{host}:{port}/ws/{room}`
    pub fn ws_url(&self, room: &str) -> Result<Url, String> {
        self.url("ws", &["ws", room])
    }

    /// `http://{host}:{port}/history/{room}`
    pub fn history_url(&self, room: &str) -> Result<Url, String> {
        self.url("http", &["history", room])
    }

    fn url(&self, scheme: &str, segments: &[&str]) -> Result<Url, String> {
        let mut url = Url::parse(&format!("{scheme}://{}:{}/", self.host, self.port))
            .map_err(|e| format!("{}:{}: {e}", self.host, self.port))?;
        url.path_segments_mut()
            .map_err(|()| format!("{}:{} cannot carry a path", self.host, self.port))?
            .clear()
            .extend(segments);
        Ok(url)
    }
}

/// Open an authenticated WebSocket to `url`.
pub async fn dial(url: &Url, identity: &Identity) -> Result<WsStream, ConnectError> {
    let mut request = url.as_str().into_client_request().map_err(ConnectError::Handshake)?;
    let auth =
        HeaderValue::from_str(&identity.basic_auth()).map_err(|_| ConnectError::InvalidCredentials)?;
    request.headers_mut().insert(AUTHORIZATION, auth);
    let (stream, _response) =
        tokio_tungstenite::connect_async(request).await.map_err(ConnectError::Handshake)?;
    Ok(stream)
}

/// One room connection, valid for a single generation.
///
/// Writes are serialized by the writer mutex. The read half is handed out
/// once, to the reader task. [`close`](Self::close) is idempotent and wakes
/// a reader blocked on this connection via the cancellation token.
pub struct Connection {
    generation: u64,
    room: String,
    writer: tokio::sync::Mutex<WsSink>,
    reader: parking_lot::Mutex<Option<WsSource>>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl Connection {
    pub fn new(generation: u64, room: impl Into<String>, stream: WsStream) -> Self {
        let (writer, reader) = stream.split();
        Self {
            generation,
            room: room.into(),
            writer: tokio::sync::Mutex::new(writer),
            reader: parking_lot::Mutex::new(Some(reader)),
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Take the read half. Returns `None` after the first call or once closed.
    pub fn take_reader(&self) -> Option<WsSource> {
        if self.is_closed() {
            return None;
        }
        self.reader.lock().take()
    }

    /// Resolves once the connection has been closed.
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }

    /// Send one frame.
    pub async fn send(&self, frame: Frame) -> Result<(), tungstenite::Error> {
        if self.is_closed() {
            return Err(tungstenite::Error::AlreadyClosed);
        }
        self.writer.lock().await.send(frame).await
    }

    /// Send a chat message as one text frame.
    pub async fn send_message(&self, msg: &Message) -> Result<(), SendError> {
        let text = msg.encode().map_err(SendError::Encode)?;
        self.send(Frame::Text(text.into())).await?;
        Ok(())
    }

    /// Mark the connection closed and wake its reader without touching the
    /// socket. Returns `true` only for the call that closed it.
    pub fn abort(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.cancel.cancel();
        true
    }

    /// Close the connection. Returns `true` only for the call that closed it.
    pub async fn close(&self) -> bool {
        if !self.abort() {
            return false;
        }
        self.close_handshake().await;
        true
    }

    /// Send the close frame (bounded by [`CLOSE_TIMEOUT`]) and release an
    /// unclaimed read half. Call after [`abort`](Self::abort).
    pub async fn close_handshake(&self) {
        let handshake = async { self.writer.lock().await.close().await };
        match tokio::time::timeout(CLOSE_TIMEOUT, handshake).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(room = %self.room, generation = self.generation, err = %e, "close handshake failed")
            }
            Err(_) => {
                tracing::debug!(room = %self.room, generation = self.generation, "close handshake timed out")
            }
        }
        self.reader.lock().take();
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
