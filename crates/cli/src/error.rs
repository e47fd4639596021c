// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the connection pipeline.
//!
//! Three classes of failure exist:
//! - fatal: [`ConnectError`], the client cannot run without a room;
//! - recoverable: [`HistoryError`], [`SendError`], decode and ping failures,
//!   logged where they happen;
//! - expected: a connection closed by a room switch or a normal close,
//!   reported by the reader as [`ReadOutcome::Expected`].

use std::fmt;

use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;

/// Failure to open a room connection. Always fatal for the process.
#[derive(Debug)]
pub enum ConnectError {
    /// Host, port or room do not form a valid endpoint URL.
    InvalidUrl(String),
    /// Credentials cannot be carried in an HTTP header.
    InvalidCredentials,
    /// The WebSocket dial or upgrade failed.
    Handshake(tungstenite::Error),
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl(reason) => write!(f, "invalid server address: {reason}"),
            Self::InvalidCredentials => f.write_str("credentials contain invalid header characters"),
            Self::Handshake(e) => write!(f, "error while connecting to the server: {e}"),
        }
    }
}

impl std::error::Error for ConnectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Handshake(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure to fetch a room backlog. The room stays joined.
#[derive(Debug)]
pub enum HistoryError {
    InvalidUrl(String),
    Request(reqwest::Error),
    Status(reqwest::StatusCode),
    Decode(reqwest::Error),
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl(reason) => write!(f, "invalid history url: {reason}"),
            Self::Request(e) => write!(f, "history request failed: {e}"),
            Self::Status(status) => write!(f, "history request returned {status}"),
            Self::Decode(e) => write!(f, "history body is not a message list: {e}"),
        }
    }
}

impl std::error::Error for HistoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(e) | Self::Decode(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure to deliver an outbound frame.
#[derive(Debug)]
pub enum SendError {
    NotConnected,
    Encode(serde_json::Error),
    Transport(tungstenite::Error),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => f.write_str("not connected to a room"),
            Self::Encode(e) => write!(f, "message encoding failed: {e}"),
            Self::Transport(e) => write!(f, "error sending message: {e}"),
        }
    }
}

impl std::error::Error for SendError {}

impl From<tungstenite::Error> for SendError {
    fn from(e: tungstenite::Error) -> Self {
        Self::Transport(e)
    }
}

/// How a reader finished with one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Closed on purpose: room switch, shutdown, or a normal close from the peer.
    Expected,
    /// Anything else; logged by the reader.
    Unexpected(String),
    /// The display queue consumer is gone.
    QueueClosed,
}

/// Classify an error returned by a WebSocket read.
pub fn classify_read_error(err: &tungstenite::Error) -> ReadOutcome {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            ReadOutcome::Expected
        }
        other => ReadOutcome::Unexpected(other.to_string()),
    }
}

/// Classify a close frame sent by the peer.
pub fn classify_close(frame: Option<&CloseFrame>) -> ReadOutcome {
    match frame {
        None => ReadOutcome::Expected,
        Some(f) if matches!(f.code, CloseCode::Normal | CloseCode::Away) => ReadOutcome::Expected,
        Some(f) => ReadOutcome::Unexpected(format!("closed by server ({}): {}", f.code, f.reason)),
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
