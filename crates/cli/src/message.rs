// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat message wire schema shared by the WebSocket stream and `/history`.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Kind of a chat message. Unrecognized kinds decode as [`MessageKind::Chat`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Chat,
    System,
}

impl<'de> Deserialize<'de> for MessageKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "system" => Self::System,
            _ => Self::Chat,
        })
    }
}

/// Id carried by messages the server has not numbered yet.
pub const UNASSIGNED_ID: i64 = 0;

/// One chat message.
///
/// `id` is assigned by the server; outbound messages carry `0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub chat_room: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<FixedOffset>,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
}

impl Message {
    /// Build an outbound chat message (no server id yet).
    pub fn chat(
        room: impl Into<String>,
        nickname: impl Into<String>,
        content: impl Into<String>,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            id: UNASSIGNED_ID,
            chat_room: room.into(),
            nickname: nickname.into(),
            content: content.into(),
            timestamp,
            kind: MessageKind::Chat,
        }
    }

    /// Decode one text frame.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Encode as one text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
