// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for a room's message backlog.

use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::error::HistoryError;
use crate::message::Message;
use crate::transport::{Endpoint, Identity};

/// Fetches `GET /history/{room}` with HTTP Basic auth.
pub struct HistoryClient {
    endpoint: Endpoint,
    identity: Identity,
    client: Client,
}

impl HistoryClient {
    pub fn new(endpoint: Endpoint, identity: Identity) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { endpoint, identity, client })
    }

    /// Fetch the backlog of `room`, oldest first.
    pub async fn fetch(&self, room: &str) -> Result<Vec<Message>, HistoryError> {
        let url = self.endpoint.history_url(room).map_err(HistoryError::InvalidUrl)?;
        let resp = self
            .client
            .get(url)
            .basic_auth(&self.identity.nickname, Some(&self.identity.password))
            .send()
            .await
            .map_err(HistoryError::Request)?;
        if resp.status() != StatusCode::OK {
            return Err(HistoryError::Status(resp.status()));
        }
        resp.json().await.map_err(HistoryError::Decode)
    }
}
