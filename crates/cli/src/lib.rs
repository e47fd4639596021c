// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Once;

pub mod client;
pub mod config;
pub mod display;
pub mod error;
pub mod history;
pub mod input;
pub mod keepalive;
pub mod message;
pub mod queue;
pub mod reader;
pub mod render;
pub mod replay;
pub mod session;
pub mod test_support;
pub mod transport;
pub mod update;

static CRYPTO_INIT: Once = Once::new();

/// Install the rustls crypto provider (needed for reqwest even on plain HTTP).
pub fn ensure_crypto_provider() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
