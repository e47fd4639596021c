// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::queue::DEFAULT_CAPACITY;
use crate::render::{Style, Theme, DEFAULT_TIMESTAMP_FORMAT};
use crate::transport::Endpoint;

pub const DEFAULT_HOST: &str = "chat.astelta.world";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ROOM: &str = "General";
pub const DEFAULT_PROMPT: &str = "> ";
pub const DEFAULT_KEEPALIVE_SECS: u64 = 30;
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Terminal client for ParkChat rooms.
#[derive(Debug, Parser)]
#[command(name = "parkchat", version, about)]
pub struct Config {
    /// Chat server host.
    #[arg(long, env = "PARKCHAT_HOST")]
    pub host: Option<String>,

    /// Chat server port.
    #[arg(long, env = "PARKCHAT_PORT")]
    pub port: Option<u16>,

    /// Nickname to log in with (prompted when unset).
    #[arg(long, env = "PARKCHAT_NICKNAME")]
    pub nickname: Option<String>,

    /// Password to log in with.
    #[arg(long, env = "PARKCHAT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Room to join on startup.
    #[arg(long, env = "PARKCHAT_ROOM")]
    pub room: Option<String>,

    /// Input prompt.
    #[arg(long, env = "PARKCHAT_PROMPT")]
    pub prompt: Option<String>,

    /// strftime pattern for message timestamps.
    #[arg(long, env = "PARKCHAT_TIMESTAMP_FORMAT")]
    pub timestamp_format: Option<String>,

    /// Text printed before every message line.
    #[arg(long, env = "PARKCHAT_MESSAGE_PREFIX")]
    pub message_prefix: Option<String>,

    /// Display queue capacity.
    #[arg(long, env = "PARKCHAT_QUEUE_CAPACITY", default_value_t = DEFAULT_CAPACITY)]
    pub queue_capacity: usize,

    /// Seconds between keepalive pings.
    #[arg(long, env = "PARKCHAT_KEEPALIVE_SECS", default_value_t = DEFAULT_KEEPALIVE_SECS)]
    pub keepalive_secs: u64,

    /// JSON settings file (defaults to config.json next to the executable).
    #[arg(long, env = "PARKCHAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format (json or text).
    #[arg(long, env = "PARKCHAT_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "PARKCHAT_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.queue_capacity == 0 {
            anyhow::bail!("--queue-capacity must be at least 1");
        }
        if self.keepalive_secs == 0 {
            anyhow::bail!("--keepalive-secs must be at least 1");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        if let Some(port) = self.port {
            if port == 0 {
                anyhow::bail!("--port must be non-zero");
            }
        }
        Ok(())
    }

    /// Settings file to read: `--config`, or `config.json` beside the binary.
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(ref path) = self.config {
            return Some(path.clone());
        }
        let exe = std::env::current_exe().ok()?;
        Some(exe.parent()?.join(CONFIG_FILE_NAME))
    }

    /// Load the settings file (if any) and merge it under the command line.
    pub fn resolve(&self) -> anyhow::Result<Settings> {
        let explicit = self.config.is_some();
        let file = match self.config_path() {
            Some(path) if explicit || path.exists() => Some(load_file_config(&path)?),
            _ => None,
        };
        Settings::merge(self, file.as_ref())
    }

    #[doc(hidden)]
    pub fn test() -> Self {
        Self {
            host: Some("127.0.0.1".to_owned()),
            port: Some(DEFAULT_PORT),
            nickname: Some("tester".to_owned()),
            password: Some("secret".to_owned()),
            room: None,
            prompt: None,
            timestamp_format: None,
            message_prefix: None,
            queue_capacity: DEFAULT_CAPACITY,
            keepalive_secs: DEFAULT_KEEPALIVE_SECS,
            config: None,
            log_format: "text".to_owned(),
            log_level: "warn".to_owned(),
        }
    }
}

/// On-disk settings file. Every key is optional; empty strings mean unset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub nickname: String,
    pub password: String,
    pub start_room: String,
    pub server_ip: String,
    pub message_prefix: String,
    pub timestamp_format: String,
    pub prompt: String,
    /// Kept as a string for compatibility with existing files.
    pub websocket_port: String,
    pub colors: Theme,
}

/// Load and parse a settings file.
pub fn load_file_config(path: &Path) -> anyhow::Result<FileConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
    let config: FileConfig = serde_json::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))?;
    Ok(config)
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: Endpoint,
    pub nickname: Option<String>,
    pub password: Option<String>,
    pub room: String,
    pub style: Style,
    pub queue_capacity: usize,
    pub keepalive: Duration,
    /// True when a settings file was applied.
    pub from_file: bool,
}

impl Settings {
    /// Merge command line over file over defaults.
    pub fn merge(config: &Config, file: Option<&FileConfig>) -> anyhow::Result<Self> {
        let empty = FileConfig::default();
        let f = file.unwrap_or(&empty);

        let port = match config.port {
            Some(port) => port,
            None => match non_empty(&f.websocket_port) {
                Some(raw) => raw
                    .trim()
                    .parse::<u16>()
                    .map_err(|e| anyhow::anyhow!("invalid websocket_port {raw:?}: {e}"))?,
                None => DEFAULT_PORT,
            },
        };
        let host = pick(config.host.as_deref(), &f.server_ip, DEFAULT_HOST);

        let theme = f.colors.clone().or(&Theme::standard());

        let style = Style {
            prompt: pick(config.prompt.as_deref(), &f.prompt, DEFAULT_PROMPT),
            timestamp_format: pick(
                config.timestamp_format.as_deref(),
                &f.timestamp_format,
                DEFAULT_TIMESTAMP_FORMAT,
            ),
            message_prefix: pick(config.message_prefix.as_deref(), &f.message_prefix, ""),
            own_nickname: String::new(),
            theme,
        };

        Ok(Self {
            endpoint: Endpoint::new(host, port),
            nickname: optional(config.nickname.as_deref(), &f.nickname),
            password: optional(config.password.as_deref(), &f.password),
            room: pick(config.room.as_deref(), &f.start_room, DEFAULT_ROOM),
            style,
            queue_capacity: config.queue_capacity.max(1),
            keepalive: Duration::from_secs(config.keepalive_secs.max(1)),
            from_file: file.is_some(),
        })
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn optional(cli: Option<&str>, file: &str) -> Option<String> {
    cli.filter(|s| !s.is_empty()).or_else(|| non_empty(file)).map(str::to_owned)
}

fn pick(cli: Option<&str>, file: &str, default: &str) -> String {
    optional(cli, file).unwrap_or_else(|| default.to_owned())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
