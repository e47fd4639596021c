// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal rendering: line formatting, color themes, and prompt handling.
//!
//! All writes go through one [`Renderer`] so a rendered line and the prompt
//! redraw that follows it are never split by another writer.

use std::fmt::Write as _;
use std::io::Write;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageKind};

/// Carriage return + erase to end of line.
const CLEAR_LINE: &str = "\r\x1b[K";
/// Cursor up one row, then clear it (removes the line the user just typed).
const ERASE_ECHO: &str = "\x1b[1A\r\x1b[K";
const RESET: &str = "\x1b[0m";

/// Fallback when a configured timestamp pattern cannot be formatted.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%H:%M";

/// Foreground escape for a color name. Unknown names map to nothing.
pub fn fg(name: &str) -> &'static str {
    match name {
        "black" => "\x1b[30m",
        "red" => "\x1b[31m",
        "green" => "\x1b[32m",
        "yellow" => "\x1b[33m",
        "blue" => "\x1b[34m",
        "magenta" => "\x1b[35m",
        "cyan" => "\x1b[36m",
        "white" => "\x1b[37m",
        "brightBlack" => "\x1b[90m",
        "brightRed" => "\x1b[91m",
        "brightGreen" => "\x1b[92m",
        "brightYellow" => "\x1b[93m",
        "brightBlue" => "\x1b[94m",
        "brightMagenta" => "\x1b[95m",
        "brightCyan" => "\x1b[96m",
        "brightWhite" => "\x1b[97m",
        _ => "",
    }
}

/// Background escape for a color name. Unknown names map to nothing.
pub fn bg(name: &str) -> &'static str {
    match name {
        "black" => "\x1b[40m",
        "red" => "\x1b[41m",
        "green" => "\x1b[42m",
        "yellow" => "\x1b[43m",
        "blue" => "\x1b[44m",
        "magenta" => "\x1b[45m",
        "cyan" => "\x1b[46m",
        "white" => "\x1b[47m",
        "brightBlack" => "\x1b[100m",
        "brightRed" => "\x1b[101m",
        "brightGreen" => "\x1b[102m",
        "brightYellow" => "\x1b[103m",
        "brightBlue" => "\x1b[104m",
        "brightMagenta" => "\x1b[105m",
        "brightCyan" => "\x1b[106m",
        "brightWhite" => "\x1b[107m",
        _ => "",
    }
}

/// Colors for one class of message.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub nickname: String,
    pub text: String,
    pub date: String,
    pub background: String,
}

impl Palette {
    pub fn new(nickname: &str, text: &str, date: &str, background: &str) -> Self {
        Self {
            nickname: nickname.to_owned(),
            text: text.to_owned(),
            date: date.to_owned(),
            background: background.to_owned(),
        }
    }

    /// Fill empty fields from `fallback`.
    pub fn or(mut self, fallback: &Palette) -> Self {
        fill(&mut self.nickname, &fallback.nickname);
        fill(&mut self.text, &fallback.text);
        fill(&mut self.date, &fallback.date);
        fill(&mut self.background, &fallback.background);
        self
    }
}

fn fill(value: &mut String, fallback: &str) {
    if value.is_empty() {
        fallback.clone_into(value);
    }
}

/// Palettes for own messages, other users, and system notices.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub user: Palette,
    pub messages: Palette,
    pub system: Palette,
}

impl Theme {
    /// Built-in color scheme.
    pub fn standard() -> Self {
        Self {
            user: Palette::new("blue", "", "green", ""),
            messages: Palette::new("yellow", "", "cyan", ""),
            system: Palette::new("red", "brightCyan", "brightGreen", ""),
        }
    }

    /// No escape sequences at all.
    pub fn plain() -> Self {
        Self::default()
    }

    /// Fill empty fields from `fallback`.
    pub fn or(self, fallback: &Theme) -> Self {
        Self {
            user: self.user.or(&fallback.user),
            messages: self.messages.or(&fallback.messages),
            system: self.system.or(&fallback.system),
        }
    }
}

/// Static rendering settings.
#[derive(Debug, Clone)]
pub struct Style {
    pub prompt: String,
    pub timestamp_format: String,
    pub message_prefix: String,
    /// Messages from this nickname use the `user` palette.
    pub own_nickname: String,
    pub theme: Theme,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            prompt: "> ".to_owned(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_owned(),
            message_prefix: String::new(),
            own_nickname: String::new(),
            theme: Theme::standard(),
        }
    }
}

/// Format one message as a single line (no trailing newline).
pub fn format_line(msg: &Message, style: &Style) -> String {
    let (palette, name) = match msg.kind {
        MessageKind::System => (&style.theme.system, "System"),
        MessageKind::Chat if msg.nickname == style.own_nickname => {
            (&style.theme.user, msg.nickname.as_str())
        }
        MessageKind::Chat => (&style.theme.messages, msg.nickname.as_str()),
    };

    let mut stamp = String::new();
    if write!(stamp, "{}", msg.timestamp.format(&style.timestamp_format)).is_err() {
        stamp.clear();
        let _ = write!(stamp, "{}", msg.timestamp.format(DEFAULT_TIMESTAMP_FORMAT));
    }

    let mut line = String::with_capacity(msg.content.len() + 32);
    line.push_str(&style.message_prefix);
    line.push_str(&paint(&format!("({stamp})"), fg(&palette.date), ""));
    line.push(' ');
    line.push_str(&paint(name, fg(&palette.nickname), bg(&palette.background)));
    line.push_str(": ");
    line.push_str(&paint(&msg.content, fg(&palette.text), ""));
    line
}

fn paint(text: &str, fg: &str, bg: &str) -> String {
    if fg.is_empty() && bg.is_empty() {
        return text.to_owned();
    }
    format!("{fg}{bg}{text}{RESET}")
}

/// Shared terminal writer.
pub struct Renderer {
    out: Mutex<Box<dyn Write + Send>>,
    style: Style,
}

impl Renderer {
    pub fn new(out: Box<dyn Write + Send>, style: Style) -> Self {
        Self { out: Mutex::new(out), style }
    }

    pub fn stdout(style: Style) -> Self {
        Self::new(Box::new(std::io::stdout()), style)
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    /// Render a live message over the input line, then redraw the prompt.
    pub fn render_live(&self, msg: &Message) {
        let line = format_line(msg, &self.style);
        self.emit(&format!("{CLEAR_LINE}{line}\n{}", self.style.prompt));
    }

    /// Render a history message. The prompt is redrawn once replay finishes.
    pub fn render_history(&self, msg: &Message) {
        let line = format_line(msg, &self.style);
        self.emit(&format!("{CLEAR_LINE}{line}\n"));
    }

    /// Print a client-side notice on its own line.
    pub fn notice(&self, text: &str) {
        self.emit(&format!("{CLEAR_LINE}{text}\n"));
    }

    /// Print text without a newline (interactive questions).
    pub fn ask(&self, question: &str) {
        self.emit(question);
    }

    pub fn prompt(&self) {
        self.emit(&self.style.prompt);
    }

    /// Remove the line the user just submitted so the echo from the server
    /// is the only copy on screen.
    pub fn erase_echo(&self) {
        self.emit(ERASE_ECHO);
    }

    fn emit(&self, text: &str) {
        let mut out = self.out.lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            tracing::debug!(err = %e, "terminal write failed");
        }
    }
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
