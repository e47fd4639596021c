// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Foreground input loop: commands and outgoing chat lines.

use std::io::BufRead;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::ConnectError;
use crate::render::Renderer;
use crate::session::Session;
use crate::update::{confirm_and_install, UpdateChecker, UpdateOutcome};

/// One parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    Room(String),
    Update,
    Say(String),
    Empty,
}

/// Parse a line typed at the prompt. Surrounding whitespace is ignored.
pub fn parse_command(line: &str) -> Command {
    let text = line.trim();
    if text.is_empty() {
        return Command::Empty;
    }
    if text == "/exit" {
        return Command::Exit;
    }
    if text == "/update" {
        return Command::Update;
    }
    if let Some(rest) = text.strip_prefix("/room ") {
        let room = rest.trim();
        if room.is_empty() {
            return Command::Empty;
        }
        return Command::Room(room.to_owned());
    }
    if text == "/room" {
        return Command::Empty;
    }
    Command::Say(text.to_owned())
}

/// Read stdin on a dedicated thread and forward lines over a channel.
/// The channel closes at end of input.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel::<String>(64);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(err = %e, "stdin read failed");
                    break;
                }
            }
        }
    });
    rx
}

/// Answers collected by [`prompt_identity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub nickname: String,
    pub password: String,
    pub room: String,
}

/// Ask for nickname, password and starting room. Empty room answers keep
/// `default_room`. Returns `None` if input ends first.
pub async fn prompt_identity(
    renderer: &Renderer,
    lines: &mut mpsc::Receiver<String>,
    default_room: &str,
) -> Option<Login> {
    renderer.ask("👤 Nickname: ");
    let nickname = lines.recv().await?.trim().to_owned();
    renderer.ask("🔒 Password: ");
    let password = lines.recv().await?.trim().to_owned();
    renderer.ask("💬 Choose the starting room: ");
    let room = lines.recv().await?.trim().to_owned();
    let room = if room.is_empty() { default_room.to_owned() } else { room };
    Some(Login { nickname, password, room })
}

/// Run until `/exit`, end of input, or an installed update. A failed room
/// switch is returned to the caller as fatal.
pub async fn run_input(
    session: &Session,
    lines: &mut mpsc::Receiver<String>,
    renderer: &Renderer,
    updates: Option<&UpdateChecker>,
) -> Result<(), ConnectError> {
    while let Some(line) = lines.recv().await {
        match parse_command(&line) {
            Command::Empty => {}
            Command::Exit => {
                renderer.notice("👋 Logged out.");
                session.leave().await;
                return Ok(());
            }
            Command::Room(room) => {
                renderer.erase_echo();
                session.join_room(&room).await?;
                renderer.prompt();
            }
            Command::Update => {
                renderer.erase_echo();
                if check_for_update(renderer, lines, updates).await == UpdateOutcome::Installed {
                    session.leave().await;
                    return Ok(());
                }
                renderer.prompt();
            }
            Command::Say(text) => {
                renderer.erase_echo();
                if let Err(e) = session.send_chat(&text).await {
                    warn!(err = %e, "error sending message");
                    renderer.prompt();
                }
            }
        }
    }

    debug!("input closed");
    session.leave().await;
    Ok(())
}

async fn check_for_update(
    renderer: &Renderer,
    lines: &mut mpsc::Receiver<String>,
    updates: Option<&UpdateChecker>,
) -> UpdateOutcome {
    let Some(checker) = updates else {
        renderer.notice("Update checks are unavailable.");
        return UpdateOutcome::Unchanged;
    };
    confirm_and_install(checker, renderer, lines).await
}

#[cfg(test)]
#[path = "input_tests.rs"]
mod tests;
