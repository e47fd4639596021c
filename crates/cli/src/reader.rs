// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background reader: one task that follows the active connection across
//! generations and feeds decoded messages into the display queue.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{classify_close, classify_read_error, ReadOutcome};
use crate::message::Message;
use crate::queue::{Delivery, DisplayTx};
use crate::session::Session;
use crate::transport::{Connection, Frame, WsSource};

/// Spawn the reader task. It runs until `shutdown` or until the display
/// queue consumer goes away.
pub fn spawn_reader(
    session: Arc<Session>,
    queue: DisplayTx,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move { run(session, queue, shutdown).await })
}

async fn run(session: Arc<Session>, queue: DisplayTx, shutdown: CancellationToken) {
    let mut generations = session.subscribe_generation();

    loop {
        if shutdown.is_cancelled() {
            break;
        }

        // Lock held only for the snapshot inside `active()`.
        let claimed = session.active().await.and_then(|conn| {
            let stream = conn.take_reader()?;
            Some((conn, stream))
        });

        let Some((conn, mut stream)) = claimed else {
            // Nothing readable until the next join.
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = generations.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            continue;
        };
        generations.borrow_and_update();

        let outcome = read_connection(&conn, &mut stream, &queue, &shutdown).await;
        drop(stream);
        match &outcome {
            ReadOutcome::Expected => {
                debug!(room = %conn.room(), generation = conn.generation(), "connection closed");
            }
            ReadOutcome::Unexpected(reason) => {
                warn!(room = %conn.room(), generation = conn.generation(), err = %reason, "error reading from server");
            }
            ReadOutcome::QueueClosed => {}
        }
        conn.close().await;
        if outcome == ReadOutcome::QueueClosed {
            break;
        }
    }
}

/// Read frames from one connection until it closes or fails.
async fn read_connection(
    conn: &Connection,
    stream: &mut WsSource,
    queue: &DisplayTx,
    shutdown: &CancellationToken,
) -> ReadOutcome {
    loop {
        let frame = tokio::select! {
            biased;
            _ = conn.closed() => return ReadOutcome::Expected,
            _ = shutdown.cancelled() => return ReadOutcome::Expected,
            frame = stream.next() => frame,
        };

        match frame {
            Some(Ok(Frame::Text(text))) => match Message::decode(&text) {
                Ok(message) => {
                    let delivery = Delivery { generation: conn.generation(), message };
                    // May wait here while the queue is full.
                    tokio::select! {
                        biased;
                        _ = conn.closed() => return ReadOutcome::Expected,
                        pushed = queue.push(delivery) => {
                            if pushed.is_err() {
                                return ReadOutcome::QueueClosed;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(room = %conn.room(), err = %e, "dropping undecodable frame");
                }
            },
            Some(Ok(Frame::Ping(payload))) => {
                if let Err(e) = conn.send(Frame::Pong(payload)).await {
                    debug!(room = %conn.room(), err = %e, "pong failed");
                }
            }
            Some(Ok(Frame::Close(frame))) => return classify_close(frame.as_ref()),
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                // A close racing the read surfaces as an error; the token says why.
                if conn.is_closed() {
                    return ReadOutcome::Expected;
                }
                return classify_read_error(&e);
            }
            None => return ReadOutcome::Expected,
        }
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
