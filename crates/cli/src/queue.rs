// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded FIFO between the reader and the display dispatcher.
//!
//! The bound is the backpressure contract: a full queue suspends the
//! producer until the dispatcher drains an entry. Nothing is ever dropped.

use tokio::sync::mpsc;

use crate::message::Message;

/// Default number of undisplayed messages before the reader blocks.
pub const DEFAULT_CAPACITY: usize = 10;

/// A decoded message tagged with the generation of the connection it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub generation: u64,
    pub message: Message,
}

/// The consumer has gone away; the producer should stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

/// Producer half of the display queue.
#[derive(Clone)]
pub struct DisplayTx {
    tx: mpsc::Sender<Delivery>,
}

/// Consumer half of the display queue.
pub struct DisplayRx {
    rx: mpsc::Receiver<Delivery>,
}

/// Create a display queue holding at most `capacity` entries (minimum 1).
pub fn display_queue(capacity: usize) -> (DisplayTx, DisplayRx) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (DisplayTx { tx }, DisplayRx { rx })
}

impl DisplayTx {
    /// Enqueue, waiting for a free slot if the queue is full.
    pub async fn push(&self, delivery: Delivery) -> Result<(), QueueClosed> {
        self.tx.send(delivery).await.map_err(|_| QueueClosed)
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

impl DisplayRx {
    /// Next entry in arrival order, or `None` once every producer is gone.
    pub async fn next(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
