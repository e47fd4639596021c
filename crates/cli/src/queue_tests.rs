// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;

fn delivery(n: i64) -> anyhow::Result<Delivery> {
    let ts = chrono::DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")?;
    let mut message = Message::chat("general", "a", format!("m{n}"), ts);
    message.id = n;
    Ok(Delivery { generation: 1, message })
}

#[tokio::test]
async fn eleventh_push_blocks_until_one_is_drained() -> anyhow::Result<()> {
    let (tx, mut rx) = display_queue(DEFAULT_CAPACITY);

    for n in 1..=10 {
        tokio::time::timeout(Duration::from_millis(100), tx.push(delivery(n)?))
            .await
            .map_err(|_| anyhow::anyhow!("push {n} should not block"))?
            .map_err(|_| anyhow::anyhow!("queue closed"))?;
    }
    assert_eq!(tx.available(), 0);

    let producer = {
        let tx = tx.clone();
        let eleventh = delivery(11)?;
        tokio::spawn(async move { tx.push(eleventh).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!producer.is_finished(), "eleventh push must wait for a free slot");

    let first = rx.next().await.ok_or_else(|| anyhow::anyhow!("queue empty"))?;
    assert_eq!(first.message.id, 1);

    tokio::time::timeout(Duration::from_secs(1), producer)
        .await
        .map_err(|_| anyhow::anyhow!("producer still blocked after drain"))??
        .map_err(|_| anyhow::anyhow!("queue closed"))?;
    Ok(())
}

#[tokio::test]
async fn drains_in_fifo_order_without_loss() -> anyhow::Result<()> {
    let (tx, mut rx) = display_queue(3);
    let producer = tokio::spawn(async move {
        for n in 1..=20 {
            if tx.push(delivery(n)?).await.is_err() {
                anyhow::bail!("queue closed at {n}");
            }
        }
        Ok::<(), anyhow::Error>(())
    });

    let mut seen = Vec::new();
    while let Some(d) = rx.next().await {
        seen.push(d.message.id);
    }
    producer.await??;
    assert_eq!(seen, (1..=20).collect::<Vec<_>>());
    Ok(())
}

#[tokio::test]
async fn push_fails_once_consumer_is_gone() -> anyhow::Result<()> {
    let (tx, rx) = display_queue(2);
    drop(rx);
    assert_eq!(tx.push(delivery(1)?).await, Err(QueueClosed));
    Ok(())
}

#[test]
fn zero_capacity_is_clamped() {
    let (tx, _rx) = display_queue(0);
    assert_eq!(tx.available(), 1);
}
