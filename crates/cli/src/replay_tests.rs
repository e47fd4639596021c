// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use super::*;

// ===== Unit tests ============================================================

#[tokio::test]
async fn live_before_any_join_renders() {
    let gate = ReplayGate::new();
    assert_eq!(gate.admit(0, 5).await, Admit::Render);
}

#[tokio::test]
async fn replayed_id_is_duplicate_for_same_generation() {
    let gate = ReplayGate::new();
    {
        let mut replay = gate.begin(1);
        replay.record(7);
        replay.record(8);
    }
    assert_eq!(gate.admit(1, 7).await, Admit::Duplicate);
    assert_eq!(gate.admit(1, 9).await, Admit::Render);
}

#[tokio::test]
async fn unassigned_ids_are_never_duplicates() {
    let gate = ReplayGate::new();
    {
        let mut replay = gate.begin(1);
        replay.record(UNASSIGNED_ID);
    }
    assert_eq!(gate.admit(1, UNASSIGNED_ID).await, Admit::Render);
}

#[tokio::test]
async fn older_generation_is_stale() {
    let gate = ReplayGate::new();
    drop(gate.begin(1));
    drop(gate.begin(2));
    assert_eq!(gate.admit(1, 3).await, Admit::Stale);
    assert_eq!(gate.admit(2, 3).await, Admit::Render);
}

#[tokio::test]
async fn new_generation_forgets_old_replay() {
    let gate = ReplayGate::new();
    {
        let mut replay = gate.begin(1);
        replay.record(7);
    }
    drop(gate.begin(2));
    assert_eq!(gate.admit(2, 7).await, Admit::Render);
}

#[tokio::test]
async fn admit_waits_for_replay_to_finish() -> anyhow::Result<()> {
    let gate = Arc::new(ReplayGate::new());
    let replay = gate.begin(1);
    assert!(gate.is_replaying());

    let waiter = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { gate.admit(1, 1).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished(), "live delivery must wait for history");

    drop(replay);
    let admit = tokio::time::timeout(Duration::from_secs(1), waiter).await??;
    assert_eq!(admit, Admit::Render);
    assert!(!gate.is_replaying());
    Ok(())
}

#[tokio::test]
async fn stale_guard_does_not_release_newer_replay() {
    let gate = ReplayGate::new();
    let old = gate.begin(1);
    let new = gate.begin(2);
    drop(old);
    assert!(gate.is_replaying(), "generation 1 guard must not end generation 2 replay");
    assert_eq!(new.generation(), 2);
    drop(new);
    assert!(!gate.is_replaying());
    assert_eq!(gate.generation(), 2);
}
