// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use futures_util::StreamExt;
use serde_json::json;

#[tokio::test]
async fn broadcast_delivers_to_live_subscriber_in_order() {
    let manager = SseManager::new();
    let mut conn = manager.connect("A1", None);

    manager.broadcast("A1", "agent:output", json!({"text": "hi"}));
    manager.broadcast("A1", "agent:output", json!({"text": "there"}));

    let first = conn.rx.recv().await.unwrap();
    let second = conn.rx.recv().await.unwrap();
    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);
}

#[tokio::test]
async fn resume_replays_only_events_after_last_event_id() {
    let manager = SseManager::new();
    manager.broadcast("A1", "agent:output", json!({"n": 1}));
    manager.broadcast("A1", "agent:output", json!({"n": 2}));
    manager.broadcast("A1", "agent:output", json!({"n": 3}));

    let conn = manager.connect("A1", Some(1));
    let ids: Vec<u64> = conn.backlog.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![2, 3]);
}

#[tokio::test]
async fn new_connection_without_last_event_id_gets_no_backlog() {
    let manager = SseManager::new();
    manager.broadcast("A1", "agent:output", json!({"n": 1}));

    let conn = manager.connect("A1", None);
    assert!(conn.backlog.is_empty());
}

#[tokio::test]
async fn backpressured_subscriber_is_dropped_only_after_grace_window() {
    let manager = SseManager::new();
    let conn = manager.connect("A1", None);
    drop(conn); // closes the receiver, simulating a dead/slow reader

    let before = manager.channel_names();
    assert_eq!(before, vec!["A1".to_string()]);

    // Closed receiver means try_send immediately errors Closed, not Full —
    // the slot is pruned on the very next broadcast regardless of grace.
    manager.broadcast("A1", "agent:output", json!({"n": 1}));

    let conn = manager.connect("A1", None);
    assert!(conn.backlog.is_empty());
}

#[tokio::test]
async fn shutdown_clears_subscribers_but_keeps_channel_history() {
    let manager = SseManager::new();
    manager.broadcast("A1", "agent:output", json!({"n": 1}));
    let _conn = manager.connect("A1", None);

    manager.shutdown();

    let resumed = manager.connect("A1", Some(0));
    assert_eq!(resumed.backlog.len(), 1);
}

#[tokio::test]
async fn connection_stream_yields_replayed_then_live_events() {
    let manager = SseManager::new();
    manager.broadcast("A1", "agent:output", json!({"n": 1}));

    let mut conn = manager.connect("A1", Some(0));
    manager.broadcast("A1", "agent:output", json!({"n": 2}));

    let first = conn.next().await.unwrap().unwrap();
    let second = conn.next().await.unwrap().unwrap();
    assert!(format!("{first:?}").contains("id"));
    assert!(format!("{second:?}").contains("id"));
}
