// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use futures_util::StreamExt;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;

fn frame(id: u64) -> Frame {
    Frame { id, event: "agent:output".to_string(), data: json!({"n": id}) }
}

#[tokio::test]
async fn drains_backlog_before_live_frames() {
    let (tx, rx) = mpsc::channel(8);
    tx.send(frame(99)).await.unwrap();
    let mut conn =
        Connection::with_heartbeat("A1".into(), vec![frame(1), frame(2)], rx, Duration::from_secs(3600));

    let first = conn.next().await.unwrap().unwrap();
    let second = conn.next().await.unwrap().unwrap();
    let third = conn.next().await.unwrap().unwrap();
    assert_eq!(format!("{first:?}"), format!("{:?}", frame_to_event(&frame(1))));
    assert_eq!(format!("{second:?}"), format!("{:?}", frame_to_event(&frame(2))));
    assert_eq!(format!("{third:?}"), format!("{:?}", frame_to_event(&frame(99))));
}

#[tokio::test(start_paused = true)]
async fn emits_heartbeat_comment_when_idle() {
    let (_tx, rx) = mpsc::channel::<Frame>(8);
    let mut conn = Connection::with_heartbeat("A1".into(), Vec::new(), rx, Duration::from_secs(5));

    tokio::time::advance(Duration::from_secs(6)).await;
    let event = conn.next().await.unwrap().unwrap();
    assert!(format!("{event:?}").contains("heartbeat"));
}

#[tokio::test]
async fn channel_returns_name() {
    let (_tx, rx) = mpsc::channel::<Frame>(8);
    let conn = Connection::with_heartbeat("job-42".into(), Vec::new(), rx, Duration::from_secs(60));
    assert_eq!(conn.channel(), "job-42");
}
