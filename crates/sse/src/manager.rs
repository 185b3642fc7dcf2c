// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fan-out manager: one `Channel` per logical subscriber group (an agent id,
//! a job id, `"_channel_health"`, …), each owning a monotonic event counter,
//! a bounded replay ring, and its live connections. `broadcast` never blocks
//! on a slow reader — a connection that falls behind is dropped, not the
//! whole channel.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::connection::Connection;

/// Number of past events retained per channel for resume-by-`Last-Event-ID`.
const RING_CAPACITY: usize = 256;
/// Outgoing queue depth per connection before backpressure kicks in.
const CONNECTION_BUFFER: usize = 64;
/// How long a connection may stay backpressured before it is dropped.
const BACKPRESSURE_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Frame {
    pub id: u64,
    pub event: String,
    pub data: Value,
}

struct ChannelState {
    next_id: u64,
    ring: VecDeque<Frame>,
    subscribers: Vec<SubscriberSlot>,
}

struct SubscriberSlot {
    tx: mpsc::Sender<Frame>,
    backpressured_since: Option<Instant>,
}

impl ChannelState {
    fn new() -> Self {
        Self { next_id: 1, ring: VecDeque::with_capacity(RING_CAPACITY), subscribers: Vec::new() }
    }

    fn push_ring(&mut self, frame: Frame) {
        if self.ring.len() >= RING_CAPACITY {
            self.ring.pop_front();
        }
        self.ring.push_back(frame);
    }

    fn replay_since(&self, last_event_id: u64) -> Vec<Frame> {
        self.ring.iter().filter(|f| f.id > last_event_id).cloned().collect()
    }
}

/// Per-channel, per-connection Server-Sent-Events fan-out.
///
/// `broadcast` is non-blocking: a connection whose outgoing queue is full
/// has the event dropped for that connection only (the ring buffer still
/// retains it for everyone else and for resume). A connection that stays
/// backpressured past `BACKPRESSURE_GRACE` is closed with `stream:overflow`.
pub struct SseManager {
    channels: Mutex<HashMap<String, ChannelState>>,
}

impl Default for SseManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SseManager {
    pub fn new() -> Self {
        Self { channels: Mutex::new(HashMap::new()) }
    }

    /// Subscribe to `channel`, optionally resuming from `last_event_id`
    /// (frames buffered in the channel's ring with a greater id are
    /// delivered first, then the connection tails live broadcasts).
    pub fn connect(&self, channel: &str, last_event_id: Option<u64>) -> Connection {
        let (tx, rx) = mpsc::channel(CONNECTION_BUFFER);
        let mut channels = self.channels.lock();
        let state = channels.entry(channel.to_string()).or_insert_with(ChannelState::new);

        let backlog = last_event_id.map(|id| state.replay_since(id)).unwrap_or_default();
        state.subscribers.push(SubscriberSlot { tx: tx.clone(), backpressured_since: None });

        Connection::new(channel.to_string(), backlog, rx)
    }

    /// Append an event to `channel`'s ring and relay it to every live
    /// subscriber. Returns the assigned monotonic event id.
    pub fn broadcast(&self, channel: &str, event: impl Into<String>, data: Value) -> u64 {
        let mut channels = self.channels.lock();
        let state = channels.entry(channel.to_string()).or_insert_with(ChannelState::new);

        let id = state.next_id;
        state.next_id += 1;
        let frame = Frame { id, event: event.into(), data };
        state.push_ring(frame.clone());

        let now = Instant::now();
        state.subscribers.retain_mut(|slot| match slot.tx.try_send(frame.clone()) {
            Ok(()) => {
                slot.backpressured_since = None;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                let since = *slot.backpressured_since.get_or_insert(now);
                let overflowed = now.duration_since(since) > BACKPRESSURE_GRACE;
                if overflowed {
                    tracing::warn!(channel, "dropping backpressured SSE subscriber");
                    let overflow = Frame { id, event: "stream:overflow".to_string(), data: Value::Null };
                    let _ = slot.tx.try_send(overflow);
                }
                !overflowed
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });

        id
    }

    /// Close every live connection on every channel. Subsequent `connect`
    /// calls still work; this does not tear down the manager itself.
    pub fn shutdown(&self) {
        let mut channels = self.channels.lock();
        for state in channels.values_mut() {
            state.subscribers.clear();
        }
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.lock().keys().cloned().collect()
    }
}

pub type SharedSseManager = Arc<SseManager>;

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
