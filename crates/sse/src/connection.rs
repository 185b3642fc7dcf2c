// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single subscriber's half of the fan-out: replay backlog, then live
//! frames, interleaved with heartbeat comments so intermediary proxies
//! don't time out an idle stream. Implements `Stream` directly so it can be
//! handed straight to `axum::response::sse::Sse`.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::response::sse::Event;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_stream::Stream;

use crate::manager::Frame;

const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(60);

fn frame_to_event(frame: &Frame) -> Event {
    Event::default().id(frame.id.to_string()).event(frame.event.clone()).data(frame.data.to_string())
}

/// One subscriber's event stream: first drains any replayed backlog, then
/// polls the live channel, with a heartbeat comment on a fixed interval.
pub struct Connection {
    channel: String,
    pub(crate) backlog: VecDeque<Frame>,
    pub(crate) rx: mpsc::Receiver<Frame>,
    heartbeat: Interval,
}

impl Connection {
    pub(crate) fn new(channel: String, backlog: Vec<Frame>, rx: mpsc::Receiver<Frame>) -> Self {
        Self::with_heartbeat(channel, backlog, rx, DEFAULT_HEARTBEAT)
    }

    pub(crate) fn with_heartbeat(
        channel: String,
        backlog: Vec<Frame>,
        rx: mpsc::Receiver<Frame>,
        heartbeat_interval: Duration,
    ) -> Self {
        let mut heartbeat = tokio::time::interval(heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { channel, backlog: backlog.into(), rx, heartbeat }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl Stream for Connection {
    type Item = Result<Event, std::convert::Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(frame) = self.backlog.pop_front() {
            return Poll::Ready(Some(Ok(frame_to_event(&frame))));
        }

        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(frame)) => return Poll::Ready(Some(Ok(frame_to_event(&frame)))),
            Poll::Ready(None) => return Poll::Ready(None),
            Poll::Pending => {}
        }

        if self.heartbeat.poll_tick(cx).is_ready() {
            return Poll::Ready(Some(Ok(Event::default().comment("heartbeat"))));
        }

        Poll::Pending
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
