// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A lazy, cancellable handle to a running task's event stream.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::backend::OutputEvent;

/// Handle to a task in flight. Events are pulled with [`Handle::recv`];
/// nothing runs until the caller starts polling. Dropping the handle (or
/// calling [`Handle::cancel`]) signals the underlying task's
/// `CancellationToken`, which cooperating backends check between steps.
pub struct Handle {
    events: mpsc::Receiver<OutputEvent>,
    cancel: CancellationToken,
}

impl Handle {
    pub fn new(events: mpsc::Receiver<OutputEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    /// Receive the next event, or `None` once the backend closes the channel.
    pub async fn recv(&mut self) -> Option<OutputEvent> {
        self.events.recv().await
    }

    /// Request cancellation. Idempotent; cooperating backends observe this
    /// on their next cancellation check and stop emitting further events.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Paired sender half, held by the backend driving the task.
pub struct HandleSender {
    pub events: mpsc::Sender<OutputEvent>,
    pub cancel: CancellationToken,
}

/// Create a connected `(HandleSender, Handle)` pair with the given channel capacity.
pub fn channel(capacity: usize) -> (HandleSender, Handle) {
    let (tx, rx) = mpsc::channel(capacity);
    let cancel = CancellationToken::new();
    (HandleSender { events: tx, cancel: cancel.clone() }, Handle::new(rx, cancel))
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;
