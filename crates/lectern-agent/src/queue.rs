// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only outbound event queue of one live session.
//!
//! The transport layer reads it by index (`len`, `get`) and parks on
//! [`EventQueue::wait_past`] for new events. Once closed, pushes are
//! silently dropped so an in-flight turn on a terminated session cannot
//! fail.

use std::sync::Mutex;

use lectern_core::ChatEvent;
use tokio::sync::Notify;

#[derive(Default)]
struct QueueState {
    events: Vec<ChatEvent>,
    closed: bool,
}

#[derive(Default)]
pub struct EventQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event. Returns `false` when the queue is closed.
    pub fn push(&self, event: ChatEvent) -> bool {
        let accepted = match self.state.lock() {
            Ok(mut state) if !state.closed => {
                state.events.push(event);
                true
            }
            _ => false,
        };
        if accepted {
            self.notify.notify_waiters();
        }
        accepted
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<ChatEvent> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.events.get(index).cloned())
    }

    /// Events from `index` onwards.
    pub fn since(&self, index: usize) -> Vec<ChatEvent> {
        self.state
            .lock()
            .map(|s| s.events.get(index..).map(<[_]>::to_vec).unwrap_or_default())
            .unwrap_or_default()
    }

    /// Stops accepting events and wakes every waiter.
    pub fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
        }
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(true)
    }

    /// Resolves once the queue holds more than `len` events or is closed.
    pub async fn wait_past(&self, len: usize) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.len() > len || self.is_closed() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn push_after_close_is_a_no_op() {
        let queue = EventQueue::new();
        assert!(queue.push(ChatEvent::chunk("m", "a")));
        queue.close();
        assert!(!queue.push(ChatEvent::chunk("m", "b")));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn since_out_of_range_is_empty() {
        let queue = EventQueue::new();
        queue.push(ChatEvent::chunk("m", "a"));
        assert_eq!(queue.since(0).len(), 1);
        assert!(queue.since(5).is_empty());
        assert!(queue.get(3).is_none());
    }

    #[tokio::test]
    async fn wait_past_wakes_on_push() {
        let queue = Arc::new(EventQueue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.wait_past(0).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push(ChatEvent::chunk("m", "a"));
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn wait_past_returns_when_closed() {
        let queue = EventQueue::new();
        queue.close();
        tokio::time::timeout(Duration::from_secs(1), queue.wait_past(0))
            .await
            .expect("closed queue should not block");
    }
}
