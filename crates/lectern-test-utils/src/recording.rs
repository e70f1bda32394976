// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Mutex;

use lectern_core::{ChatEvent, ChatEventKind, ConversationListener};

/// Listener that keeps every event it receives.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ChatEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far, in order.
    pub fn events(&self) -> Vec<ChatEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<ChatEventKind> {
        self.events().into_iter().map(|e| e.kind).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl ConversationListener for RecordingListener {
    fn on_event(&self, event: ChatEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
