// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events a conversation emits to its client, and the listener seam that
//! receives them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::types::TokenUsage;

/// Kind of a client-facing event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChatEventKind {
    /// Incremental assistant text.
    Chunk,
    /// A complete assistant message.
    Message,
    /// Catalog items to display.
    Entries,
    /// The turn finished.
    Done,
    /// The turn failed.
    Error,
}

/// One event on a conversation's outbound stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    #[serde(rename = "type")]
    pub kind: ChatEventKind,
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,
    /// Item id to catalog id, on `entries` events.
    #[serde(rename = "catalogId", default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<BTreeMap<String, String>>,
}

impl ChatEvent {
    pub fn chunk(item_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: ChatEventKind::Chunk,
            data: serde_json::Value::String(text.into()),
            msg_id: Some(item_id.into()),
            catalog_id: None,
        }
    }

    pub fn message(msg_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: ChatEventKind::Message,
            data: serde_json::Value::String(text.into()),
            msg_id: Some(msg_id.into()),
            catalog_id: None,
        }
    }

    pub fn entries(ids: Vec<String>, catalogs: BTreeMap<String, String>) -> Self {
        Self {
            kind: ChatEventKind::Entries,
            data: serde_json::Value::from(ids),
            msg_id: None,
            catalog_id: Some(catalogs),
        }
    }

    pub fn done(usage: TokenUsage) -> Self {
        Self {
            kind: ChatEventKind::Done,
            data: serde_json::json!({
                "inputTokens": usage.input_tokens,
                "outputTokens": usage.output_tokens,
            }),
            msg_id: None,
            catalog_id: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ChatEventKind::Error,
            data: serde_json::Value::String(message.into()),
            msg_id: None,
            catalog_id: None,
        }
    }

    /// Ids carried by an `entries` event.
    pub fn entry_ids(&self) -> Vec<String> {
        match &self.data {
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `done` and `error` end a turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, ChatEventKind::Done | ChatEventKind::Error)
    }
}

/// Receives a conversation's events as they happen.
///
/// Called inline from the conversation loop, so implementations must not
/// block; anything slow belongs in a spawned task.
pub trait ConversationListener: Send + Sync {
    fn on_event(&self, event: ChatEvent);
}

/// The catalog item a conversation is currently about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Focus {
    pub entry_id: Option<String>,
    pub catalog_id: Option<String>,
}

impl Focus {
    pub fn new(entry_id: Option<String>, catalog_id: Option<String>) -> Self {
        Self {
            entry_id,
            catalog_id,
        }
    }

    /// The focus catalog, if `entry_id` is the focused item.
    pub fn catalog_for(&self, entry_id: &str) -> Option<&str> {
        match (&self.entry_id, &self.catalog_id) {
            (Some(id), Some(catalog)) if id == entry_id => Some(catalog),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_event_wire_shape() {
        let event = ChatEvent::entries(
            vec!["a".into(), "b".into()],
            BTreeMap::from([("a".into(), "c1".into()), ("b".into(), "c2".into())]),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "entries",
                "data": ["a", "b"],
                "catalogId": {"a": "c1", "b": "c2"}
            })
        );
        assert_eq!(event.entry_ids(), ["a", "b"]);
    }

    #[test]
    fn chunk_carries_item_id() {
        let json = serde_json::to_value(ChatEvent::chunk("msg_1", "Hel")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "chunk", "data": "Hel", "msg_id": "msg_1"}));
    }

    #[test]
    fn focus_resolves_only_its_own_item() {
        let focus = Focus::new(Some("e1".into()), Some("c1".into()));
        assert_eq!(focus.catalog_for("e1"), Some("c1"));
        assert_eq!(focus.catalog_for("e2"), None);
        assert_eq!(Focus::default().catalog_for("e1"), None);
    }
}
