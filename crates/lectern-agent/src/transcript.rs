// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The ordered turn list sent to the completion service.

use std::collections::HashSet;
use std::sync::LazyLock;

use lectern_core::types::TurnItem;
use regex::Regex;
use thiserror::Error;

static ASSISTANT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^msg_[A-Za-z0-9_-]+$").expect("valid assistant id pattern")
});

/// Whether `id` is accepted by the completion service as an assistant
/// message id.
pub fn is_valid_assistant_id(id: &str) -> bool {
    ASSISTANT_ID.is_match(id)
}

/// A fresh assistant id: `msg_` followed by 32 hex digits.
pub fn synthesize_assistant_id() -> String {
    format!("msg_{}", uuid::Uuid::new_v4().simple())
}

/// Ways a transcript can be unacceptable to the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptError {
    #[error("assistant turn {index} has invalid id `{id}`")]
    InvalidAssistantId { index: usize, id: String },
    #[error("tool output at {index} references unknown call `{call_id}`")]
    OrphanOutput { index: usize, call_id: String },
    #[error("tool call `{call_id}` has no output")]
    UnansweredCall { call_id: String },
    #[error("tool call `{call_id}` appears twice")]
    DuplicateCall { call_id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    items: Vec<TurnItem>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: TurnItem) {
        self.items.push(item);
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.items.push(TurnItem::User { text: text.into() });
    }

    pub fn push_assistant(&mut self, id: impl Into<String>, text: impl Into<String>) {
        self.items.push(TurnItem::Assistant {
            id: id.into(),
            text: text.into(),
        });
    }

    pub fn items(&self) -> &[TurnItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Checks ids and call/output pairing. Outputs must follow their call.
    pub fn validate(&self) -> Result<(), TranscriptError> {
        let mut calls = HashSet::new();
        let mut answered = HashSet::new();
        for (index, item) in self.items.iter().enumerate() {
            match item {
                TurnItem::Assistant { id, .. } if !is_valid_assistant_id(id) => {
                    return Err(TranscriptError::InvalidAssistantId {
                        index,
                        id: id.clone(),
                    });
                }
                TurnItem::ToolCall { call_id, .. } => {
                    if !calls.insert(call_id.as_str()) {
                        return Err(TranscriptError::DuplicateCall {
                            call_id: call_id.clone(),
                        });
                    }
                }
                TurnItem::ToolOutput { call_id, .. } => {
                    if !calls.contains(call_id.as_str()) {
                        return Err(TranscriptError::OrphanOutput {
                            index,
                            call_id: call_id.clone(),
                        });
                    }
                    answered.insert(call_id.as_str());
                }
                _ => {}
            }
        }
        if let Some(call_id) = calls.iter().find(|c| !answered.contains(*c)) {
            return Err(TranscriptError::UnansweredCall {
                call_id: (*call_id).to_string(),
            });
        }
        Ok(())
    }
}

impl From<Vec<TurnItem>> for Transcript {
    fn from(items: Vec<TurnItem>) -> Self {
        Self { items }
    }
}
