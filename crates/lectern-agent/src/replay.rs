// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rebuilds a live transcript from a chat's persisted message log.

use std::collections::BTreeMap;

use lectern_core::ChatEvent;
use lectern_core::types::{Message, Role};
use tracing::debug;

use crate::transcript::{Transcript, is_valid_assistant_id, synthesize_assistant_id};

const DISPLAY_MARKER: &str = "[Displayed items:";

/// Text recorded for a display of `ids`, and re-injected into replayed
/// assistant turns so the model remembers what it showed.
pub fn display_note(ids: &[String], catalogs: &BTreeMap<String, String>) -> String {
    let listed: Vec<String> = ids
        .iter()
        .map(|id| match catalogs.get(id) {
            Some(catalog) => format!("{id} (catalog {catalog})"),
            None => id.clone(),
        })
        .collect();
    format!("{DISPLAY_MARKER} {}]", listed.join(", "))
}

/// Result of replaying a message log.
#[derive(Debug, Default)]
pub struct Replay {
    pub transcript: Transcript,
    /// `entries` events for every stored display, oldest first.
    pub display_events: Vec<ChatEvent>,
}

/// Replays `messages` (already in log order) into a transcript.
///
/// User messages become user turns and agent messages assistant turns.
/// Stored ids the completion service would reject are replaced, and
/// display metadata missing from the text is appended to it.
pub fn replay(messages: &[Message]) -> Replay {
    let mut out = Replay::default();
    for message in messages {
        match message.role {
            Role::User => out.transcript.push_user(message.content.clone()),
            Role::Agent => {
                let ids = message.entry_ids.as_deref().unwrap_or_default();
                let catalogs = message.entry_catalogs.clone().unwrap_or_default();

                let mut text = message.content.clone();
                if !ids.is_empty() {
                    if !text.contains(DISPLAY_MARKER) {
                        if !text.is_empty() {
                            text.push_str("\n\n");
                        }
                        text.push_str(&display_note(ids, &catalogs));
                    }
                    out.display_events
                        .push(ChatEvent::entries(ids.to_vec(), catalogs));
                }
                if text.trim().is_empty() {
                    debug!(message_id = %message.id, "skipping empty agent message");
                    continue;
                }

                let id = match message.provider_msg_id.as_deref() {
                    Some(id) if is_valid_assistant_id(id) => id.to_string(),
                    _ => synthesize_assistant_id(),
                };
                out.transcript.push_assistant(id, text);
            }
        }
    }
    out
}
