// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE stream parser for Responses API streaming.
//!
//! Turns a reqwest response body into typed [`StreamEvent`]s with
//! `eventsource-stream`. Event kinds the adapter does not consume are skipped.

use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use lectern_core::LecternError;
use serde::de::DeserializeOwned;

use crate::types::{SseError, SseItemDone, SseResponseEnvelope, SseTextDelta};

/// Typed SSE events from the Responses streaming protocol.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A piece of text for an output message.
    TextDelta(SseTextDelta),
    /// An output item is complete.
    ItemDone(SseItemDone),
    /// The response finished normally.
    Completed(SseResponseEnvelope),
    /// The response stopped early (output token limit, content filter).
    Incomplete(SseResponseEnvelope),
    /// The response failed server-side.
    Failed(SseResponseEnvelope),
    /// Stream-level error.
    Error(SseError),
}

/// Parses a streaming response into [`StreamEvent`]s.
///
/// The event kind comes from the SSE `event:` field. Servers that omit it are
/// handled by reading the `type` field of the JSON payload instead.
pub fn parse_sse_stream(
    response: reqwest::Response,
) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LecternError>> + Send>> {
    let event_stream = response.bytes_stream().eventsource();

    let mapped = event_stream.filter_map(|result| async move {
        match result {
            Ok(event) => {
                let kind = if event.event.is_empty() || event.event == "message" {
                    payload_type(&event.data)?
                } else {
                    event.event.clone()
                };
                parse_event(&kind, &event.data)
            }
            Err(e) => Some(Err(LecternError::Provider {
                message: format!("SSE stream error: {e}"),
                source: None,
            })),
        }
    });

    Box::pin(mapped)
}

fn parse_event(kind: &str, data: &str) -> Option<Result<StreamEvent, LecternError>> {
    let parsed = match kind {
        "response.output_text.delta" => decode(kind, data).map(StreamEvent::TextDelta),
        "response.output_item.done" => decode(kind, data).map(StreamEvent::ItemDone),
        "response.completed" => decode(kind, data).map(StreamEvent::Completed),
        "response.incomplete" => decode(kind, data).map(StreamEvent::Incomplete),
        "response.failed" => decode(kind, data).map(StreamEvent::Failed),
        "error" => decode(kind, data).map(StreamEvent::Error),
        // created, in_progress, content_part.*, output_text.done, reasoning and
        // function-argument deltas carry nothing the final items don't.
        _ => return None,
    };
    Some(parsed)
}

fn decode<T: DeserializeOwned>(kind: &str, data: &str) -> Result<T, LecternError> {
    serde_json::from_str(data).map_err(|e| LecternError::Provider {
        message: format!("failed to parse {kind}: {e}"),
        source: Some(Box::new(e)),
    })
}

fn payload_type(data: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(data).ok()?;
    value.get("type")?.as_str().map(str::to_string)
}
