// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events streaming for POST /api/sendchat.
//!
//! The turn runs on a detached task; the response streams the session's
//! event queue from the index it had when the turn was admitted, one SSE
//! event per queued [`ChatEvent`], until a `done` or `error` event or the
//! session closes.
//!
//! ```text
//! event: chunk
//! data: {"type":"chunk","data":"Here are ","msg_id":"msg_1"}
//!
//! event: done
//! data: {"type":"done","data":{"inputTokens":40,"outputTokens":12}}
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use dashmap::DashSet;
use futures::stream::{self, Stream};
use lectern_agent::EventQueue;
use lectern_core::ChatEvent;
use lectern_quota::estimate_tokens;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::{extract_api_key, verify_caller};
use crate::error::ApiError;
use crate::handlers::KeyQuery;
use crate::server::GatewayState;

/// Request body for POST /api/sendchat.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendChatRequest {
    pub chat_id: String,
    pub message: String,
    #[serde(default)]
    pub entry_id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Marks a chat busy for as long as it is held.
pub struct TurnGuard {
    busy: Arc<DashSet<String>>,
    chat_id: String,
}

impl TurnGuard {
    /// `None` when the chat already has a turn in flight.
    pub fn acquire(busy: &Arc<DashSet<String>>, chat_id: &str) -> Option<Self> {
        busy.insert(chat_id.to_string()).then(|| Self {
            busy: busy.clone(),
            chat_id: chat_id.to_string(),
        })
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.busy.remove(&self.chat_id);
    }
}

/// POST /api/sendchat
///
/// Admits the message against the caller's quota, starts the turn and
/// streams its events. A chat with no live session is resumed from its
/// message log first.
pub async fn send_chat(
    State(state): State<GatewayState>,
    Query(query): Query<KeyQuery>,
    headers: HeaderMap,
    Json(body): Json<SendChatRequest>,
) -> Result<Response, ApiError> {
    if body.message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }
    let caller = verify_caller(
        &state,
        extract_api_key(&headers, query.api_key.as_deref(), body.api_key.as_deref()),
    )
    .await?;
    let chat_id = body.chat_id;

    let session = match state.registry.session(&chat_id) {
        Some(session) => session,
        None => {
            state
                .registry
                .resume(&chat_id, None, None, &caller.user.id, &caller.api_key)
                .await?
        }
    };
    if session.user_id() != caller.user.id {
        return Err(ApiError::not_found(format!("chat {chat_id} not found")));
    }
    if !session.key_matches(&caller.api_key) {
        return Err(ApiError::unauthorized("API key does not match this chat"));
    }
    let guard = TurnGuard::acquire(&state.busy, &chat_id)
        .ok_or_else(|| ApiError::conflict("a message is already being processed for this chat"))?;

    let message = body.message;
    let receipt = state
        .quota
        .record_usage(&caller.user.id, &message, estimate_tokens(&message))
        .await?;

    // Only an admitted message may move the focus.
    if let Some(entry_id) = body.entry_id {
        let catalog_id = session.focus().catalog_id;
        state
            .registry
            .set_focus(&chat_id, Some(entry_id), catalog_id)
            .await?;
    }

    let queue = session.queue().clone();
    let start = queue.len();

    let registry = state.registry.clone();
    let quota = state.quota.clone();
    let user_id = caller.user.id;
    let api_key = caller.api_key;
    tokio::spawn(async move {
        let _guard = guard;
        let actual = match registry.chat(&chat_id, &api_key, &message).await {
            Ok(report) => {
                if let Err(e) = &report.outcome {
                    debug!(chat_id = %chat_id, error = %e, "turn ended with error event");
                }
                i64::from(report.usage.total())
            }
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "turn did not run");
                0
            }
        };
        if let Err(e) = quota.settle_tokens(&user_id, &receipt, actual).await {
            warn!(user_id = %user_id, error = %e, "token settlement failed");
        }
    });

    Ok(Sse::new(event_stream(queue, start))
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// Streams `queue` from `start` through the first terminal event.
pub fn event_stream(
    queue: Arc<EventQueue>,
    start: usize,
) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    stream::unfold(Some((queue, start)), |cursor| async move {
        let (queue, mut index) = cursor?;
        loop {
            if let Some(event) = queue.get(index) {
                index += 1;
                let next = (!event.is_terminal()).then_some((queue, index));
                return Some((Ok(to_sse(&event)), next));
            }
            if queue.is_closed() {
                return None;
            }
            queue.wait_past(index).await;
        }
    })
}

fn to_sse(event: &ChatEvent) -> Event {
    let data = serde_json::to_string(event)
        .unwrap_or_else(|_| r#"{"type":"error","data":"unserializable event"}"#.to_string());
    Event::default().event(event.kind.to_string()).data(data)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use futures::StreamExt;
    use lectern_core::types::TokenUsage;

    use super::*;

    #[test]
    fn guard_is_exclusive_per_chat() {
        let busy = Arc::new(DashSet::new());
        let first = TurnGuard::acquire(&busy, "c1").unwrap();
        assert!(TurnGuard::acquire(&busy, "c1").is_none());
        assert!(TurnGuard::acquire(&busy, "c2").is_some());
        drop(first);
        assert!(TurnGuard::acquire(&busy, "c1").is_some());
    }

    #[tokio::test]
    async fn stream_stops_after_terminal_event() {
        let queue = Arc::new(EventQueue::new());
        queue.push(ChatEvent::entries(vec!["old".into()], BTreeMap::new()));
        queue.push(ChatEvent::chunk("m1", "Hi"));
        queue.push(ChatEvent::done(TokenUsage::default()));
        queue.push(ChatEvent::chunk("m2", "next turn"));

        let events: Vec<_> = event_stream(queue, 1).collect().await;
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn stream_waits_for_late_events() {
        let queue = Arc::new(EventQueue::new());
        let producer = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.push(ChatEvent::message("m1", "late"));
            producer.push(ChatEvent::error("boom"));
        });

        let events: Vec<_> = event_stream(queue, 0).collect().await;
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn closed_queue_ends_stream() {
        let queue = Arc::new(EventQueue::new());
        queue.push(ChatEvent::chunk("m1", "partial"));
        let closer = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            closer.close();
        });

        let events: Vec<_> = event_stream(queue, 0).collect().await;
        assert_eq!(events.len(), 1);
    }
}
