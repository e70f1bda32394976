// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for chat lifecycle, history, long-poll and health.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use lectern_core::ChatEvent;
use lectern_core::types::{Chat, Message, Role};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{Caller, extract_api_key, verify_caller};
use crate::error::ApiError;
use crate::server::GatewayState;

/// Characters of the first user message used as a derived chat title.
const TITLE_CHARS: usize = 50;
/// Characters of the last message shown in chat listings.
const PREVIEW_CHARS: usize = 100;

/// `?apiKey=` on any route.
#[derive(Debug, Default, Deserialize)]
pub struct KeyQuery {
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
}

/// Request body for POST /api/startchat.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartChatRequest {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub entry_id: Option<String>,
    #[serde(default)]
    pub catalog_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartChatResponse {
    pub chat_id: String,
}

/// Request body for POST /api/resumechat.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeChatRequest {
    pub chat_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub entry_id: Option<String>,
    #[serde(default)]
    pub catalog_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeChatResponse {
    pub chat_id: String,
    pub resumed: bool,
}

/// Query of GET /api/events/{chat_id}.
#[derive(Debug, Deserialize)]
pub struct PollQuery {
    #[serde(default)]
    pub from: usize,
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub events: Vec<ChatEvent>,
    /// Index to poll from next.
    pub next: usize,
}

/// One row of GET /user/chats.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub chat_id: String,
    pub title: String,
    pub started_at: String,
    pub message_count: i64,
    pub total_tokens: i64,
    pub last_message: Option<String>,
    pub last_message_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatListResponse {
    pub chats: Vec<ChatSummary>,
}

/// A persisted message as the client sees it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_catalogs: Option<BTreeMap<String, String>>,
}

impl From<Message> for MessageView {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            role: m.role,
            content: m.content,
            created_at: m.created_at,
            entry_id: m.entry_id,
            catalog_id: m.catalog_id,
            entry_ids: m.entry_ids,
            entry_catalogs: m.entry_catalogs,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryResponse {
    pub chat_id: String,
    pub title: String,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearHistoryResponse {
    pub chat_id: String,
    pub cleared: u64,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub sessions: usize,
    pub persistence_failures: u64,
}

async fn authenticate(
    state: &GatewayState,
    headers: &HeaderMap,
    query_key: Option<&str>,
    body_key: Option<&str>,
) -> Result<Caller, ApiError> {
    verify_caller(state, extract_api_key(headers, query_key, body_key)).await
}

/// Loads a chat, answering 404 when it belongs to someone else.
async fn owned_chat(state: &GatewayState, chat_id: &str, user_id: &str) -> Result<Chat, ApiError> {
    state
        .storage
        .get_chat(chat_id)
        .await?
        .filter(|chat| chat.user_id == user_id)
        .ok_or_else(|| ApiError::not_found(format!("chat {chat_id} not found")))
}

/// POST /api/startchat
pub async fn start_chat(
    State(state): State<GatewayState>,
    Query(query): Query<KeyQuery>,
    headers: HeaderMap,
    Json(body): Json<StartChatRequest>,
) -> Result<Json<StartChatResponse>, ApiError> {
    if body.entry_id.is_some() && body.catalog_id.is_none() {
        return Err(ApiError::bad_request("catalogId is required with entryId"));
    }
    let caller = authenticate(
        &state,
        &headers,
        query.api_key.as_deref(),
        body.api_key.as_deref(),
    )
    .await?;

    let chat_id = uuid::Uuid::new_v4().to_string();
    state
        .registry
        .create(
            &chat_id,
            body.entry_id,
            body.catalog_id,
            &caller.user.id,
            &caller.api_key,
        )
        .await?;
    info!(chat_id = %chat_id, user_id = %caller.user.id, "chat started");
    Ok(Json(StartChatResponse { chat_id }))
}

/// POST /api/resumechat
pub async fn resume_chat(
    State(state): State<GatewayState>,
    Query(query): Query<KeyQuery>,
    headers: HeaderMap,
    Json(body): Json<ResumeChatRequest>,
) -> Result<Json<ResumeChatResponse>, ApiError> {
    let caller = authenticate(
        &state,
        &headers,
        query.api_key.as_deref(),
        body.api_key.as_deref(),
    )
    .await?;
    state
        .registry
        .resume(
            &body.chat_id,
            body.entry_id,
            body.catalog_id,
            &caller.user.id,
            &caller.api_key,
        )
        .await?;
    Ok(Json(ResumeChatResponse {
        chat_id: body.chat_id,
        resumed: true,
    }))
}

/// GET /api/events/{chat_id}?from=N
///
/// Returns queued events from index `from`, parking up to the poll timeout
/// when none are there yet.
pub async fn poll_events(
    State(state): State<GatewayState>,
    Path(chat_id): Path<String>,
    Query(query): Query<PollQuery>,
    headers: HeaderMap,
) -> Result<Json<PollResponse>, ApiError> {
    let caller = authenticate(&state, &headers, query.api_key.as_deref(), None).await?;
    let registry = &state.registry;

    let not_found = || ApiError::not_found(format!("no live session for chat {chat_id}"));
    if !registry.has_session(&chat_id) {
        return Err(not_found());
    }
    let session = registry.session(&chat_id).ok_or_else(not_found)?;
    if session.user_id() != caller.user.id {
        return Err(not_found());
    }
    if !session.key_matches(&caller.api_key) {
        return Err(ApiError::unauthorized("API key does not match this chat"));
    }

    let from = query.from;
    if registry.queue_length(&chat_id).unwrap_or(0) <= from {
        // Elapsed just means an empty answer.
        let _ = tokio::time::timeout(state.poll_timeout, session.queue().wait_past(from)).await;
    }

    let end = registry.queue_length(&chat_id).unwrap_or(from);
    let events: Vec<ChatEvent> = (from..end)
        .map_while(|index| registry.event_at(&chat_id, index))
        .collect();
    let next = from + events.len();
    Ok(Json(PollResponse { events, next }))
}

/// GET /user/chats
///
/// Chats of the caller, most recent first.
pub async fn list_chats(
    State(state): State<GatewayState>,
    Query(query): Query<KeyQuery>,
    headers: HeaderMap,
) -> Result<Json<ChatListResponse>, ApiError> {
    let caller = authenticate(&state, &headers, query.api_key.as_deref(), None).await?;
    let chats = state.storage.list_chats_for_user(&caller.user.id).await?;

    let mut summaries = Vec::with_capacity(chats.len());
    for chat in chats {
        let messages = state.storage.list_messages(&chat.id).await?;
        let last = messages.last();
        summaries.push(ChatSummary {
            title: derive_title(&chat, &messages),
            last_message: last.map(|m| truncate_chars(&m.content, PREVIEW_CHARS)),
            last_message_at: last.map(|m| m.created_at.clone()),
            chat_id: chat.id,
            started_at: chat.started_at,
            message_count: chat.message_count,
            total_tokens: chat.total_tokens,
        });
    }
    Ok(Json(ChatListResponse { chats: summaries }))
}

/// GET /user/chats/{chat_id}
pub async fn chat_history(
    State(state): State<GatewayState>,
    Path(chat_id): Path<String>,
    Query(query): Query<KeyQuery>,
    headers: HeaderMap,
) -> Result<Json<ChatHistoryResponse>, ApiError> {
    let caller = authenticate(&state, &headers, query.api_key.as_deref(), None).await?;
    let chat = owned_chat(&state, &chat_id, &caller.user.id).await?;
    let messages = state
        .storage
        .list_user_messages(&chat_id, &caller.user.id)
        .await?;

    Ok(Json(ChatHistoryResponse {
        title: derive_title(&chat, &messages),
        chat_id,
        messages: messages.into_iter().map(MessageView::from).collect(),
    }))
}

/// DELETE /user/chats/{chat_id}/messages
///
/// Forgets the conversation: drops the live session and the message log.
pub async fn clear_history(
    State(state): State<GatewayState>,
    Path(chat_id): Path<String>,
    Query(query): Query<KeyQuery>,
    headers: HeaderMap,
) -> Result<Json<ClearHistoryResponse>, ApiError> {
    let caller = authenticate(&state, &headers, query.api_key.as_deref(), None).await?;
    owned_chat(&state, &chat_id, &caller.user.id).await?;
    let cleared = state.registry.remove(&chat_id).await?;
    Ok(Json(ClearHistoryResponse { chat_id, cleared }))
}

/// GET /health
pub async fn health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        sessions: state.registry.len(),
        persistence_failures: state.registry.persistence_failures(),
    })
}

/// Stored title, else the start of the first user message.
pub fn derive_title(chat: &Chat, messages: &[Message]) -> String {
    if let Some(title) = chat.title.as_deref()
        && !title.is_empty()
    {
        return title.to_string();
    }
    messages
        .iter()
        .find(|m| m.role == Role::User)
        .map(|m| truncate_chars(m.content.trim(), TITLE_CHARS))
        .unwrap_or_else(|| "New chat".to_string())
}

/// Cuts `text` to at most `max` characters, marking the cut with "...".
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
