// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Lectern services.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Timestamp layout used for every persisted record. Lexicographic order
/// matches chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Formats a UTC instant in the persisted timestamp layout.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Current time in the persisted timestamp layout.
pub fn timestamp_now() -> String {
    format_timestamp(Utc::now())
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Storage,
    Catalog,
}

// --- Persisted records ---

/// A catalog user, mirrored locally after identity verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub is_superuser: bool,
    pub permissions: Vec<String>,
    /// Catalog id to permission level.
    pub catalog_permissions: BTreeMap<String, String>,
    pub blocked: bool,
    pub blocked_reason: Option<String>,
    pub blocked_until: Option<String>,
    pub created_at: String,
    pub last_seen_at: String,
}

impl User {
    /// Whether the user is blocked at `now`. A block with an expiry in the
    /// past no longer applies.
    pub fn is_blocked_at(&self, now: DateTime<Utc>) -> bool {
        if !self.blocked {
            return false;
        }
        match self.blocked_until.as_deref() {
            None => true,
            Some(until) => match DateTime::parse_from_rfc3339(until) {
                Ok(until) => until.with_timezone(&Utc) > now,
                // An unreadable expiry is treated as indefinite.
                Err(_) => true,
            },
        }
    }

    /// Name shown in admin listings.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(f), Some(l)) => format!("{f} {l}"),
            (Some(f), None) => f.clone(),
            (None, Some(l)) => l.clone(),
            (None, None) => self.username.clone().unwrap_or_else(|| self.id.clone()),
        }
    }
}

/// A conversation owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub started_at: String,
    pub message_count: i64,
    pub total_tokens: i64,
}

/// Sender of a persisted message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// One entry of a chat's append-only message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub user_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: String,
    /// Focus item at the time the message was sent.
    pub entry_id: Option<String>,
    pub catalog_id: Option<String>,
    /// Provider-assigned id of an assistant output message.
    pub provider_msg_id: Option<String>,
    /// Items displayed to the user alongside this message.
    pub entry_ids: Option<Vec<String>>,
    pub entry_catalogs: Option<BTreeMap<String, String>>,
}

/// Per-user counters for one quota day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLimit {
    pub id: String,
    pub user_id: String,
    /// Quota date, `YYYY-MM-DD`.
    pub date: String,
    pub messages_used: i64,
    pub messages_limit: i64,
    pub tokens_used: i64,
    pub tokens_limit: i64,
    pub created_at: String,
    pub updated_at: String,
}

// --- Provider types ---

/// One item of the transcript sent to the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnItem {
    User {
        text: String,
    },
    Assistant {
        id: String,
        text: String,
    },
    ToolCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    ToolOutput {
        call_id: String,
        output: String,
    },
}

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// A request to an LLM provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub model: String,
    pub instructions: String,
    pub input: Vec<TurnItem>,
    pub tools: Vec<ToolDefinition>,
    pub max_output_tokens: Option<u32>,
}

/// A completed output item returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputItem {
    Message {
        id: String,
        text: String,
    },
    FunctionCall {
        id: Option<String>,
        call_id: String,
        name: String,
        arguments: String,
    },
    /// Any item kind the orchestrator does not act on (reasoning, etc.).
    Other {
        kind: String,
    },
}

/// Token usage reported by the provider for one completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Kind of streaming event from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StreamEventType {
    OutputTextDelta,
    OutputItemDone,
    Completed,
    Error,
}

/// A single chunk from a streaming LLM provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderStreamChunk {
    pub event_type: StreamEventType,
    pub text: Option<String>,
    pub item_id: Option<String>,
    pub item: Option<OutputItem>,
    pub usage: Option<TokenUsage>,
    pub error: Option<String>,
}

impl ProviderStreamChunk {
    pub fn delta(item_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            event_type: StreamEventType::OutputTextDelta,
            text: Some(text.into()),
            item_id: Some(item_id.into()),
            item: None,
            usage: None,
            error: None,
        }
    }

    pub fn item_done(item: OutputItem) -> Self {
        Self {
            event_type: StreamEventType::OutputItemDone,
            text: None,
            item_id: None,
            item: Some(item),
            usage: None,
            error: None,
        }
    }

    pub fn completed(usage: Option<TokenUsage>) -> Self {
        Self {
            event_type: StreamEventType::Completed,
            text: None,
            item_id: None,
            item: None,
            usage,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            event_type: StreamEventType::Error,
            text: None,
            item_id: None,
            item: None,
            usage: None,
            error: Some(message.into()),
        }
    }
}

// --- Catalog types ---

/// Search filters for the catalog. Unset fields are never sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_from: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_to: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
}

impl CatalogFilters {
    /// Filters as `(name, value)` query pairs, skipping unset fields.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let strings = [
            ("query", &self.query),
            ("title", &self.title),
            ("author", &self.author),
            ("genre", &self.genre),
            ("language", &self.language),
            ("catalogId", &self.catalog_id),
        ];
        for (name, value) in strings {
            if let Some(v) = value {
                pairs.push((name, v.clone()));
            }
        }
        if let Some(y) = self.year_from {
            pairs.push(("yearFrom", y.to_string()));
        }
        if let Some(y) = self.year_to {
            pairs.push(("yearTo", y.to_string()));
        }
        if let Some(a) = self.available {
            pairs.push(("available", a.to_string()));
        }
        pairs
    }
}

/// A catalog item. Fields beyond the identifying ones are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    #[serde(rename = "catalogId", alias = "catalog_id")]
    pub catalog_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One page of catalog search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSearchResult {
    pub entries: Vec<CatalogEntry>,
    #[serde(default)]
    pub total: Option<u64>,
    pub page: u32,
    pub limit: u32,
}

/// Identity returned by the catalog for a verified API key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogIdentity {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub catalog_permissions: BTreeMap<String, String>,
}
