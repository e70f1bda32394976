// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Responses API request/response types and SSE payloads.

use lectern_core::types::{OutputItem, TokenUsage, ToolDefinition, TurnItem};
use serde::{Deserialize, Serialize};

// --- Request types ---

/// Request body for `POST {base_url}/responses`.
#[derive(Debug, Clone, Serialize)]
pub struct ResponsesRequest {
    pub model: String,
    pub instructions: String,
    pub input: Vec<InputItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<FunctionTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    pub stream: bool,
    /// Conversation state lives in the transcript, never on the provider side.
    pub store: bool,
}

/// One item of the replayed conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    Message {
        role: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        content: Vec<ContentPart>,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

/// Text content inside an input message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputText { text: String },
    OutputText { text: String },
}

impl From<&TurnItem> for InputItem {
    fn from(item: &TurnItem) -> Self {
        match item {
            TurnItem::User { text } => InputItem::Message {
                role: "user".into(),
                id: None,
                content: vec![ContentPart::InputText { text: text.clone() }],
            },
            TurnItem::Assistant { id, text } => InputItem::Message {
                role: "assistant".into(),
                id: Some(id.clone()),
                content: vec![ContentPart::OutputText { text: text.clone() }],
            },
            TurnItem::ToolCall {
                call_id,
                name,
                arguments,
            } => InputItem::FunctionCall {
                call_id: call_id.clone(),
                name: name.clone(),
                arguments: arguments.clone(),
            },
            TurnItem::ToolOutput { call_id, output } => InputItem::FunctionCallOutput {
                call_id: call_id.clone(),
                output: output.clone(),
            },
        }
    }
}

/// A function tool declaration.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionTool {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl From<&ToolDefinition> for FunctionTool {
    fn from(def: &ToolDefinition) -> Self {
        Self {
            tool_type: "function",
            name: def.name.clone(),
            description: def.description.clone(),
            parameters: def.parameters.clone(),
        }
    }
}

// --- SSE payloads ---

/// Payload of `response.output_text.delta`.
#[derive(Debug, Clone, Deserialize)]
pub struct SseTextDelta {
    pub item_id: String,
    #[serde(default)]
    pub output_index: usize,
    pub delta: String,
}

/// Payload of `response.output_item.done`.
#[derive(Debug, Clone, Deserialize)]
pub struct SseItemDone {
    pub item: RawOutputItem,
}

/// An output item as the API sends it. Kept loose so new item kinds
/// deserialize and fall through to [`OutputItem::Other`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawOutputItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
    #[serde(default)]
    pub content: Vec<RawContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub refusal: Option<String>,
}

impl RawOutputItem {
    /// Converts into the provider-neutral item. A message without an id or a
    /// function call without a call id cannot be acted on and becomes `Other`.
    pub fn into_output_item(self) -> OutputItem {
        match self.kind.as_str() {
            "message" => match self.id {
                Some(id) => {
                    let text = self
                        .content
                        .iter()
                        .filter_map(|part| match part.kind.as_str() {
                            "output_text" => part.text.as_deref(),
                            "refusal" => part.refusal.as_deref(),
                            _ => None,
                        })
                        .collect::<String>();
                    OutputItem::Message { id, text }
                }
                None => OutputItem::Other { kind: self.kind },
            },
            "function_call" => match (self.call_id, self.name) {
                (Some(call_id), Some(name)) => OutputItem::FunctionCall {
                    id: self.id,
                    call_id,
                    name,
                    arguments: self.arguments.unwrap_or_else(|| "{}".to_string()),
                },
                _ => OutputItem::Other { kind: self.kind },
            },
            _ => OutputItem::Other { kind: self.kind },
        }
    }
}

/// Payload of `response.completed`, `response.incomplete` and `response.failed`.
#[derive(Debug, Clone, Deserialize)]
pub struct SseResponseEnvelope {
    pub response: ResponseSummary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseSummary {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub usage: Option<ApiUsage>,
    #[serde(default)]
    pub error: Option<ApiErrorDetail>,
}

/// Token accounting reported on completion.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ApiUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl From<ApiUsage> for TokenUsage {
    fn from(usage: ApiUsage) -> Self {
        TokenUsage {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        }
    }
}

/// Payload of the stream-level `error` event.
#[derive(Debug, Clone, Deserialize)]
pub struct SseError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

// --- Error responses ---

/// Non-success HTTP body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default, rename = "type")]
    pub type_: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

impl ApiErrorDetail {
    /// `code`, else `type`, else "error".
    pub fn label(&self) -> &str {
        self.code
            .as_deref()
            .or(self.type_.as_deref())
            .unwrap_or("error")
    }
}
