// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drives one user turn against the completion service.
//!
//! A turn moves through `Idle -> Streaming -> (ToolPending -> Streaming)* ->
//! Completed | Failed`. Tool rounds run in a plain loop bounded by
//! `max_tool_rounds`; every function call the model makes gets exactly one
//! tool output in the transcript, including calls that fail.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use lectern_config::model::LecternConfig;
use lectern_core::types::{
    OutputItem, ProviderRequest, StreamEventType, TokenUsage, TurnItem,
};
use lectern_core::{
    CatalogAdapter, ChatEvent, ConversationListener, Focus, LecternError, ProviderAdapter,
};
use lectern_tools::{ToolContext, ToolOutput, ToolRegistry};
use strum::Display;
use tracing::{debug, info, warn};

use crate::prompt::build_instructions;
use crate::transcript::{Transcript, is_valid_assistant_id, synthesize_assistant_id};

/// States of one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TurnState {
    /// Waiting for the next user message.
    Idle,
    /// A completion request is in flight.
    Streaming,
    /// Executing the function calls of the last round.
    ToolPending,
    /// The last round produced no function calls.
    Completed,
    /// The provider failed or the round cap was hit.
    Failed,
}

/// Static settings for every orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub model: String,
    pub max_output_tokens: Option<u32>,
    /// Completion rounds allowed per turn; 0 means no cap.
    pub max_tool_rounds: u32,
    /// Replaces the built-in instruction text.
    pub instructions: Option<String>,
}

impl OrchestratorConfig {
    pub fn from_config(config: &LecternConfig) -> Self {
        Self {
            model: config.provider.model.clone(),
            max_output_tokens: Some(config.provider.max_output_tokens),
            max_tool_rounds: config.agent.max_tool_rounds,
            instructions: config.agent.system_prompt.clone(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_config(&LecternConfig::default())
    }
}

/// The external capabilities a conversation calls out to.
#[derive(Clone)]
pub struct Capabilities {
    pub provider: Arc<dyn ProviderAdapter + Send + Sync>,
    pub catalog: Arc<dyn CatalogAdapter + Send + Sync>,
    pub tools: Arc<ToolRegistry>,
}

/// Summary of a completed turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnOutcome {
    pub usage: TokenUsage,
    pub rounds: u32,
    pub tool_calls: u32,
    pub failed_tool_calls: u32,
}

struct PendingCall {
    call_id: String,
    name: String,
    arguments: String,
}

pub struct ConversationOrchestrator {
    caps: Capabilities,
    config: OrchestratorConfig,
    api_key: String,
    listener: Arc<dyn ConversationListener>,
    transcript: Transcript,
    focus: Focus,
    state: TurnState,
    turn_usage: TokenUsage,
    total_usage: TokenUsage,
}

impl ConversationOrchestrator {
    /// `api_key` is the caller's catalog key; tools reach the catalog as
    /// that user.
    pub fn new(
        caps: Capabilities,
        config: OrchestratorConfig,
        api_key: impl Into<String>,
        listener: Arc<dyn ConversationListener>,
    ) -> Self {
        Self {
            caps,
            config,
            api_key: api_key.into(),
            listener,
            transcript: Transcript::new(),
            focus: Focus::default(),
            state: TurnState::Idle,
            turn_usage: TokenUsage::default(),
            total_usage: TokenUsage::default(),
        }
    }

    /// Starts from an existing transcript, e.g. one rebuilt from history.
    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = transcript;
        self
    }

    pub fn with_focus(mut self, focus: Focus) -> Self {
        self.focus = focus;
        self
    }

    /// Changes the focus for future requests. The transcript is untouched.
    pub fn set_focus(&mut self, entry_id: Option<String>, catalog_id: Option<String>) {
        self.focus = Focus::new(entry_id, catalog_id);
    }

    pub fn focus(&self) -> &Focus {
        &self.focus
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Tokens of the most recent turn, including a failed one.
    pub fn last_turn_usage(&self) -> TokenUsage {
        self.turn_usage
    }

    /// Tokens since this orchestrator was built.
    pub fn total_usage(&self) -> TokenUsage {
        self.total_usage
    }

    /// Runs one user turn to completion.
    ///
    /// On failure a terminal `error` event has already been emitted and
    /// whatever the failed round produced stays in the transcript.
    pub async fn chat(&mut self, text: &str) -> Result<TurnOutcome, LecternError> {
        self.state = TurnState::Idle;
        self.turn_usage = TokenUsage::default();
        self.transcript.push_user(text);

        let mut outcome = TurnOutcome::default();
        loop {
            let cap = self.config.max_tool_rounds;
            if cap > 0 && outcome.rounds >= cap {
                return Err(self.fail(LecternError::RoundLimit { rounds: cap }));
            }
            outcome.rounds += 1;

            self.state = TurnState::Streaming;
            let calls = match self.stream_round().await {
                Ok(calls) => calls,
                Err(e) => return Err(self.fail(e)),
            };
            outcome.usage = self.turn_usage;

            if calls.is_empty() {
                self.state = TurnState::Completed;
                self.listener.on_event(ChatEvent::done(self.turn_usage));
                info!(
                    rounds = outcome.rounds,
                    tool_calls = outcome.tool_calls,
                    input_tokens = outcome.usage.input_tokens,
                    output_tokens = outcome.usage.output_tokens,
                    "turn complete"
                );
                return Ok(outcome);
            }

            self.state = TurnState::ToolPending;
            for call in calls {
                outcome.tool_calls += 1;
                if self.run_tool(call).await.is_error {
                    outcome.failed_tool_calls += 1;
                }
            }
        }
    }

    async fn stream_round(&mut self) -> Result<Vec<PendingCall>, LecternError> {
        let request = ProviderRequest {
            model: self.config.model.clone(),
            instructions: build_instructions(self.config.instructions.as_deref(), &self.focus),
            input: self.transcript.items().to_vec(),
            tools: self.caps.tools.tool_definitions(),
            max_output_tokens: self.config.max_output_tokens,
        };
        let mut stream = self.caps.provider.stream(request).await?;

        let mut items = Vec::new();
        let mut failure = None;
        let mut aliases = HashMap::new();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            };
            match chunk.event_type {
                StreamEventType::OutputTextDelta => {
                    if let (Some(item_id), Some(text)) = (chunk.item_id, chunk.text) {
                        let item_id = assistant_id(&mut aliases, item_id);
                        self.listener.on_event(ChatEvent::chunk(item_id, text));
                    }
                }
                StreamEventType::OutputItemDone => {
                    if let Some(item) = chunk.item {
                        items.push(item);
                    }
                }
                StreamEventType::Completed => {
                    if let Some(usage) = chunk.usage {
                        self.add_usage(usage);
                    }
                    break;
                }
                StreamEventType::Error => {
                    let message = chunk
                        .error
                        .unwrap_or_else(|| "completion stream failed".to_string());
                    failure = Some(LecternError::provider(message));
                    break;
                }
            }
        }

        let mut calls = Vec::new();
        for item in items {
            match item {
                OutputItem::Message { id, text } => {
                    let id = assistant_id(&mut aliases, id);
                    self.listener.on_event(ChatEvent::message(id.clone(), text.clone()));
                    self.transcript.push_assistant(id, text);
                }
                // Calls from a failed round would never get outputs.
                OutputItem::FunctionCall { call_id, name, .. } if failure.is_some() => {
                    debug!(%call_id, %name, "dropping call from failed round");
                }
                OutputItem::FunctionCall {
                    call_id,
                    name,
                    arguments,
                    ..
                } => {
                    self.transcript.push(TurnItem::ToolCall {
                        call_id: call_id.clone(),
                        name: name.clone(),
                        arguments: arguments.clone(),
                    });
                    calls.push(PendingCall {
                        call_id,
                        name,
                        arguments,
                    });
                }
                OutputItem::Other { kind } => {
                    debug!(%kind, "ignoring output item");
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(calls),
        }
    }

    async fn run_tool(&mut self, call: PendingCall) -> ToolOutput {
        let ctx = ToolContext {
            api_key: &self.api_key,
            catalog: self.caps.catalog.as_ref(),
            listener: self.listener.as_ref(),
            focus: &self.focus,
        };
        let output = match self.caps.tools.invoke(&call.name, &call.arguments, &ctx).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.call_id, error = %e, "tool call failed");
                ToolOutput::failure(&e.to_string())
            }
        };
        self.transcript.push(TurnItem::ToolOutput {
            call_id: call.call_id,
            output: output.content.clone(),
        });
        output
    }

    fn add_usage(&mut self, usage: TokenUsage) {
        self.turn_usage.input_tokens += usage.input_tokens;
        self.turn_usage.output_tokens += usage.output_tokens;
        self.total_usage.input_tokens += usage.input_tokens;
        self.total_usage.output_tokens += usage.output_tokens;
    }

    fn fail(&mut self, err: LecternError) -> LecternError {
        self.state = TurnState::Failed;
        warn!(error = %err, "turn failed");
        self.listener.on_event(ChatEvent::error(err.to_string()));
        err
    }
}

/// Maps a provider item id to the id clients and the transcript see. An
/// unusable id gets one substitute per round, shared by its chunks and its
/// final message.
fn assistant_id(aliases: &mut HashMap<String, String>, provider_id: String) -> String {
    if is_valid_assistant_id(&provider_id) {
        return provider_id;
    }
    aliases
        .entry(provider_id)
        .or_insert_with_key(|provider_id| {
            debug!(%provider_id, "replacing unusable assistant id");
            synthesize_assistant_id()
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_id_is_stable_within_a_round() {
        let mut aliases = HashMap::new();
        let first = assistant_id(&mut aliases, "resp-1".to_string());
        assert!(first.starts_with("msg_"));
        assert_eq!(assistant_id(&mut aliases, "resp-1".to_string()), first);
        assert_ne!(assistant_id(&mut aliases, "resp-2".to_string()), first);
        assert_eq!(assistant_id(&mut aliases, "msg_ok".to_string()), "msg_ok");
    }

    #[test]
    fn turn_state_display() {
        assert_eq!(TurnState::Idle.to_string(), "idle");
        assert_eq!(TurnState::ToolPending.to_string(), "tool_pending");
        assert_eq!(TurnState::Failed.to_string(), "failed");
    }

    #[test]
    fn config_defaults_follow_lectern_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_tool_rounds, 10);
        assert!(config.instructions.is_none());
        assert!(config.max_output_tokens.is_some());
    }
}
