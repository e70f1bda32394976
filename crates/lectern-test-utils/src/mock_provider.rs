// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock completion provider for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` from a FIFO of scripted
//! [`MockRound`]s, one per completion request, and keeps every request it
//! was sent so tests can assert on transcripts and instructions.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use tokio::sync::Mutex;

use lectern_core::traits::adapter::PluginAdapter;
use lectern_core::traits::provider::{ProviderAdapter, ProviderStream};
use lectern_core::types::{
    AdapterType, HealthStatus, OutputItem, ProviderRequest, ProviderStreamChunk, TokenUsage,
};
use lectern_core::LecternError;

#[derive(Debug, Clone)]
enum Step {
    Delta { item_id: String, text: String },
    Item(OutputItem),
    Fail(String),
}

/// The script for one completion request.
#[derive(Debug, Clone)]
pub struct MockRound {
    steps: Vec<Step>,
    usage: TokenUsage,
    refuse: Option<String>,
}

impl MockRound {
    /// An empty round that completes with 10 input and 20 output tokens.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 20,
            },
            refuse: None,
        }
    }

    /// A round producing one assistant message.
    pub fn text(id: &str, text: &str) -> Self {
        Self::new().message(id, text)
    }

    /// A round producing one function call.
    pub fn tool_call(call_id: &str, name: &str, arguments: &str) -> Self {
        Self::new().call(call_id, name, arguments)
    }

    /// A round whose request is rejected before any stream opens.
    pub fn refused(message: &str) -> Self {
        Self {
            refuse: Some(message.to_string()),
            ..Self::new()
        }
    }

    /// Streams `text` word by word, then completes the message item.
    pub fn message(mut self, id: &str, text: &str) -> Self {
        for piece in text.split_inclusive(' ') {
            self.steps.push(Step::Delta {
                item_id: id.to_string(),
                text: piece.to_string(),
            });
        }
        self.steps.push(Step::Item(OutputItem::Message {
            id: id.to_string(),
            text: text.to_string(),
        }));
        self
    }

    pub fn call(mut self, call_id: &str, name: &str, arguments: &str) -> Self {
        self.steps.push(Step::Item(OutputItem::FunctionCall {
            id: Some(format!("fc_{call_id}")),
            call_id: call_id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }));
        self
    }

    /// An item kind the orchestrator ignores.
    pub fn reasoning(mut self) -> Self {
        self.steps.push(Step::Item(OutputItem::Other {
            kind: "reasoning".to_string(),
        }));
        self
    }

    /// Ends the stream with an error after the steps so far.
    pub fn fail(mut self, message: &str) -> Self {
        self.steps.push(Step::Fail(message.to_string()));
        self
    }

    pub fn usage(mut self, input_tokens: u32, output_tokens: u32) -> Self {
        self.usage = TokenUsage {
            input_tokens,
            output_tokens,
        };
        self
    }
}

impl Default for MockRound {
    fn default() -> Self {
        Self::new()
    }
}

/// A mock provider that replays scripted rounds.
///
/// When the queue is empty a single "mock response" message is returned.
pub struct MockProvider {
    rounds: Arc<Mutex<VecDeque<MockRound>>>,
    requests: Arc<Mutex<Vec<ProviderRequest>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_rounds(Vec::new())
    }

    pub fn with_rounds(rounds: Vec<MockRound>) -> Self {
        Self {
            rounds: Arc::new(Mutex::new(VecDeque::from(rounds))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn push_round(&self, round: MockRound) {
        self.rounds.lock().await.push_back(round);
    }

    /// Every request received, oldest first.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    async fn next_round(&self) -> MockRound {
        self.rounds
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| MockRound::text("msg_mock_default", "mock response"))
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, LecternError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LecternError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, LecternError> {
        self.requests.lock().await.push(request);
        let round = self.next_round().await;
        if let Some(message) = round.refuse {
            return Err(LecternError::provider(message));
        }

        let mut chunks = Vec::with_capacity(round.steps.len() + 1);
        let mut failed = false;
        for step in round.steps {
            match step {
                Step::Delta { item_id, text } => {
                    chunks.push(Ok(ProviderStreamChunk::delta(item_id, text)));
                }
                Step::Item(item) => chunks.push(Ok(ProviderStreamChunk::item_done(item))),
                Step::Fail(message) => {
                    chunks.push(Err(LecternError::provider(message)));
                    failed = true;
                    break;
                }
            }
        }
        if !failed {
            chunks.push(Ok(ProviderStreamChunk::completed(Some(round.usage))));
        }
        Ok(Box::pin(stream::iter(chunks)))
    }
}
