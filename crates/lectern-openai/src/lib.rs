// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming LLM provider adapter for Lectern.
//!
//! Talks to a Responses-style completion endpoint: the whole transcript and
//! the tool declarations go up in one request, and text deltas, finished
//! output items and completion usage come back over SSE.

pub mod client;
pub mod sse;
pub mod types;

use async_trait::async_trait;
use futures::StreamExt;
use lectern_config::model::ProviderConfig;
use lectern_core::types::{ProviderRequest, ProviderStreamChunk, TokenUsage};
use lectern_core::{
    AdapterType, HealthStatus, LecternError, PluginAdapter, ProviderAdapter, ProviderStream,
};
use tracing::{debug, info, warn};

use crate::client::ResponsesClient;
use crate::sse::StreamEvent;
use crate::types::{FunctionTool, InputItem, ResponsesRequest};

/// Responses API provider implementing [`ProviderAdapter`].
///
/// API key resolution order: config -> `OPENAI_API_KEY` env var -> error.
pub struct OpenAiProvider {
    client: ResponsesClient,
    default_model: String,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, LecternError> {
        let api_key = resolve_api_key(&config.api_key)?;
        let client = ResponsesClient::new(&api_key, &config.base_url)?;

        info!(
            model = %config.model,
            endpoint = %client.endpoint(),
            "responses provider initialized"
        );

        Ok(Self {
            client,
            default_model: config.model.clone(),
        })
    }

    fn to_responses_request(&self, request: &ProviderRequest) -> ResponsesRequest {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };
        ResponsesRequest {
            model,
            instructions: request.instructions.clone(),
            input: request.input.iter().map(InputItem::from).collect(),
            tools: request.tools.iter().map(FunctionTool::from).collect(),
            max_output_tokens: request.max_output_tokens,
            stream: true,
            store: false,
        }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
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
impl ProviderAdapter for OpenAiProvider {
    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, LecternError> {
        let api_request = self.to_responses_request(&request);
        debug!(
            model = %api_request.model,
            input_items = api_request.input.len(),
            tools = api_request.tools.len(),
            "sending completion request"
        );
        let events = self.client.stream_response(&api_request).await?;

        let chunks = events.filter_map(|result| async move {
            match result {
                Ok(event) => map_stream_event(event).map(Ok),
                Err(e) => Some(Err(e)),
            }
        });

        Ok(Box::pin(chunks))
    }
}

/// Maps a parsed SSE event to a provider-neutral chunk.
fn map_stream_event(event: StreamEvent) -> Option<ProviderStreamChunk> {
    match event {
        StreamEvent::TextDelta(delta) => {
            Some(ProviderStreamChunk::delta(delta.item_id, delta.delta))
        }
        StreamEvent::ItemDone(done) => Some(ProviderStreamChunk::item_done(
            done.item.into_output_item(),
        )),
        StreamEvent::Completed(envelope) => Some(ProviderStreamChunk::completed(
            envelope.response.usage.map(TokenUsage::from),
        )),
        StreamEvent::Incomplete(envelope) => {
            warn!(
                response_id = envelope.response.id.as_deref().unwrap_or("-"),
                status = envelope.response.status.as_deref().unwrap_or("incomplete"),
                "response ended incomplete, keeping partial output"
            );
            Some(ProviderStreamChunk::completed(
                envelope.response.usage.map(TokenUsage::from),
            ))
        }
        StreamEvent::Failed(envelope) => {
            let message = match envelope.response.error {
                Some(detail) => format!("{}: {}", detail.label(), detail.message),
                None => "response failed".to_string(),
            };
            Some(ProviderStreamChunk::error(message))
        }
        StreamEvent::Error(err) => Some(ProviderStreamChunk::error(format!(
            "{}: {}",
            err.code.as_deref().unwrap_or("error"),
            err.message
        ))),
    }
}

/// Resolves the API key from config or environment.
fn resolve_api_key(config_key: &Option<String>) -> Result<String, LecternError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    std::env::var("OPENAI_API_KEY").map_err(|_| {
        LecternError::Config(
            "provider API key not found. Set provider.api_key in config or OPENAI_API_KEY environment variable.".into(),
        )
    })
}
