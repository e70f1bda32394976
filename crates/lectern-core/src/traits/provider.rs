// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for streaming LLM completion services.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::LecternError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ProviderRequest, ProviderStreamChunk};

/// Boxed stream of provider chunks.
pub type ProviderStream =
    Pin<Box<dyn Stream<Item = Result<ProviderStreamChunk, LecternError>> + Send>>;

/// Adapter for LLM provider integrations.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends a completion request and returns a stream of response chunks.
    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, LecternError>;
}
