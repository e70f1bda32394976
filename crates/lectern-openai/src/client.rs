// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Responses API.
//!
//! [`ResponsesClient`] owns the authenticated reqwest client, posts streaming
//! requests and retries once on transient statuses.

use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use lectern_core::LecternError;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::sse::{self, StreamEvent};
use crate::types::{ApiErrorResponse, ResponsesRequest};

/// Boxed stream of parsed SSE events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LecternError>> + Send>>;

/// Authenticated client for `POST {base_url}/responses`.
#[derive(Debug, Clone)]
pub struct ResponsesClient {
    client: reqwest::Client,
    endpoint: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl ResponsesClient {
    /// Builds a client with the bearer key baked into default headers.
    pub fn new(api_key: &str, base_url: &str) -> Result<Self, LecternError> {
        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| LecternError::Config(format!("invalid API key header value: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LecternError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/responses", base_url.trim_end_matches('/')),
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Shortens the retry delay (tests).
    #[cfg(test)]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends a streaming request and returns the parsed event stream.
    ///
    /// On 429/500/502/503 the request is retried once after a short delay.
    pub async fn stream_response(
        &self,
        request: &ResponsesRequest,
    ) -> Result<EventStream, LecternError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying streaming request after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = self
                .client
                .post(&self.endpoint)
                .json(request)
                .send()
                .await
                .map_err(|e| LecternError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, "streaming response received");

            if status.is_success() {
                return Ok(sse::parse_sse_stream(response));
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(LecternError::provider(format!(
                    "API returned {status}: {body}"
                )));
                continue;
            }

            return Err(LecternError::provider(describe_failure(status, &body)));
        }

        Err(last_error
            .unwrap_or_else(|| LecternError::provider("streaming request failed after retries")))
    }
}

fn describe_failure(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) => format!(
            "Responses API error ({}): {}",
            api_err.error.label(),
            api_err.error.message
        ),
        Err(_) => format!("API returned {status}: {body}"),
    }
}

/// Statuses worth one more attempt.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}
