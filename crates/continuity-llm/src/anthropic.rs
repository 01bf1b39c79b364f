// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Anthropic Messages API.

use std::time::Duration;

use async_trait::async_trait;
use continuity_core::{Completion, ContinuityError, LlmClient};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::debug;

/// Base URL for the Anthropic Messages API.
const API_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

const API_VERSION: &str = "2023-06-01";

/// Completion client for the Anthropic Messages API.
///
/// Holds a pooled HTTP client with the auth headers baked in and a fixed
/// request timeout.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    model: String,
    base_url: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl AnthropicClient {
    /// Creates a new client for the given API key and model tag.
    pub fn new(api_key: &str, model: &str) -> Result<Self, ContinuityError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| ContinuityError::Config(format!("invalid API key header: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ContinuityError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            model: model.to_string(),
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<Completion, ContinuityError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 2048,
            "temperature": 0.3,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .client
            .post(&self.base_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ContinuityError::Provider {
                message: format!("anthropic api: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, "anthropic completion response");

        let text = response.text().await.map_err(|e| ContinuityError::Provider {
            message: format!("read anthropic response: {e}"),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            return Err(ContinuityError::provider(format!(
                "anthropic api status {status}: {text}"
            )));
        }

        let parsed: MessagesResponse =
            serde_json::from_str(&text).map_err(|e| ContinuityError::Provider {
                message: format!("decode anthropic response: {e}"),
                source: Some(Box::new(e)),
            })?;

        let content = parsed
            .content
            .first()
            .map(|block| block.text.clone())
            .unwrap_or_default();

        Ok(Completion {
            content,
            provider: "anthropic".to_string(),
            tokens_used: parsed.usage.input_tokens + parsed.usage.output_tokens,
        })
    }
}
