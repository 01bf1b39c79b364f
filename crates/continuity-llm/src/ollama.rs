// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM client for a local Ollama instance.

use std::time::Duration;

use async_trait::async_trait;
use continuity_core::{Completion, ContinuityError, LlmClient};
use serde::Deserialize;

/// Completion via Ollama's generate endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaClient {
    pub fn new(url: &str, model: &str) -> Result<Self, ContinuityError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ContinuityError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<Completion, ContinuityError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {"temperature": 0.3, "num_predict": 2048},
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ContinuityError::Provider {
                message: format!("ollama api: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| ContinuityError::Provider {
            message: format!("read ollama response: {e}"),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            return Err(ContinuityError::provider(format!(
                "ollama api status {status}: {text}"
            )));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| ContinuityError::Provider {
                message: format!("decode ollama response: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Completion {
            content: parsed.response,
            provider: "ollama".to_string(),
            tokens_used: 0,
        })
    }
}
