// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test double for the [`LlmClient`] contract.
//!
//! Records every prompt it receives and replays queued responses; also
//! usable for dry-run mode.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use continuity_core::{Completion, ContinuityError, LlmClient};

/// A prompt-recording mock client.
///
/// Queued responses are returned in order; once the queue is drained the
/// default response is repeated.
pub struct MockClient {
    responses: Mutex<VecDeque<String>>,
    default_response: String,
    fail_with: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl MockClient {
    /// A mock that answers every prompt with the same content.
    pub fn new(response: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            default_response: response.to_string(),
            fail_with: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A mock that replays the given responses in order, then falls back
    /// to the last one.
    pub fn with_responses(responses: Vec<String>) -> Self {
        let default_response = responses.last().cloned().unwrap_or_default();
        Self {
            responses: Mutex::new(responses.into()),
            default_response,
            fail_with: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A mock whose every completion fails with the given message.
    pub fn failing(message: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            default_response: String::new(),
            fail_with: Some(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("mock calls lock").clone()
    }

    /// Number of completions requested so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock calls lock").len()
    }
}

#[async_trait]
impl LlmClient for MockClient {
    async fn complete(&self, prompt: &str) -> Result<Completion, ContinuityError> {
        self.calls
            .lock()
            .expect("mock calls lock")
            .push(prompt.to_string());

        if let Some(message) = &self.fail_with {
            return Err(ContinuityError::provider(message.clone()));
        }

        let content = self
            .responses
            .lock()
            .expect("mock responses lock")
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone());

        Ok(Completion {
            content,
            provider: "mock".to_string(),
            tokens_used: 0,
        })
    }
}
