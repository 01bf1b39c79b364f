// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Completion contract for LLM providers.

use async_trait::async_trait;

use crate::error::ContinuityError;
use crate::types::Completion;

/// A single-shot completion provider.
///
/// The engine drives every LLM interaction through this one method;
/// providers handle transport, authentication, and deadlines internally.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends a prompt and returns the full completion.
    async fn complete(&self, prompt: &str) -> Result<Completion, ContinuityError>;
}
