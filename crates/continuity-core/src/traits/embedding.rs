// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding contract for semantic retrieval.

use async_trait::async_trait;

use crate::error::ContinuityError;

/// Produces an L2-normalized real-valued vector from text.
///
/// Implementations expose a model tag (recorded next to every stored
/// vector, so a model change is detectable) and a dimension count.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text string.
    async fn embed(&self, text: &str) -> Result<Vec<f64>, ContinuityError>;

    /// Tag of the underlying model, e.g. `"ollama:nomic-embed-text"`.
    fn model(&self) -> String;

    /// Vector length this embedder produces.
    fn dimensions(&self) -> usize;
}
