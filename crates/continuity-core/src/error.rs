// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Continuity memory service.

use thiserror::Error;

/// The primary error type used across all Continuity crates.
#[derive(Debug, Error)]
pub enum ContinuityError {
    /// Configuration errors (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, codec).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// LLM provider errors (API failure, subprocess failure, bad response).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Embedding errors (service unreachable, bad vector).
    #[error("embedding error: {message}")]
    Embedding {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A memory candidate or request failed validation at the boundary.
    #[error("validation error: {0}")]
    Validation(String),

    /// A required collaborator (LLM, embedder) is not configured.
    #[error("{0} not configured")]
    Unavailable(String),

    /// Operation exceeded its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors. Store integrity failures land here.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ContinuityError {
    /// Shorthand for a provider error without an underlying cause.
    pub fn provider(message: impl Into<String>) -> Self {
        ContinuityError::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for an embedding error without an underlying cause.
    pub fn embedding(message: impl Into<String>) -> Self {
        ContinuityError::Embedding {
            message: message.into(),
            source: None,
        }
    }
}
