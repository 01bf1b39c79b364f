// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Continuity memory service.
//!
//! This crate provides the error type, domain types, URI helpers, and the
//! adapter traits (LLM completion, embedding) shared by every crate in the
//! workspace.

pub mod error;
pub mod traits;
pub mod types;
pub mod uri;

pub use error::ContinuityError;
pub use traits::{Embedder, LlmClient};
pub use types::{
    Category, Completion, MemNode, NodeType, Observation, Session, SessionStatus, VectorRecord,
    INTERNAL_SENTINEL, RELATIONAL_URI,
};
