// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Continuity memory engine.
//!
//! Converts session transcripts and flagged signals into a tiered memory
//! tree, keeps it healthy (decay, dedup, embedding backfill), and serves
//! retrieval and context assembly over it.
//!
//! ## Components
//!
//! - [`transcript`]: JSONL parsing and condensation for LLM input
//! - [`embedder`]: Ollama embedding client and the TF-IDF fallback
//! - [`extractor`]: LLM-driven session extraction with the similarity gate
//! - [`relational`]: the merged "how you work with me" profile
//! - [`search`]: `find` (vector) and `search` (LLM intent decomposition)
//! - [`context`]: the session-start injection payload
//! - [`dedup`]: offline near-duplicate collapse
//! - [`engine`]: the facade owning background-task lifecycle

pub mod context;
pub mod dedup;
pub mod embedder;
pub mod engine;
pub mod extractor;
pub mod relational;
pub mod search;
pub mod transcript;
pub mod validate;

pub use context::build_context;
pub use dedup::DEDUP_THRESHOLD;
pub use embedder::{cosine_similarity, probe_ollama, OllamaEmbedder, TfidfEmbedder};
pub use engine::{Engine, BACKFILL_DEADLINE};
pub use extractor::{parse_extraction_response, MemoryCandidate, SIMILARITY_THRESHOLD};
pub use search::{find, search, SearchOpts, SearchResult};
