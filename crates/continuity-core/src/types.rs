// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Continuity workspace.

use serde::{Deserialize, Serialize};

/// URI of the single relational profile node. Exempt from decay.
pub const RELATIONAL_URI: &str = "mem://user/profile/communication";

/// Prefix on every engine-originated LLM prompt so the hook adapter can
/// recognize internally-generated prompts and never treat them as signals.
/// The prompt builders and the adapter must agree on this exact string.
pub const INTERNAL_SENTINEL: &str = "[continuity-internal]";

/// Content size limits (approximate token to char conversion: 1 token ~ 4 chars).
pub const MAX_L0_CHARS: usize = 800; // ~200 tokens
pub const MAX_L1_CHARS: usize = 12_000; // ~3K tokens
pub const MAX_L2_CHARS: usize = 40_000; // ~10K tokens
pub const MIN_L1_CHARS: usize = 20;

/// Memory category. Determines the URI owner segment and merge discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Profile,
    Preferences,
    Entities,
    Events,
    Patterns,
    Cases,
    Session,
}

/// The categories the extractor may emit. `session` is reserved for
/// engine-internal summaries and is never a valid candidate category.
pub const EXTRACTABLE_CATEGORIES: [Category; 6] = [
    Category::Profile,
    Category::Preferences,
    Category::Entities,
    Category::Events,
    Category::Patterns,
    Category::Cases,
];

impl Category {
    /// String form used in URIs and SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Profile => "profile",
            Category::Preferences => "preferences",
            Category::Entities => "entities",
            Category::Events => "events",
            Category::Patterns => "patterns",
            Category::Cases => "cases",
            Category::Session => "session",
        }
    }

    /// Parse from the stored/URI string form.
    pub fn parse(s: &str) -> Option<Category> {
        match s {
            "profile" => Some(Category::Profile),
            "preferences" => Some(Category::Preferences),
            "entities" => Some(Category::Entities),
            "events" => Some(Category::Events),
            "patterns" => Some(Category::Patterns),
            "cases" => Some(Category::Cases),
            "session" => Some(Category::Session),
            _ => None,
        }
    }

    /// URI owner segment. Agent-derived knowledge lives under `agent`.
    pub fn owner(&self) -> &'static str {
        match self {
            Category::Patterns | Category::Cases => "agent",
            _ => "user",
        }
    }

    /// Mergeable categories are updated in place on upsert; the rest get a
    /// fresh URI per write.
    pub fn is_mergeable(&self) -> bool {
        matches!(
            self,
            Category::Profile | Category::Preferences | Category::Patterns
        )
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node type: only leaves carry content and embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Dir,
    Leaf,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Dir => "dir",
            NodeType::Leaf => "leaf",
        }
    }

    pub fn parse(s: &str) -> Option<NodeType> {
        match s {
            "dir" => Some(NodeType::Dir),
            "leaf" => Some(NodeType::Leaf),
            _ => None,
        }
    }
}

/// A node in the memory tree.
///
/// Leaves carry three content tiers: `l0_abstract` is the single-sentence
/// semantic key (the only embedded text), `l1_overview` is the context
/// injection content, `l2_content` is returned only on detail requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemNode {
    pub id: i64,
    /// Canonical `mem://{owner}/{category}/{slug}` path. Globally unique.
    pub uri: String,
    /// One segment shorter than `uri`; `None` only for top-level roots.
    pub parent_uri: Option<String>,
    pub node_type: NodeType,
    pub category: Category,
    pub l0_abstract: String,
    pub l1_overview: String,
    pub l2_content: String,
    /// Derived from category at write time.
    pub mergeable: bool,
    /// JSON array of source node ids folded into this one.
    pub merged_from: Option<String>,
    /// Decay-weighted score in [0.1, 1.0].
    pub relevance: f64,
    /// Epoch millis of the last retrieval that surfaced this node.
    pub last_access: Option<i64>,
    pub access_count: i64,
    /// Session that last produced or updated this node.
    pub source_session: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl MemNode {
    /// Build a leaf ready for upsert. Storage fields (id, timestamps,
    /// relevance) are assigned by the store.
    pub fn leaf(
        uri: impl Into<String>,
        category: Category,
        l0: impl Into<String>,
        l1: impl Into<String>,
        l2: impl Into<String>,
        source_session: impl Into<String>,
    ) -> Self {
        MemNode {
            id: 0,
            uri: uri.into(),
            parent_uri: None,
            node_type: NodeType::Leaf,
            category,
            l0_abstract: l0.into(),
            l1_overview: l1.into(),
            l2_content: l2.into(),
            mergeable: category.is_mergeable(),
            merged_from: None,
            relevance: 1.0,
            last_access: None,
            access_count: 0,
            source_session: Some(source_session.into()),
            created_at: 0,
            updated_at: 0,
        }
    }
}

/// An embedding stored for a leaf node. At most one per node; replacing it
/// replaces the whole tuple.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub node_id: i64,
    pub embedding: Vec<f64>,
    /// Tag of the embedder that produced this vector, so model migration
    /// is detectable.
    pub model: String,
    pub dimensions: usize,
    pub created_at: i64,
}

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<SessionStatus> {
        match s {
            "active" => Some(SessionStatus::Active),
            "completed" => Some(SessionStatus::Completed),
            "failed" => Some(SessionStatus::Failed),
            _ => None,
        }
    }
}

/// A coding-agent session tracked by the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub session_id: String,
    pub project: String,
    pub started_at: i64,
    pub ended_at: Option<i64>,
    pub status: SessionStatus,
    pub message_count: i64,
    pub tool_count: i64,
    /// Set once extraction has run; gates idempotent re-extraction.
    pub extracted_at: Option<i64>,
}

/// A single tool use captured during a session. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: i64,
    pub session_id: String,
    pub tool_name: String,
    pub tool_input: String,
    pub tool_response: String,
    pub created_at: i64,
}

/// Result of an LLM completion.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub provider: String,
    pub tokens_used: u32,
}
