// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Context assembly: the bounded payload injected at session start.

use continuity_core::types::{Category, MemNode};
use continuity_core::RELATIONAL_URI;
use continuity_store::Store;
use tracing::debug;

/// High-signal items included beyond the relational profile. Keeps the
/// payload from becoming a wall of text.
const MAX_CONTEXT_ITEMS: usize = 15;

/// Leaves below this relevance are left out of the candidate pool.
const MIN_RELEVANCE: f64 = 0.3;

/// Recent sessions rendered at the bottom of the payload.
const MAX_RECENT_SESSIONS: usize = 5;

const POOL_CATEGORIES: [Category; 6] = [
    Category::Profile,
    Category::Preferences,
    Category::Patterns,
    Category::Events,
    Category::Cases,
    Category::Entities,
];

struct RankedItem {
    category: Category,
    l0: String,
    score: f64,
}

/// Context injection priority: relevance weighted by access frequency with
/// diminishing returns (log2). Never-accessed nodes keep a boost of 1.
fn node_score(node: &MemNode) -> f64 {
    let access_boost = 1.0 + (1.0 + node.access_count as f64).log2();
    node.relevance * access_boost
}

/// Assemble the `<context>` payload for session injection.
///
/// Degrades gracefully: a failing subsection is skipped and the wrapper is
/// always produced.
pub async fn build_context(store: &Store, current_session_id: Option<&str>) -> String {
    let mut out = String::from("<context>\n## Continuity — Session Memory\n");

    // Working With You: the relational profile narrative.
    match store.get_node_by_uri(RELATIONAL_URI).await {
        Ok(Some(profile)) if !profile.l1_overview.is_empty() => {
            out.push_str("\n### Working With You\n");
            out.push_str(&profile.l1_overview);
            out.push('\n');
        }
        Ok(_) => {}
        Err(e) => debug!(error = %e, "context: relational profile unavailable"),
    }

    // Candidate pool, ranked by signal strength, capped.
    let mut items: Vec<RankedItem> = Vec::new();
    for category in POOL_CATEGORIES {
        let nodes = match store.find_by_category(category).await {
            Ok(nodes) => nodes,
            Err(e) => {
                debug!(category = %category, error = %e, "context: category unavailable");
                continue;
            }
        };
        for node in nodes {
            if node.uri == RELATIONAL_URI {
                continue; // already shown above
            }
            if node.l0_abstract.is_empty() || node.relevance < MIN_RELEVANCE {
                continue;
            }
            items.push(RankedItem {
                category,
                l0: node.l0_abstract.clone(),
                score: node_score(&node),
            });
        }
    }

    items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    items.truncate(MAX_CONTEXT_ITEMS);

    let (profile_items, memory_items): (Vec<&RankedItem>, Vec<&RankedItem>) =
        items.iter().partition(|item| {
            matches!(item.category, Category::Profile | Category::Preferences)
        });

    if !profile_items.is_empty() {
        out.push_str("\n### Your Profile\n");
        for item in profile_items {
            out.push_str(&format!("- {}\n", item.l0));
        }
    }

    if !memory_items.is_empty() {
        out.push_str("\n### Recent Memories\n");
        for item in memory_items {
            out.push_str(&format!("- [{}] {}\n", item.category, item.l0));
        }
    }

    // Recent sessions, excluding the current one.
    match store.get_recent_sessions(MAX_RECENT_SESSIONS).await {
        Ok(sessions) if !sessions.is_empty() => {
            let mut rendered = String::new();
            for session in &sessions {
                if Some(session.session_id.as_str()) == current_session_id {
                    continue;
                }
                let timestamp = chrono::DateTime::from_timestamp_millis(session.started_at)
                    .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                let project = if session.project.is_empty() {
                    "unknown".to_string()
                } else {
                    std::path::Path::new(&session.project)
                        .file_name()
                        .map(|p| p.to_string_lossy().into_owned())
                        .unwrap_or_else(|| session.project.clone())
                };
                rendered.push_str(&format!(
                    "- [{timestamp}] {project}: {} ({} tools used)\n",
                    session.status.as_str(),
                    session.tool_count
                ));
            }
            if !rendered.is_empty() {
                out.push_str("\n### Recent Sessions\n");
                out.push_str(&rendered);
            }
        }
        Ok(_) => {}
        Err(e) => debug!(error = %e, "context: sessions unavailable"),
    }

    // Current session info.
    if let Some(session_id) = current_session_id {
        if let Ok(count) = store.get_session_observation_count(session_id).await {
            if count > 0 {
                out.push_str(&format!(
                    "\n### Current Session\n{count} tool uses recorded this session\n"
                ));
            }
        }
    }

    out.push_str("</context>");
    out
}
