// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session extraction: drives the LLM over a condensed transcript and
//! persists the resulting memory candidates.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use continuity_core::types::MemNode;
use continuity_core::{ContinuityError, Embedder, LlmClient, NodeType};
use continuity_llm::prompts;
use continuity_store::Store;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::embedder::cosine_similarity;
use crate::transcript;
use crate::validate::{validate_candidate, ValidCandidate};

/// Cosine similarity threshold for the extraction merge gate. Candidates
/// above this redirect into the matched node instead of creating a sibling.
pub const SIMILARITY_THRESHOLD: f64 = 0.65;

/// Hard cap on candidates per session, enforced even when the LLM returns
/// more.
const MAX_CANDIDATES: usize = 3;

/// Deadline on the extraction LLM call.
const EXTRACTION_DEADLINE: Duration = Duration::from_secs(120);

/// The JSON element shape the extraction LLM emits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryCandidate {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub uri_hint: String,
    #[serde(default)]
    pub l0: String,
    #[serde(default)]
    pub l1: String,
    #[serde(default)]
    pub l2: String,
    #[serde(default)]
    pub merge_target: String,
}

/// Extract a JSON array of candidates from an LLM response.
///
/// The response may be wrapped in markdown code fences or prose; the slice
/// between the first `[` and the last `]` is parsed.
pub fn parse_extraction_response(content: &str) -> Result<Vec<MemoryCandidate>, ContinuityError> {
    let mut content = content.trim();

    let stripped;
    if content.starts_with("```") {
        let lines: Vec<&str> = content.split('\n').collect();
        if lines.len() > 2 {
            stripped = lines[1..lines.len() - 1].join("\n");
            content = &stripped;
        }
    }
    let content = content.trim();

    let start = content.find('[');
    let end = content.rfind(']');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(ContinuityError::Validation(
            "no JSON array found in response".into(),
        ));
    };
    if end <= start {
        return Err(ContinuityError::Validation(
            "no JSON array found in response".into(),
        ));
    }

    serde_json::from_str(&content[start..=end])
        .map_err(|e| ContinuityError::Validation(format!("unmarshal candidates: {e}")))
}

/// Canonical URI for a validated candidate: the merge target when it names
/// an existing `mem://` path, the derived owner/category/slug path
/// otherwise.
pub(crate) fn canonical_uri(valid: &ValidCandidate) -> String {
    if valid.merge_target.starts_with("mem://") {
        return valid.merge_target.clone();
    }
    format!(
        "mem://{}/{}/{}",
        valid.category.owner(),
        valid.category.as_str(),
        valid.uri_hint
    )
}

/// Find an existing leaf in the candidate's category whose stored embedding
/// is cosine-similar to the given abstract. No side effects (no touch).
pub(crate) async fn find_similar_node(
    store: &Store,
    embedder: &dyn Embedder,
    l0: &str,
    category: continuity_core::Category,
    threshold: f64,
) -> Result<Option<(MemNode, f64)>, ContinuityError> {
    let candidate_vec = embedder.embed(l0).await?;

    let vectors = store.all_vectors().await?;
    if vectors.is_empty() {
        return Ok(None);
    }

    let node_ids: Vec<i64> = vectors.iter().map(|v| v.node_id).collect();
    let nodes = store.get_nodes_by_ids(&node_ids).await?;
    let node_map: HashMap<i64, MemNode> = nodes.into_iter().map(|n| (n.id, n)).collect();

    let mut best: Option<(MemNode, f64)> = None;
    for vector in &vectors {
        let Some(node) = node_map.get(&vector.node_id) else {
            continue;
        };
        if node.node_type != NodeType::Leaf || node.category != category {
            continue;
        }

        let sim = cosine_similarity(&candidate_vec, &vector.embedding);
        if sim >= threshold && best.as_ref().map_or(true, |(_, b)| sim > *b) {
            best = Some((node.clone(), sim));
        }
    }

    Ok(best)
}

/// Validate, resolve, upsert, and embed a single candidate. Shared by
/// session extraction and signal intake; the similarity gate is optional
/// because a user-flagged signal is its own authority.
pub(crate) async fn persist_candidate(
    store: &Store,
    embedder: Option<&Arc<dyn Embedder>>,
    candidate: &MemoryCandidate,
    session_id: &str,
    apply_similarity_gate: bool,
) -> Result<(), ContinuityError> {
    let valid = validate_candidate(candidate)?;
    let mut uri = canonical_uri(&valid);

    if apply_similarity_gate {
        if let Some(embedder) = embedder {
            match find_similar_node(
                store,
                embedder.as_ref(),
                &valid.l0,
                valid.category,
                SIMILARITY_THRESHOLD,
            )
            .await
            {
                Ok(Some((existing, sim))) => {
                    info!(
                        from = uri.as_str(),
                        into = existing.uri.as_str(),
                        similarity = sim,
                        "similarity gate: merging into existing node"
                    );
                    uri = existing.uri;
                }
                Ok(None) => {}
                // Errors here never block the upsert.
                Err(e) => warn!(error = %e, "similarity check failed"),
            }
        }
    }

    let node = MemNode::leaf(uri, valid.category, valid.l0, valid.l1, valid.l2, session_id);
    let stored = store.upsert_node(node).await?;
    info!(uri = stored.uri.as_str(), category = %stored.category, "stored memory");

    if let Some(embedder) = embedder {
        if !stored.l0_abstract.is_empty() {
            match embedder.embed(&stored.l0_abstract).await {
                Ok(vec) => {
                    store
                        .save_vector(stored.id, &vec, &embedder.model())
                        .await?;
                }
                Err(e) => warn!(uri = stored.uri.as_str(), error = %e, "embed failed"),
            }
        }
    }

    Ok(())
}

/// Parse and condense the transcript, call the LLM, and persist candidates.
///
/// Guards, in order: fewer than 3 user messages, condensed shorter than
/// 100 chars, LLM response shorter than 20 chars, empty candidate list.
/// Each makes the whole call a no-op.
pub(crate) async fn extract_memories(
    store: &Store,
    llm: &dyn LlmClient,
    embedder: Option<&Arc<dyn Embedder>>,
    session_id: &str,
    transcript_path: &str,
) -> Result<(), ContinuityError> {
    let content = tokio::fs::read_to_string(transcript_path)
        .await
        .map_err(|e| ContinuityError::Internal(format!("open transcript: {e}")))?;
    let entries = transcript::parse_lines(&content);

    if transcript::count_user_messages(&entries) < 3 {
        debug!(session_id, "extraction skipped: fewer than 3 user messages");
        return Ok(());
    }

    let condensed = transcript::condense(&entries);
    if condensed.len() < 100 {
        debug!(
            session_id,
            chars = condensed.len(),
            "extraction skipped: condensed too short"
        );
        return Ok(());
    }

    let prompt = prompts::extraction_prompt(&condensed);
    let completion = tokio::time::timeout(EXTRACTION_DEADLINE, llm.complete(&prompt))
        .await
        .map_err(|_| ContinuityError::Timeout {
            duration: EXTRACTION_DEADLINE,
        })??;

    if completion.content.len() < 20 {
        debug!(
            session_id,
            chars = completion.content.len(),
            "extraction skipped: LLM response too short"
        );
        return Ok(());
    }

    let mut candidates = parse_extraction_response(&completion.content)?;
    if candidates.is_empty() {
        return Ok(());
    }
    if candidates.len() > MAX_CANDIDATES {
        info!(
            session_id,
            returned = candidates.len(),
            "capping candidates to {MAX_CANDIDATES}"
        );
        candidates.truncate(MAX_CANDIDATES);
    }

    for candidate in &candidates {
        if let Err(e) = persist_candidate(store, embedder, candidate, session_id, true).await {
            warn!(uri_hint = candidate.uri_hint.as_str(), error = %e, "rejecting candidate");
        }
    }

    Ok(())
}
