// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relational profiling: a merged "how you work with me" profile kept at a
//! single reserved URI.

use std::time::Duration;

use continuity_core::types::{Category, MemNode};
use continuity_core::{ContinuityError, LlmClient, RELATIONAL_URI};
use continuity_llm::prompts;
use continuity_store::Store;
use tracing::{debug, info};

use crate::transcript;

/// Fixed abstract for the relational node; the narrative lives in L1/L2.
const RELATIONAL_L0: &str =
    "Relational profile: communication style, feedback patterns, working dynamic";

/// Deadline on the relational LLM call.
const RELATIONAL_DEADLINE: Duration = Duration::from_secs(120);

/// Update the relational profile from a session transcript.
///
/// Skips when the transcript is too thin, when this session already
/// produced the current profile, or when the LLM answers `NO_UPDATE`.
pub(crate) async fn extract_relational(
    store: &Store,
    llm: &dyn LlmClient,
    session_id: &str,
    transcript_path: &str,
) -> Result<(), ContinuityError> {
    let content = tokio::fs::read_to_string(transcript_path)
        .await
        .map_err(|e| ContinuityError::Internal(format!("open transcript: {e}")))?;
    let entries = transcript::parse_lines(&content);

    if transcript::count_user_messages(&entries) < 3 {
        return Ok(());
    }

    let condensed = transcript::condense(&entries);
    if condensed.len() < 100 {
        return Ok(());
    }

    let mut existing = String::new();
    if let Some(node) = store.get_node_by_uri(RELATIONAL_URI).await? {
        if node.source_session.as_deref() == Some(session_id) {
            debug!(session_id, "relational: session already processed");
            return Ok(());
        }
        existing = node.l1_overview;
    }

    let prompt = prompts::relational_prompt(&existing, &condensed);
    let completion = tokio::time::timeout(RELATIONAL_DEADLINE, llm.complete(&prompt))
        .await
        .map_err(|_| ContinuityError::Timeout {
            duration: RELATIONAL_DEADLINE,
        })??;

    let response = completion.content.trim();
    if response == "NO_UPDATE" || response.len() < 20 {
        debug!(session_id, "relational: no update");
        return Ok(());
    }

    let node = MemNode::leaf(
        RELATIONAL_URI,
        Category::Profile,
        RELATIONAL_L0,
        response,
        response,
        session_id,
    );
    store.upsert_node(node).await?;
    info!(session_id, "relational: profile updated");
    Ok(())
}
