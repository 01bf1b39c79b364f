// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The engine facade: wires the store, LLM, and embedder together and owns
//! the background-task lifecycle (decay timer, embedding backfill).

use std::sync::Arc;
use std::time::Duration;

use continuity_core::types::MemNode;
use continuity_core::{ContinuityError, Embedder, LlmClient};
use continuity_store::Store;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::extractor;
use crate::relational;

/// Interval between decay passes after the startup run.
const DECAY_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Deadline for the startup embedding backfill.
pub const BACKFILL_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// Orchestrates memory extraction, relational profiling, retrieval
/// support, and decay.
pub struct Engine {
    store: Store,
    llm: Option<Arc<dyn LlmClient>>,
    embedder: Option<Arc<dyn Embedder>>,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(store: Store, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            store,
            llm,
            embedder: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Configure the embedding provider. Called once during startup wiring,
    /// before the engine is shared.
    pub fn set_embedder(&mut self, embedder: Arc<dyn Embedder>) {
        self.embedder = Some(embedder);
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn llm(&self) -> Option<&Arc<dyn LlmClient>> {
        self.llm.as_ref()
    }

    pub fn embedder(&self) -> Option<&Arc<dyn Embedder>> {
        self.embedder.as_ref()
    }

    /// Generate and store an embedding for a single node's abstract.
    /// A no-op without an embedder or for empty abstracts.
    pub async fn embed_node(&self, node: &MemNode) -> Result<(), ContinuityError> {
        let Some(embedder) = &self.embedder else {
            return Ok(());
        };
        if node.l0_abstract.is_empty() {
            return Ok(());
        }

        let vec = embedder.embed(&node.l0_abstract).await?;
        self.store
            .save_vector(node.id, &vec, &embedder.model())
            .await
    }

    /// Embed every leaf whose vector is missing or was produced by a
    /// different model. Returns the number embedded; per-node failures are
    /// logged and skipped.
    pub async fn embed_missing(&self) -> Result<usize, ContinuityError> {
        let Some(embedder) = &self.embedder else {
            return Ok(0);
        };

        let leaves = self.store.list_leaves().await?;
        let model = embedder.model();
        let mut embedded = 0;

        for leaf in &leaves {
            if leaf.l0_abstract.is_empty() {
                continue;
            }

            match self.store.get_vector(leaf.id).await {
                Ok(Some(existing)) if existing.model == model => continue,
                Ok(_) => {}
                Err(e) => {
                    warn!(uri = leaf.uri.as_str(), error = %e, "embed missing: get vector");
                    continue;
                }
            }

            if let Err(e) = self.embed_node(leaf).await {
                warn!(uri = leaf.uri.as_str(), error = %e, "embed missing");
                continue;
            }
            embedded += 1;
        }

        Ok(embedded)
    }

    /// Run a decay pass now, then every 24 hours until [`Engine::stop`].
    pub fn start_decay_timer(self: &Arc<Self>) {
        let engine = Arc::clone(self);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            engine.run_decay_pass().await;

            let mut interval = tokio::time::interval(DECAY_INTERVAL);
            // Skip the immediate first tick; the startup pass just ran.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        engine.run_decay_pass().await;
                    }
                    _ = cancel.cancelled() => {
                        info!("decay timer shutting down");
                        break;
                    }
                }
            }
        });
    }

    async fn run_decay_pass(&self) {
        match self.store.decay_all_nodes().await {
            Ok(0) => debug!("decay: nothing to update"),
            Ok(updated) => info!(updated, "decay pass complete"),
            Err(e) => warn!(error = %e, "decay pass failed"),
        }
    }

    /// Cancel the engine's background tasks.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Token cancelled on [`Engine::stop`]; background tasks select on it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the full extraction pipeline for a completed session: memory
    /// extraction, then relational profiling, then the idempotency mark.
    ///
    /// Designed to run in a detached task; idempotent via `extracted_at`.
    pub async fn extract_session(
        &self,
        session_id: &str,
        transcript_path: &str,
    ) -> Result<(), ContinuityError> {
        if transcript_path.is_empty() {
            return Err(ContinuityError::Validation(
                "no transcript path provided".into(),
            ));
        }
        let Some(llm) = &self.llm else {
            return Err(ContinuityError::Unavailable("LLM".into()));
        };

        if let Some(session) = self.store.get_session(session_id).await? {
            if session.extracted_at.is_some() {
                info!(session_id, "extraction skipped: already extracted");
                return Ok(());
            }
        }

        extractor::extract_memories(
            &self.store,
            llm.as_ref(),
            self.embedder.as_ref(),
            session_id,
            transcript_path,
        )
        .await?;

        relational::extract_relational(&self.store, llm.as_ref(), session_id, transcript_path)
            .await?;

        if let Err(e) = self.store.mark_extracted(session_id).await {
            warn!(session_id, error = %e, "failed to mark session extracted");
        }

        Ok(())
    }

    /// Promote a user-flagged signal prompt into a memory immediately.
    ///
    /// The candidate skips the similarity gate: the user's intent is the
    /// authority. Designed to run in a detached task with a 60 s deadline.
    pub async fn extract_signal(
        &self,
        session_id: &str,
        prompt: &str,
    ) -> Result<(), ContinuityError> {
        let Some(llm) = &self.llm else {
            return Err(ContinuityError::Unavailable("LLM".into()));
        };

        let completion = llm
            .complete(&continuity_llm::prompts::signal_extraction_prompt(prompt))
            .await?;

        let candidates = extractor::parse_extraction_response(&completion.content)?;
        for candidate in &candidates {
            if let Err(e) = extractor::persist_candidate(
                &self.store,
                self.embedder.as_ref(),
                candidate,
                session_id,
                false,
            )
            .await
            {
                warn!(uri_hint = candidate.uri_hint.as_str(), error = %e, "signal: rejecting candidate");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::TfidfEmbedder;
    use continuity_core::Category;
    use continuity_llm::MockClient;
    use std::io::Write;

    fn transcript_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..4 {
            writeln!(
                file,
                r#"{{"type":"user","message":{{"role":"user","content":"user message {i} with plenty of text to pass the condensation length guard"}}}}"#
            )
            .unwrap();
        }
        file
    }

    fn extraction_response() -> String {
        r#"[{"category":"preferences","uri_hint":"wal-mode","l0":"Always use WAL mode for SQLite","l1":"The user wants SQLite opened in WAL mode for concurrent reads","l2":""}]"#.to_string()
    }

    #[tokio::test]
    async fn extract_session_is_idempotent() {
        let store = Store::open_in_memory().await.unwrap();
        store.init_session("s1", "/tmp/p").await.unwrap();

        let mock = Arc::new(MockClient::with_responses(vec![
            extraction_response(),
            "NO_UPDATE".to_string(),
        ]));
        let engine = Engine::new(store.clone(), Some(mock.clone() as Arc<dyn LlmClient>));
        let file = transcript_file();
        let path = file.path().to_str().unwrap();

        engine.extract_session("s1", path).await.unwrap();
        let calls_after_first = mock.call_count();
        assert!(calls_after_first >= 1);

        let session = store.get_session("s1").await.unwrap().unwrap();
        assert!(session.extracted_at.is_some());

        // Second run: no LLM calls, no node mutations.
        let before = store.list_leaves().await.unwrap();
        engine.extract_session("s1", path).await.unwrap();
        assert_eq!(mock.call_count(), calls_after_first);
        let after = store.list_leaves().await.unwrap();
        assert_eq!(before.len(), after.len());
    }

    #[tokio::test]
    async fn extract_session_requires_llm_and_path() {
        let store = Store::open_in_memory().await.unwrap();
        let engine = Engine::new(store, None);

        assert!(engine.extract_session("s1", "").await.is_err());
        assert!(matches!(
            engine.extract_session("s1", "/tmp/t.jsonl").await,
            Err(ContinuityError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn signal_stores_candidate_without_similarity_gate() {
        let store = Store::open_in_memory().await.unwrap();
        let mock = Arc::new(MockClient::new(&extraction_response()));
        let engine = Engine::new(store.clone(), Some(mock as Arc<dyn LlmClient>));

        engine
            .extract_signal("s", "remember this: always use WAL mode")
            .await
            .unwrap();

        let node = store
            .get_node_by_uri("mem://user/preferences/wal-mode")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(node.l0_abstract, "Always use WAL mode for SQLite");
        assert_eq!(node.source_session.as_deref(), Some("s"));
        assert_eq!(node.category, Category::Preferences);
    }

    #[tokio::test]
    async fn signal_without_llm_is_unavailable() {
        let store = Store::open_in_memory().await.unwrap();
        let engine = Engine::new(store, None);
        assert!(matches!(
            engine.extract_signal("s", "remember this").await,
            Err(ContinuityError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn embed_missing_backfills_and_respects_model_tags() {
        let store = Store::open_in_memory().await.unwrap();
        let a = store
            .upsert_node(continuity_core::MemNode::leaf(
                "mem://user/preferences/a",
                Category::Preferences,
                "Preference alpha about tooling",
                "A preference node used to exercise the embedding backfill",
                "",
                "s1",
            ))
            .await
            .unwrap();
        let b = store
            .upsert_node(continuity_core::MemNode::leaf(
                "mem://user/events/b",
                Category::Events,
                "Event beta about deployment",
                "An event node used to exercise the embedding backfill",
                "",
                "s1",
            ))
            .await
            .unwrap();
        // Node `a` already has a vector from a different model.
        store.save_vector(a.id, &[1.0, 0.0], "old-model").await.unwrap();

        let mut engine = Engine::new(store.clone(), None);
        engine.set_embedder(Arc::new(TfidfEmbedder::from_documents(
            &["Preference alpha about tooling", "Event beta about deployment"],
            512,
        )));

        // Both re-embedded: one missing, one stale model.
        assert_eq!(engine.embed_missing().await.unwrap(), 2);
        assert_eq!(
            store.get_vector(a.id).await.unwrap().unwrap().model,
            "tfidf"
        );
        assert!(store.get_vector(b.id).await.unwrap().is_some());

        // Second pass: everything current.
        assert_eq!(engine.embed_missing().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stop_cancels_decay_timer() {
        let store = Store::open_in_memory().await.unwrap();
        let engine = Arc::new(Engine::new(store, None));
        engine.start_decay_timer();
        engine.stop();
        assert!(engine.cancellation_token().is_cancelled());
    }
}
