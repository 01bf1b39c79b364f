// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval: fast vector search (`find`) and LLM-decomposed multi-intent
//! search (`search`).

use std::collections::HashMap;
use std::time::Duration;

use continuity_core::types::{Category, MemNode, NodeType};
use continuity_core::{ContinuityError, Embedder, LlmClient};
use continuity_llm::prompts;
use continuity_store::Store;
use serde::Deserialize;
use tracing::warn;

use crate::embedder::cosine_similarity;

/// Deadline on the search-intent decomposition call.
const INTENT_DEADLINE: Duration = Duration::from_secs(60);

/// A single search result.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub node: MemNode,
    pub score: f64,
    pub similarity: f64,
}

/// Search options.
#[derive(Debug, Clone, Default)]
pub struct SearchOpts {
    /// Max results; 0 means the default of 10.
    pub limit: usize,
    /// Restrict to a single category.
    pub category: Option<Category>,
}

impl SearchOpts {
    fn limit(&self) -> usize {
        if self.limit == 0 {
            10
        } else {
            self.limit
        }
    }
}

/// A decomposed search intent.
#[derive(Debug, Clone, Deserialize)]
struct SubQuery {
    #[serde(default)]
    query: String,
    #[serde(default, rename = "type")]
    _intent: String, // MEMORY, RESOURCE, PATTERN
}

/// Fast vector search. `score = similarity * relevance`; results are
/// touched (retrieval boost) before returning.
pub async fn find(
    store: &Store,
    embedder: &dyn Embedder,
    query: &str,
    opts: &SearchOpts,
) -> Result<Vec<SearchResult>, ContinuityError> {
    let query_vec = embedder.embed(query).await?;

    let vectors = store.all_vectors().await?;
    if vectors.is_empty() {
        return Ok(Vec::new());
    }

    let node_ids: Vec<i64> = vectors.iter().map(|v| v.node_id).collect();
    let nodes = store.get_nodes_by_ids(&node_ids).await?;
    let node_map: HashMap<i64, MemNode> = nodes.into_iter().map(|n| (n.id, n)).collect();

    let mut results = Vec::new();
    for vector in &vectors {
        let Some(node) = node_map.get(&vector.node_id) else {
            continue;
        };
        if node.node_type != NodeType::Leaf {
            continue;
        }
        if let Some(category) = opts.category {
            if node.category != category {
                continue;
            }
        }

        let similarity = cosine_similarity(&query_vec, &vector.embedding);
        let score = similarity * node.relevance;
        if score > 0.0 {
            results.push(SearchResult {
                node: node.clone(),
                score,
                similarity,
            });
        }
    }

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(opts.limit());

    // Retrieval boost; failures never fail the search.
    for result in &results {
        if let Err(e) = store.touch_node(&result.node.uri).await {
            warn!(uri = result.node.uri.as_str(), error = %e, "touch failed");
        }
    }

    Ok(results)
}

/// LLM-assisted search with intent decomposition.
///
/// Falls back to [`find`] when no LLM client is available or decomposition
/// fails. Re-scores with `0.5*similarity + 0.3*relevance + 0.2*parentScore`
/// where `parentScore` is the mean similarity of surfaced siblings.
pub async fn search(
    store: &Store,
    embedder: &dyn Embedder,
    llm: Option<&dyn LlmClient>,
    query: &str,
    opts: &SearchOpts,
) -> Result<Vec<SearchResult>, ContinuityError> {
    let Some(llm) = llm else {
        return find(store, embedder, query, opts).await;
    };

    let prompt = prompts::search_intent_prompt(query);
    let completion =
        match tokio::time::timeout(INTENT_DEADLINE, llm.complete(&prompt)).await {
            Ok(Ok(completion)) => Some(completion),
            Ok(Err(e)) => {
                warn!(error = %e, "intent decomposition failed, falling back to find");
                None
            }
            Err(_) => {
                warn!("intent decomposition timed out, falling back to find");
                None
            }
        };
    let Some(completion) = completion else {
        return find(store, embedder, query, opts).await;
    };

    let mut sub_queries = parse_sub_queries(&completion.content);
    if sub_queries.is_empty() {
        sub_queries = vec![query.to_string()];
    }

    let expanded = SearchOpts {
        limit: opts.limit() * 3,
        category: opts.category,
    };

    // Deduplicate across sub-queries by node id; max score wins.
    let mut seen: HashMap<i64, SearchResult> = HashMap::new();
    for sub_query in &sub_queries {
        let results = match find(store, embedder, sub_query, &expanded).await {
            Ok(results) => results,
            Err(e) => {
                warn!(sub_query = sub_query.as_str(), error = %e, "sub-query find failed");
                continue;
            }
        };
        for result in results {
            match seen.get(&result.node.id) {
                Some(existing) if existing.score >= result.score => {}
                _ => {
                    seen.insert(result.node.id, result);
                }
            }
        }
    }

    let parent_scores = build_parent_scores(&seen);

    let mut results: Vec<SearchResult> = seen
        .into_values()
        .map(|mut r| {
            let parent_score = r
                .node
                .parent_uri
                .as_deref()
                .and_then(|p| parent_scores.get(p))
                .copied()
                .unwrap_or(0.0);
            r.score = 0.5 * r.similarity + 0.3 * r.node.relevance + 0.2 * parent_score;
            r
        })
        .collect();

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(opts.limit());
    Ok(results)
}

/// Mean similarity of surfaced siblings, keyed by parent URI.
fn build_parent_scores(results: &HashMap<i64, SearchResult>) -> HashMap<String, f64> {
    let mut sums: HashMap<String, (f64, usize)> = HashMap::new();
    for result in results.values() {
        if let Some(parent) = result.node.parent_uri.as_deref() {
            let entry = sums.entry(parent.to_string()).or_insert((0.0, 0));
            entry.0 += result.similarity;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(uri, (sum, count))| (uri, sum / count as f64))
        .collect()
}

/// Extract sub-queries from the decomposition response. Lenient: any parse
/// failure yields an empty list (the caller falls back to the raw query).
/// Capped at 3.
fn parse_sub_queries(content: &str) -> Vec<String> {
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

    let (Some(start), Some(end)) = (content.find('['), content.rfind(']')) else {
        return Vec::new();
    };
    if end <= start {
        return Vec::new();
    }

    let Ok(parsed) = serde_json::from_str::<Vec<SubQuery>>(&content[start..=end]) else {
        return Vec::new();
    };

    parsed
        .into_iter()
        .map(|sq| sq.query)
        .filter(|q| !q.is_empty())
        .take(3)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::TfidfEmbedder;
    use continuity_core::MemNode;
    use continuity_llm::MockClient;

    const SEED_DOCS: [(&str, &str, Category); 5] = [
        (
            "mem://user/profile/go-dev",
            "Go developer preferring minimal dependencies and standard library",
            Category::Profile,
        ),
        (
            "mem://user/preferences/devbox",
            "Uses devbox for reproducible development environments",
            Category::Preferences,
        ),
        (
            "mem://agent/patterns/wal-mode",
            "Uses SQLite WAL mode for concurrent reads",
            Category::Patterns,
        ),
        (
            "mem://user/events/deploy-v2",
            "Deployed v2.1 of the billing service to production",
            Category::Events,
        ),
        (
            "mem://agent/cases/pool-leak",
            "Fixed connection pool leak by bounding idle connections",
            Category::Cases,
        ),
    ];

    async fn seeded_store() -> (Store, TfidfEmbedder) {
        let store = Store::open_in_memory().await.unwrap();
        let docs: Vec<&str> = SEED_DOCS.iter().map(|(_, l0, _)| *l0).collect();
        let embedder = TfidfEmbedder::from_documents(&docs, 512);

        for (uri, l0, category) in SEED_DOCS {
            let node = store
                .upsert_node(MemNode::leaf(
                    uri,
                    category,
                    l0,
                    format!("{l0}. Stored as a retrieval test fixture."),
                    "",
                    "seed",
                ))
                .await
                .unwrap();
            let vec = embedder.embed(l0).await.unwrap();
            store.save_vector(node.id, &vec, "tfidf").await.unwrap();
        }
        (store, embedder)
    }

    #[tokio::test]
    async fn find_ranks_relevant_leaf_first() {
        let (store, embedder) = seeded_store().await;
        let results = find(
            &store,
            &embedder,
            "Go developer minimal dependencies",
            &SearchOpts { limit: 5, category: None },
        )
        .await
        .unwrap();

        assert!(!results.is_empty());
        assert_eq!(results[0].node.uri, "mem://user/profile/go-dev");

        // Scores are positive and non-increasing.
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert!(results.iter().all(|r| r.score > 0.0));
    }

    #[tokio::test]
    async fn find_touches_surfaced_nodes() {
        let (store, embedder) = seeded_store().await;
        find(
            &store,
            &embedder,
            "devbox development environments",
            &SearchOpts { limit: 1, category: None },
        )
        .await
        .unwrap();

        let node = store
            .get_node_by_uri("mem://user/preferences/devbox")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(node.access_count, 1);
        assert_eq!(node.relevance, 1.0);
    }

    #[tokio::test]
    async fn find_respects_category_filter() {
        let (store, embedder) = seeded_store().await;
        let results = find(
            &store,
            &embedder,
            "production deploy billing",
            &SearchOpts { limit: 10, category: Some(Category::Events) },
        )
        .await
        .unwrap();

        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.node.category == Category::Events));
    }

    #[tokio::test]
    async fn find_on_empty_store_returns_nothing() {
        let store = Store::open_in_memory().await.unwrap();
        let embedder = TfidfEmbedder::from_documents(&["placeholder"], 512);
        let results = find(&store, &embedder, "anything", &SearchOpts::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn search_decomposes_and_rescores() {
        let (store, embedder) = seeded_store().await;
        let mock = MockClient::new(
            r#"[{"query":"minimal dependencies standard library","type":"MEMORY"},
                {"query":"SQLite WAL mode","type":"PATTERN"}]"#,
        );

        let results = search(
            &store,
            &embedder,
            Some(&mock as &dyn LlmClient),
            "how does this developer like to work with sqlite",
            &SearchOpts { limit: 3, category: None },
        )
        .await
        .unwrap();

        assert!(!results.is_empty());
        assert!(results.len() <= 3);
        // Every node appears at most once.
        let mut ids: Vec<i64> = results.iter().map(|r| r.node.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), results.len());
        // Non-increasing rescored ordering.
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn search_without_llm_falls_back_to_find() {
        let (store, embedder) = seeded_store().await;
        let results = search(
            &store,
            &embedder,
            None,
            "devbox environments",
            &SearchOpts { limit: 2, category: None },
        )
        .await
        .unwrap();
        assert!(!results.is_empty());
    }

    #[tokio::test]
    async fn search_falls_back_when_llm_fails() {
        let (store, embedder) = seeded_store().await;
        let mock = MockClient::failing("llm down");
        let results = search(
            &store,
            &embedder,
            Some(&mock as &dyn LlmClient),
            "devbox environments",
            &SearchOpts { limit: 2, category: None },
        )
        .await
        .unwrap();
        assert!(!results.is_empty());
    }

    #[tokio::test]
    async fn search_with_useless_decomposition_uses_raw_query() {
        let (store, embedder) = seeded_store().await;
        let mock = MockClient::new("I could not decompose that query, sorry.");
        let results = search(
            &store,
            &embedder,
            Some(&mock as &dyn LlmClient),
            "devbox environments",
            &SearchOpts { limit: 2, category: None },
        )
        .await
        .unwrap();
        assert!(!results.is_empty());
    }

    #[test]
    fn parse_sub_queries_caps_at_three() {
        let content = r#"[
            {"query":"one","type":"MEMORY"},
            {"query":"two","type":"RESOURCE"},
            {"query":"three","type":"PATTERN"},
            {"query":"four","type":"MEMORY"}
        ]"#;
        assert_eq!(parse_sub_queries(content), vec!["one", "two", "three"]);
    }

    #[test]
    fn parse_sub_queries_lenient_on_garbage() {
        assert!(parse_sub_queries("not json").is_empty());
        assert!(parse_sub_queries("```\nnope\n```").is_empty());
    }

    #[test]
    fn parent_scores_are_sibling_means() {
        fn result(id: i64, parent: &str, similarity: f64) -> SearchResult {
            let mut node = MemNode::leaf(
                format!("mem://user/events/n{id}"),
                Category::Events,
                "x",
                "y",
                "",
                "s",
            );
            node.id = id;
            node.parent_uri = Some(parent.to_string());
            SearchResult { node, score: 0.0, similarity }
        }

        let mut seen = HashMap::new();
        seen.insert(1, result(1, "mem://user/events", 0.8));
        seen.insert(2, result(2, "mem://user/events", 0.4));
        seen.insert(3, result(3, "mem://user/profile", 0.5));

        let scores = build_parent_scores(&seen);
        assert!((scores["mem://user/events"] - 0.6).abs() < 1e-9);
        assert!((scores["mem://user/profile"] - 0.5).abs() < 1e-9);
    }
}
