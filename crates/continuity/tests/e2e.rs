// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the HTTP API: each test builds an isolated router
//! over an in-memory store, a mock LLM, and the TF-IDF embedder.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use continuity::server::{router, AppState};
use continuity_core::{Embedder, LlmClient, MemNode};
use continuity_engine::{Engine, TfidfEmbedder};
use continuity_llm::MockClient;
use continuity_store::Store;

struct Harness {
    app: Router,
    store: Store,
}

async fn harness(llm: Option<Arc<dyn LlmClient>>, embedder: Option<Arc<dyn Embedder>>) -> Harness {
    let store = Store::open_in_memory().await.unwrap();
    let mut engine = Engine::new(store.clone(), llm);
    if let Some(embedder) = embedder {
        engine.set_embedder(embedder);
    }
    let app = router(AppState::new(Arc::new(engine)));
    Harness { app, store }
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

/// Poll until `check` passes or the deadline expires. Background tasks
/// (signal, extraction) are detached, so tests wait for their effects.
async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within deadline");
}

#[tokio::test]
async fn health_reports_db_and_version() {
    let h = harness(None, None).await;
    let (status, body) = request(&h.app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["db"], true);
    assert_eq!(body["db_path"], ":memory:");
    assert!(body["version"].as_str().is_some());
}

#[tokio::test]
async fn cold_start_context_has_wrapper_and_no_sessions() {
    let h = harness(None, None).await;
    let (status, body) = request(&h.app, "GET", "/api/context", None).await;
    assert_eq!(status, StatusCode::OK);

    let context = body["context"].as_str().unwrap();
    assert!(context.contains("<context>"));
    assert!(context.contains("Continuity — Session Memory"));
    assert!(context.contains("</context>"));
    assert!(!context.contains("Recent Sessions"));
}

#[tokio::test]
async fn session_lifecycle() {
    let h = harness(None, None).await;

    // Init.
    let (status, body) = request(
        &h.app,
        "POST",
        "/api/sessions/init",
        Some(serde_json::json!({"session_id": "s1", "project": "/tmp/p"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], "s1");
    assert_eq!(body["status"], "active");

    // Missing session_id is a 400 with the error body shape.
    let (status, body) = request(
        &h.app,
        "POST",
        "/api/sessions/init",
        Some(serde_json::json!({"project": "/tmp/p"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("session_id"));

    // Three observations.
    for i in 0..3 {
        let (status, body) = request(
            &h.app,
            "POST",
            "/api/sessions/s1/observations",
            Some(serde_json::json!({
                "tool_name": "Bash",
                "tool_input": format!("{{\"command\":\"cmd{i}\"}}"),
                "tool_response": "ok",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "ok");
    }
    assert_eq!(h.store.get_session_observation_count("s1").await.unwrap(), 3);

    // Complete, then a second complete downgrades to a soft 200.
    let (status, body) = request(&h.app, "POST", "/api/sessions/s1/complete", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    let (status, body) = request(&h.app, "POST", "/api/sessions/s1/complete", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["note"].as_str().is_some());

    // From another session's perspective the completed one is listed.
    let (status, body) = request(&h.app, "GET", "/api/context?session_id=s2", None).await;
    assert_eq!(status, StatusCode::OK);
    let context = body["context"].as_str().unwrap();
    assert!(context.contains("Recent Sessions"));
    assert!(context.contains("p: completed (3 tools used)"));

    // End is idempotent.
    let (status, body) = request(&h.app, "POST", "/api/sessions/s1/end", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ended");
}

#[tokio::test]
async fn signal_capture_stores_memory() {
    let response = r#"[{"category":"preferences","uri_hint":"wal-mode","l0":"Always use WAL mode for SQLite","l1":"The user wants SQLite opened in WAL mode for all projects","l2":""}]"#;
    let h = harness(
        Some(Arc::new(MockClient::new(response)) as Arc<dyn LlmClient>),
        None,
    )
    .await;

    let (status, body) = request(
        &h.app,
        "POST",
        "/api/sessions/s/signal",
        Some(serde_json::json!({"prompt": "remember this: always use WAL mode"})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "processing");

    let store = h.store.clone();
    eventually(|| {
        let store = store.clone();
        async move {
            store
                .get_node_by_uri("mem://user/preferences/wal-mode")
                .await
                .unwrap()
                .is_some()
        }
    })
    .await;

    let node = h
        .store
        .get_node_by_uri("mem://user/preferences/wal-mode")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(node.l0_abstract, "Always use WAL mode for SQLite");
    assert_eq!(node.source_session.as_deref(), Some("s"));
}

#[tokio::test]
async fn signal_validation_and_availability() {
    let h = harness(None, None).await;

    let (status, _) = request(
        &h.app,
        "POST",
        "/api/sessions/s/signal",
        Some(serde_json::json!({"prompt": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = request(
        &h.app,
        "POST",
        "/api/sessions/s/signal",
        Some(serde_json::json!({"prompt": "remember this"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("LLM"));
}

#[tokio::test]
async fn extract_endpoint_runs_pipeline() {
    use std::io::Write;

    let mut transcript = tempfile::NamedTempFile::new().unwrap();
    for i in 0..4 {
        writeln!(
            transcript,
            r#"{{"type":"user","message":{{"role":"user","content":"user message {i} padded out to pass the condensation length guard"}}}}"#
        )
        .unwrap();
    }

    let extraction = r#"[{"category":"patterns","uri_hint":"wal-mode","l0":"Uses SQLite WAL mode for concurrent reads","l1":"The project keeps SQLite in WAL mode so reads never block writes","l2":""}]"#;
    let llm: Arc<dyn LlmClient> = Arc::new(MockClient::with_responses(vec![
        extraction.to_string(),
        "NO_UPDATE".to_string(),
    ]));
    let h = harness(Some(llm), None).await;
    h.store.init_session("s1", "/tmp/p").await.unwrap();

    let (status, body) = request(
        &h.app,
        "POST",
        "/api/sessions/s1/extract",
        Some(serde_json::json!({"transcript_path": transcript.path().to_str().unwrap()})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "extracting");

    let store = h.store.clone();
    eventually(|| {
        let store = store.clone();
        async move {
            store
                .get_session("s1")
                .await
                .unwrap()
                .unwrap()
                .extracted_at
                .is_some()
        }
    })
    .await;

    assert!(h
        .store
        .get_node_by_uri("mem://agent/patterns/wal-mode")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn extract_without_llm_is_unavailable() {
    let h = harness(None, None).await;
    let (status, _) = request(
        &h.app,
        "POST",
        "/api/sessions/s1/extract",
        Some(serde_json::json!({"transcript_path": "/tmp/t.jsonl"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

const SEARCH_DOCS: [(&str, &str, continuity_core::Category); 5] = [
    (
        "mem://user/profile/go-dev",
        "Go developer preferring minimal dependencies and standard library",
        continuity_core::Category::Profile,
    ),
    (
        "mem://user/preferences/devbox",
        "Uses devbox for reproducible development environments",
        continuity_core::Category::Preferences,
    ),
    (
        "mem://agent/patterns/wal-mode",
        "Uses SQLite WAL mode for concurrent reads",
        continuity_core::Category::Patterns,
    ),
    (
        "mem://user/events/deploy-v2",
        "Deployed v2.1 of the billing service to production",
        continuity_core::Category::Events,
    ),
    (
        "mem://agent/cases/pool-leak",
        "Fixed connection pool leak by bounding idle connections",
        continuity_core::Category::Cases,
    ),
];

async fn seeded_search_harness(llm: Option<Arc<dyn LlmClient>>) -> Harness {
    let store = Store::open_in_memory().await.unwrap();
    let docs: Vec<&str> = SEARCH_DOCS.iter().map(|(_, l0, _)| *l0).collect();
    let embedder: Arc<dyn Embedder> = Arc::new(TfidfEmbedder::from_documents(&docs, 512));

    for (uri, l0, category) in SEARCH_DOCS {
        let node = store
            .upsert_node(MemNode::leaf(
                uri,
                category,
                l0,
                format!("{l0}. Seeded for the search endpoint tests."),
                "",
                "seed",
            ))
            .await
            .unwrap();
        let vec = embedder.embed(l0).await.unwrap();
        store.save_vector(node.id, &vec, "tfidf").await.unwrap();
    }

    let mut engine = Engine::new(store.clone(), llm);
    engine.set_embedder(embedder);
    let app = router(AppState::new(Arc::new(engine)));
    Harness { app, store }
}

#[tokio::test]
async fn find_mode_ranks_best_leaf_first() {
    let h = seeded_search_harness(None).await;
    let (status, body) = request(
        &h.app,
        "GET",
        "/api/search?q=Go%20developer%20minimal%20dependencies&limit=5",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "find");
    assert!(body["count"].as_u64().unwrap() >= 1);
    assert_eq!(body["results"][0]["uri"], "mem://user/profile/go-dev");
}

#[tokio::test]
async fn search_mode_decomposes_with_llm() {
    let decomposition = r#"[{"query":"minimal dependencies standard library","type":"MEMORY"},{"query":"SQLite WAL mode","type":"PATTERN"}]"#;
    let h = seeded_search_harness(Some(
        Arc::new(MockClient::new(decomposition)) as Arc<dyn LlmClient>
    ))
    .await;

    let (status, body) = request(
        &h.app,
        "GET",
        "/api/search?q=how%20do%20they%20work%20with%20sqlite&mode=search&limit=3",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "search");
    let count = body["count"].as_u64().unwrap();
    assert!(count >= 1 && count <= 3);
}

#[tokio::test]
async fn search_validation_and_availability() {
    let h = seeded_search_harness(None).await;

    let (status, _) = request(&h.app, "GET", "/api/search", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(&h.app, "GET", "/api/search?q=x&category=bogus", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let bare = harness(None, None).await;
    let (status, _) = request(&bare.app, "GET", "/api/search?q=x", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn profile_endpoint_returns_relational_and_nodes() {
    let h = seeded_search_harness(None).await;
    h.store
        .upsert_node(MemNode::leaf(
            continuity_core::RELATIONAL_URI,
            continuity_core::Category::Profile,
            "Relational profile: communication style",
            "Direct feedback, prefers autonomous execution",
            "",
            "s1",
        ))
        .await
        .unwrap();

    let (status, body) = request(&h.app, "GET", "/api/profile", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["relational_profile"],
        "Direct feedback, prefers autonomous execution"
    );

    let nodes = body["nodes"].as_array().unwrap();
    // go-dev profile + devbox preference; the relational node is excluded.
    assert_eq!(nodes.len(), 2);
    assert!(nodes
        .iter()
        .all(|n| n["uri"] != continuity_core::RELATIONAL_URI));
}

#[tokio::test]
async fn tree_endpoint_lists_roots_and_children() {
    let h = seeded_search_harness(None).await;

    let (status, body) = request(&h.app, "GET", "/api/tree", None).await;
    assert_eq!(status, StatusCode::OK);
    let roots: Vec<&str> = body["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["uri"].as_str().unwrap())
        .collect();
    assert!(roots.contains(&"mem://user"));
    assert!(roots.contains(&"mem://agent"));

    let (status, body) = request(&h.app, "GET", "/api/tree?uri=mem://agent", None).await;
    assert_eq!(status, StatusCode::OK);
    let children: Vec<&str> = body["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["uri"].as_str().unwrap())
        .collect();
    assert!(children.contains(&"mem://agent/patterns"));
    assert!(children.contains(&"mem://agent/cases"));
}
