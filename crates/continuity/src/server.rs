// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loopback HTTP API built on axum.
//!
//! Sets up routes and shared state; handlers marshal between JSON bodies
//! and engine operations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, warn};

use continuity_core::types::Category;
use continuity_core::RELATIONAL_URI;
use continuity_engine::{build_context, Engine, SearchOpts};

/// Deadline on a detached signal-extraction task.
const SIGNAL_DEADLINE: Duration = Duration::from_secs(60);

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub started: Instant,
    pub version: &'static str,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            started: Instant::now(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(get_health))
        .route("/api/sessions/init", post(post_session_init))
        .route(
            "/api/sessions/{session_id}/observations",
            post(post_observation),
        )
        .route("/api/sessions/{session_id}/complete", post(post_complete))
        .route("/api/sessions/{session_id}/end", post(post_end))
        .route("/api/sessions/{session_id}/extract", post(post_extract))
        .route("/api/sessions/{session_id}/signal", post(post_signal))
        .route("/api/context", get(get_context))
        .route("/api/search", get(get_search))
        .route("/api/profile", get(get_profile))
        .route("/api/tree", get(get_tree))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime: f64,
    db: bool,
    db_path: String,
}

async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_ok = state.engine.store().ping().await.is_ok();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: state.version.to_string(),
        uptime: state.started.elapsed().as_secs_f64(),
        db: db_ok,
        db_path: state.engine.store().path().to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct SessionInitRequest {
    #[serde(default)]
    session_id: String,
    #[serde(default)]
    project: String,
}

async fn post_session_init(
    State(state): State<AppState>,
    Json(body): Json<SessionInitRequest>,
) -> Response {
    if body.session_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "session_id required");
    }

    match state
        .engine
        .store()
        .init_session(&body.session_id, &body.project)
        .await
    {
        Ok(session) => Json(serde_json::json!({
            "session_id": session.session_id,
            "status": session.status,
            "tool_count": session.tool_count,
        }))
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct ObservationRequest {
    #[serde(default)]
    tool_name: String,
    #[serde(default)]
    tool_input: String,
    #[serde(default)]
    tool_response: String,
}

async fn post_observation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<ObservationRequest>,
) -> Response {
    let store = state.engine.store();
    if let Err(e) = store
        .add_observation(
            &session_id,
            &body.tool_name,
            &body.tool_input,
            &body.tool_response,
        )
        .await
    {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    // Tool counter rides along; a failure here never fails the request.
    if let Err(e) = store.increment_tool_count(&session_id).await {
        warn!(session_id = session_id.as_str(), error = %e, "tool count increment failed");
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({"status": "ok"})),
    )
        .into_response()
}

async fn post_complete(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.engine.store().complete_session(&session_id).await {
        Ok(()) => Json(serde_json::json!({"status": "completed"})).into_response(),
        // Not finding an active session is not a server error: the session
        // may have already been completed or never existed.
        Err(e) => Json(serde_json::json!({"status": "ok", "note": e.to_string()}))
            .into_response(),
    }
}

async fn post_end(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    match state.engine.store().end_session(&session_id).await {
        Ok(()) => Json(serde_json::json!({"status": "ended"})).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct ExtractRequest {
    #[serde(default)]
    transcript_path: String,
}

async fn post_extract(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<ExtractRequest>,
) -> Response {
    if state.engine.llm().is_none() {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "LLM not configured");
    }

    // Detached extraction; the endpoint acknowledges immediately.
    let engine = Arc::clone(&state.engine);
    tokio::spawn(async move {
        if let Err(e) = engine
            .extract_session(&session_id, &body.transcript_path)
            .await
        {
            error!(session_id = session_id.as_str(), error = %e, "extraction failed");
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"status": "extracting"})),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct SignalRequest {
    #[serde(default)]
    prompt: String,
}

async fn post_signal(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<SignalRequest>,
) -> Response {
    if body.prompt.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "prompt required");
    }
    if state.engine.llm().is_none() {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "LLM not configured");
    }

    let engine = Arc::clone(&state.engine);
    tokio::spawn(async move {
        match tokio::time::timeout(
            SIGNAL_DEADLINE,
            engine.extract_signal(&session_id, &body.prompt),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(session_id = session_id.as_str(), error = %e, "signal extraction failed")
            }
            Err(_) => error!(
                session_id = session_id.as_str(),
                "signal extraction timed out"
            ),
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"status": "processing"})),
    )
        .into_response()
}

async fn get_context(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let session_id = params.get("session_id").map(String::as_str);
    let context = build_context(state.engine.store(), session_id).await;
    Json(serde_json::json!({"context": context})).into_response()
}

#[derive(Debug, Serialize)]
struct SearchResultJson {
    uri: String,
    category: String,
    l0_abstract: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    l1_overview: String,
    score: f64,
    similarity: f64,
    relevance: f64,
}

async fn get_search(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(query) = params.get("q").filter(|q| !q.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "q parameter required");
    };

    let mode = params.get("mode").map(String::as_str).unwrap_or("find");
    let limit = params
        .get("limit")
        .and_then(|l| l.parse::<usize>().ok())
        .filter(|l| *l > 0)
        .unwrap_or(10);

    let category = match params.get("category").filter(|c| !c.is_empty()) {
        Some(raw) => match Category::parse(raw) {
            Some(category) => Some(category),
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("unknown category {raw:?}"),
                )
            }
        },
        None => None,
    };

    let Some(embedder) = state.engine.embedder() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "search not available - no embedder configured",
        );
    };

    let opts = SearchOpts { limit, category };
    let store = state.engine.store();

    let results = match mode {
        "search" => {
            continuity_engine::search(
                store,
                embedder.as_ref(),
                state.engine.llm().map(|l| l.as_ref()),
                query,
                &opts,
            )
            .await
        }
        _ => continuity_engine::find(store, embedder.as_ref(), query, &opts).await,
    };

    match results {
        Ok(results) => {
            let out: Vec<SearchResultJson> = results
                .into_iter()
                .map(|r| SearchResultJson {
                    uri: r.node.uri,
                    category: r.node.category.as_str().to_string(),
                    l0_abstract: r.node.l0_abstract,
                    l1_overview: r.node.l1_overview,
                    score: r.score,
                    similarity: r.similarity,
                    relevance: r.node.relevance,
                })
                .collect();
            Json(serde_json::json!({
                "query": query,
                "mode": mode,
                "count": out.len(),
                "results": out,
            }))
            .into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Debug, Serialize)]
struct ProfileNodeJson {
    uri: String,
    category: String,
    l0_abstract: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    l1_overview: String,
    relevance: f64,
}

async fn get_profile(State(state): State<AppState>) -> Response {
    let store = state.engine.store();

    let relational = match store.get_node_by_uri(RELATIONAL_URI).await {
        Ok(node) => node.map(|n| n.l1_overview).unwrap_or_default(),
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let mut nodes = Vec::new();
    for category in [Category::Profile, Category::Preferences] {
        let Ok(found) = store.find_by_category(category).await else {
            continue;
        };
        for node in found {
            if node.uri == RELATIONAL_URI || node.l0_abstract.is_empty() {
                continue;
            }
            nodes.push(ProfileNodeJson {
                uri: node.uri,
                category: node.category.as_str().to_string(),
                l0_abstract: node.l0_abstract,
                l1_overview: node.l1_overview,
                relevance: node.relevance,
            });
        }
    }

    Json(serde_json::json!({
        "relational_profile": relational,
        "nodes": nodes,
    }))
    .into_response()
}

#[derive(Debug, Serialize)]
struct TreeNodeJson {
    uri: String,
    node_type: String,
    category: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    l0_abstract: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    l1_overview: String,
    #[serde(skip_serializing_if = "is_zero")]
    children: i64,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

async fn get_tree(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let store = state.engine.store();
    let uri = params.get("uri").cloned().unwrap_or_default();

    let mut nodes = Vec::new();

    if uri.is_empty() {
        let roots = match store.list_roots().await {
            Ok(roots) => roots,
            Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        for root in roots {
            let children = store.count_children(&root.uri).await.unwrap_or(0);
            nodes.push(TreeNodeJson {
                uri: root.uri,
                node_type: root.node_type.as_str().to_string(),
                category: root.category.as_str().to_string(),
                l0_abstract: String::new(),
                l1_overview: String::new(),
                children,
            });
        }
    } else {
        let children = match store.get_children(&uri).await {
            Ok(children) => children,
            Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        for child in children {
            let grandchildren = if child.node_type == continuity_core::NodeType::Dir {
                store.count_children(&child.uri).await.unwrap_or(0)
            } else {
                0
            };
            nodes.push(TreeNodeJson {
                uri: child.uri,
                node_type: child.node_type.as_str().to_string(),
                category: child.category.as_str().to_string(),
                l0_abstract: child.l0_abstract,
                l1_overview: child.l1_overview,
                children: grandchildren,
            });
        }
    }

    Json(serde_json::json!({"uri": uri, "nodes": nodes})).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_init_request_defaults() {
        let req: SessionInitRequest = serde_json::from_str(r#"{"session_id":"s1"}"#).unwrap();
        assert_eq!(req.session_id, "s1");
        assert!(req.project.is_empty());

        let req: SessionInitRequest = serde_json::from_str("{}").unwrap();
        assert!(req.session_id.is_empty());
    }

    #[test]
    fn error_body_shape() {
        let body = serde_json::to_string(&ErrorResponse {
            error: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(body, r#"{"error":"boom"}"#);
    }

    #[test]
    fn search_result_omits_empty_overview() {
        let json = serde_json::to_string(&SearchResultJson {
            uri: "mem://user/profile/x".into(),
            category: "profile".into(),
            l0_abstract: "abstract".into(),
            l1_overview: String::new(),
            score: 0.5,
            similarity: 0.6,
            relevance: 0.9,
        })
        .unwrap();
        assert!(!json.contains("l1_overview"));
    }

    #[test]
    fn tree_node_omits_zero_children() {
        let json = serde_json::to_string(&TreeNodeJson {
            uri: "mem://user".into(),
            node_type: "dir".into(),
            category: "profile".into(),
            l0_abstract: String::new(),
            l1_overview: String::new(),
            children: 0,
        })
        .unwrap();
        assert!(!json.contains("children"));
    }
}
