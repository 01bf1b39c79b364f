// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Startup wiring for the server and the maintenance subcommands.

use std::sync::Arc;

use continuity_config::{load_config, ContinuityConfig};
use continuity_core::{ContinuityError, Embedder};
use continuity_engine::{
    probe_ollama, Engine, OllamaEmbedder, SearchOpts, TfidfEmbedder, BACKFILL_DEADLINE,
};
use continuity_store::{default_db_path, Store};
use tracing::{info, warn};

use crate::server::{router, AppState};
use crate::shutdown;

/// Initializes the tracing subscriber with the configured log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("continuity={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn load() -> Result<ContinuityConfig, ContinuityError> {
    load_config().map_err(|e| ContinuityError::Config(e.to_string()))
}

async fn open_store(config: &ContinuityConfig) -> Result<Store, ContinuityError> {
    if config.database.path.is_empty() {
        Store::open(default_db_path()?).await
    } else {
        Store::open(&config.database.path).await
    }
}

/// Probe the external embedding service, falling back to TF-IDF over the
/// existing corpus. The fallback keeps retrieval working fully offline.
async fn configure_embedder(
    config: &ContinuityConfig,
    store: &Store,
) -> Option<Arc<dyn Embedder>> {
    let ollama_url = if config.llm.ollama_url.is_empty() {
        "http://localhost:11434"
    } else {
        &config.llm.ollama_url
    };
    let embedding_model = if config.llm.embedding_model.is_empty() {
        "nomic-embed-text"
    } else {
        &config.llm.embedding_model
    };

    if probe_ollama(ollama_url, embedding_model).await {
        match OllamaEmbedder::new(ollama_url, embedding_model, 768) {
            Ok(embedder) => {
                info!(model = embedding_model, "embedder: ollama");
                return Some(Arc::new(embedder));
            }
            Err(e) => warn!(error = %e, "ollama embedder init failed"),
        }
    }

    match TfidfEmbedder::build(store, 0).await {
        Ok(embedder) => {
            info!("embedder: tfidf (fallback)");
            Some(Arc::new(embedder))
        }
        Err(e) => {
            warn!(error = %e, "tfidf embedder init failed");
            None
        }
    }
}

/// Build the engine from config: store, LLM client, embedder.
async fn build_engine(config: &ContinuityConfig) -> Result<Arc<Engine>, ContinuityError> {
    let store = open_store(config).await?;

    let llm = match continuity_llm::build_client(&config.llm) {
        Ok(client) => {
            info!(
                provider = config.llm.provider.as_str(),
                model = config.llm.model.as_str(),
                "llm configured"
            );
            Some(client)
        }
        Err(e) => {
            warn!(error = %e, "LLM not configured, extraction disabled");
            None
        }
    };

    let mut engine = Engine::new(store.clone(), llm);
    if let Some(embedder) = configure_embedder(config, &store).await {
        engine.set_embedder(embedder);
    }

    Ok(Arc::new(engine))
}

/// Run the `continuity serve` command.
pub async fn run_serve() -> Result<(), ContinuityError> {
    let config = load()?;
    init_tracing(&config.server.log_level);

    info!("starting continuity serve");

    let engine = build_engine(&config).await?;

    // Startup background work: decay pass + timer, then embedding backfill
    // for any leaf missing a vector or carrying a stale model tag.
    engine.start_decay_timer();
    if engine.embedder().is_some() {
        let backfill_engine = Arc::clone(&engine);
        tokio::spawn(async move {
            match tokio::time::timeout(BACKFILL_DEADLINE, backfill_engine.embed_missing()).await
            {
                Ok(Ok(0)) => {}
                Ok(Ok(embedded)) => info!(embedded, "embedded missing nodes"),
                Ok(Err(e)) => warn!(error = %e, "embedding backfill failed"),
                Err(_) => warn!("embedding backfill timed out"),
            }
        });
    }

    let state = AppState::new(Arc::clone(&engine));
    let app = router(state);

    let addr = config.listen_addr();
    let listener =
        tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| ContinuityError::Internal(format!("bind {addr}: {e}")))?;

    info!(addr = addr.as_str(), db = engine.store().path(), "continuity serving");

    // On SIGINT/SIGTERM the listener drains while the engine's background
    // tasks (decay timer, backfill) are cancelled through its own token.
    let engine_cancel = engine.cancellation_token();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown::wait_for_signal().await;
            engine_cancel.cancel();
        })
        .await
        .map_err(|e| ContinuityError::Internal(format!("server error: {e}")))?;

    info!("continuity serve shutdown complete");
    Ok(())
}

/// Run the `continuity dedup` command.
pub async fn run_dedup(threshold: f64) -> Result<(), ContinuityError> {
    let config = load()?;
    init_tracing(&config.server.log_level);

    let engine = build_engine(&config).await?;
    let removed = engine.dedup(threshold).await?;
    println!("removed {removed} duplicate memories");
    Ok(())
}

/// Run the `continuity search` command (offline `find` against the local
/// store, no server required).
pub async fn run_search(
    query: &str,
    limit: usize,
    category: Option<&str>,
) -> Result<(), ContinuityError> {
    let config = load()?;
    init_tracing(&config.server.log_level);

    let category = match category {
        Some(raw) => Some(
            continuity_core::Category::parse(raw)
                .ok_or_else(|| ContinuityError::Validation(format!("unknown category {raw:?}")))?,
        ),
        None => None,
    };

    let engine = build_engine(&config).await?;
    let Some(embedder) = engine.embedder() else {
        return Err(ContinuityError::Unavailable("embedder".into()));
    };

    let results = continuity_engine::find(
        engine.store(),
        embedder.as_ref(),
        query,
        &SearchOpts { limit, category },
    )
    .await?;

    if results.is_empty() {
        println!("no results");
        return Ok(());
    }
    for result in results {
        println!(
            "{:.3}  {}  {}",
            result.score, result.node.uri, result.node.l0_abstract
        );
    }
    Ok(())
}
