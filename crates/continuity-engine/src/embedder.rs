// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding providers: the Ollama embedding service and a TF-IDF fallback
//! built from the existing corpus, so retrieval works with no external
//! dependency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use continuity_core::{ContinuityError, Embedder};
use continuity_store::Store;
use serde::Deserialize;

/// Default vocabulary size for the TF-IDF fallback.
pub const DEFAULT_TFIDF_TERMS: usize = 512;

/// Cosine similarity of two vectors.
///
/// Returns 0 on length mismatch or empty input. Works on unnormalized
/// vectors too.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    dot / denom
}

/// Lowercase tokenizer: maximal runs of `[a-z0-9_-]`, single-char tokens
/// dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in text.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_' {
            current.push(c);
        } else {
            if current.len() > 1 {
                tokens.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.len() > 1 {
        tokens.push(current);
    }
    tokens
}

fn l2_normalize(vec: &mut [f64]) {
    let sum: f64 = vec.iter().map(|v| v * v).sum();
    if sum == 0.0 {
        return;
    }
    let norm = sum.sqrt();
    for v in vec.iter_mut() {
        *v /= norm;
    }
}

/// Embedder backed by Ollama's embedding API.
pub struct OllamaEmbedder {
    url: String,
    model: String,
    dims: AtomicUsize,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f64>>,
}

impl OllamaEmbedder {
    pub fn new(url: &str, model: &str, dims: usize) -> Result<Self, ContinuityError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ContinuityError::Embedding {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dims: AtomicUsize::new(dims),
            client,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, ContinuityError> {
        let body = serde_json::json!({"model": self.model, "input": text});

        let response = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ContinuityError::Embedding {
                message: format!("ollama embed api: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        let text_body = response
            .text()
            .await
            .map_err(|e| ContinuityError::Embedding {
                message: format!("read embed response: {e}"),
                source: Some(Box::new(e)),
            })?;

        if !status.is_success() {
            return Err(ContinuityError::embedding(format!(
                "ollama embed status {status}: {text_body}"
            )));
        }

        let parsed: EmbedResponse =
            serde_json::from_str(&text_body).map_err(|e| ContinuityError::Embedding {
                message: format!("decode embed response: {e}"),
                source: Some(Box::new(e)),
            })?;

        let Some(embedding) = parsed.embeddings.into_iter().next() else {
            return Err(ContinuityError::embedding("ollama returned no embeddings"));
        };

        self.dims.store(embedding.len(), Ordering::Relaxed);
        Ok(embedding)
    }

    fn model(&self) -> String {
        format!("ollama:{}", self.model)
    }

    fn dimensions(&self) -> usize {
        self.dims.load(Ordering::Relaxed)
    }
}

/// Check whether Ollama is reachable and the embedding model is available.
pub async fn probe_ollama(url: &str, model: &str) -> bool {
    let Ok(client) = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
    else {
        return false;
    };

    let body = serde_json::json!({"model": model, "input": "test"});
    match client
        .post(format!("{}/api/embed", url.trim_end_matches('/')))
        .json(&body)
        .send()
        .await
    {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

/// TF-IDF bag-of-words embedder.
///
/// Vocabulary and IDF tables are frozen at construction from the current
/// corpus of leaf L0 abstracts, so instances are safe to share without
/// locks.
pub struct TfidfEmbedder {
    vocab: Vec<String>,
    idf: HashMap<String, f64>,
    dims: usize,
}

impl TfidfEmbedder {
    /// Build from the store's current leaf abstracts. `max_terms` caps the
    /// vocabulary at the top terms by document frequency (default 512).
    pub async fn build(store: &Store, max_terms: usize) -> Result<Self, ContinuityError> {
        let max_terms = if max_terms == 0 {
            DEFAULT_TFIDF_TERMS
        } else {
            max_terms
        };

        let leaves = store.list_leaves().await?;
        let docs: Vec<&str> = leaves
            .iter()
            .filter(|n| !n.l0_abstract.is_empty())
            .map(|n| n.l0_abstract.as_str())
            .collect();

        Ok(Self::from_documents(&docs, max_terms))
    }

    /// Build directly from documents (exposed for tests).
    pub fn from_documents(docs: &[&str], max_terms: usize) -> Self {
        let mut df: HashMap<String, usize> = HashMap::new();
        for doc in docs {
            let mut seen = std::collections::HashSet::new();
            for term in tokenize(doc) {
                if seen.insert(term.clone()) {
                    *df.entry(term).or_insert(0) += 1;
                }
            }
        }

        let mut terms: Vec<(String, usize)> = df.into_iter().collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let dims = terms.len().min(max_terms).max(1);

        let num_docs = (docs.len().max(1)) as f64;
        let mut vocab = Vec::with_capacity(dims);
        let mut idf = HashMap::with_capacity(dims);
        for (term, freq) in terms.into_iter().take(dims) {
            // Smoothed IDF: ln(N/df) + 1.
            idf.insert(term.clone(), (num_docs / freq as f64).ln() + 1.0);
            vocab.push(term);
        }

        Self { vocab, idf, dims }
    }
}

#[async_trait]
impl Embedder for TfidfEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, ContinuityError> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Ok(vec![0.0; self.dims]);
        }

        let mut tf: HashMap<&str, usize> = HashMap::new();
        for token in &tokens {
            *tf.entry(token.as_str()).or_insert(0) += 1;
        }
        let max_tf = tf.values().copied().max().unwrap_or(1) as f64;

        let mut vec = vec![0.0; self.dims];
        for (i, term) in self.vocab.iter().enumerate() {
            let count = tf.get(term.as_str()).copied().unwrap_or(0);
            if count == 0 {
                continue;
            }
            // Augmented TF damps the bias towards longer documents.
            let aug_tf = 0.5 + 0.5 * count as f64 / max_tf;
            let idf = self.idf.get(term).copied().unwrap_or(1.0);
            vec[i] = aug_tf * idf;
        }

        l2_normalize(&mut vec);
        Ok(vec)
    }

    fn model(&self) -> String {
        "tfidf".to_string()
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}
