// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offline near-duplicate collapse across each category.

use std::collections::{HashMap, HashSet};

use continuity_core::types::{Category, MemNode};
use continuity_core::ContinuityError;
use tracing::{info, warn};

use crate::embedder::cosine_similarity;
use crate::engine::Engine;

/// Default cosine threshold for considering two leaves duplicates.
pub const DEDUP_THRESHOLD: f64 = 0.65;

impl Engine {
    /// Collapse semantically duplicate leaves.
    ///
    /// Per category: ensure every leaf with an abstract has a vector under
    /// the current model, agglomerate clusters above `threshold`, keep the
    /// most recently updated member of each cluster, delete the rest. Ends
    /// with an orphan-directory sweep. Returns the number of leaves
    /// removed.
    pub async fn dedup(&self, threshold: f64) -> Result<usize, ContinuityError> {
        let Some(embedder) = self.embedder() else {
            return Err(ContinuityError::Unavailable("embedder".into()));
        };

        let leaves = self.store().list_leaves().await?;

        // Embed any leaves missing vectors first.
        for leaf in &leaves {
            if leaf.l0_abstract.is_empty() {
                continue;
            }
            if self.store().get_vector(leaf.id).await?.is_some() {
                continue;
            }
            match embedder.embed(&leaf.l0_abstract).await {
                Ok(vec) => {
                    self.store()
                        .save_vector(leaf.id, &vec, &embedder.model())
                        .await?;
                }
                Err(e) => warn!(uri = leaf.uri.as_str(), error = %e, "dedup: embed"),
            }
        }

        let vectors = self.store().all_vectors().await?;
        let vec_map: HashMap<i64, Vec<f64>> = vectors
            .into_iter()
            .map(|v| (v.node_id, v.embedding))
            .collect();

        let mut by_category: HashMap<Category, Vec<&MemNode>> = HashMap::new();
        for leaf in &leaves {
            by_category.entry(leaf.category).or_default().push(leaf);
        }

        let mut removed = 0;
        for (category, nodes) in &by_category {
            let mut claimed: HashSet<i64> = HashSet::new();

            for i in 0..nodes.len() {
                if claimed.contains(&nodes[i].id) {
                    continue;
                }
                let Some(vec_i) = vec_map.get(&nodes[i].id) else {
                    continue;
                };

                // Agglomerate: unclaimed later nodes above the threshold.
                let mut cluster = vec![i];
                for (j, node_j) in nodes.iter().enumerate().skip(i + 1) {
                    if claimed.contains(&node_j.id) {
                        continue;
                    }
                    let Some(vec_j) = vec_map.get(&node_j.id) else {
                        continue;
                    };
                    if cosine_similarity(vec_i, vec_j) >= threshold {
                        cluster.push(j);
                    }
                }

                if cluster.len() <= 1 {
                    continue;
                }

                // Keep the most recently updated member.
                let keeper = *cluster
                    .iter()
                    .max_by_key(|&&idx| nodes[idx].updated_at)
                    .expect("non-empty cluster");

                for &idx in &cluster {
                    claimed.insert(nodes[idx].id);
                    if idx == keeper {
                        continue;
                    }
                    info!(
                        removing = nodes[idx].uri.as_str(),
                        duplicate_of = nodes[keeper].uri.as_str(),
                        category = %category,
                        "dedup: removing near-duplicate"
                    );
                    if let Err(e) = self.store().delete_node(nodes[idx].id).await {
                        warn!(uri = nodes[idx].uri.as_str(), error = %e, "dedup: delete");
                        continue;
                    }
                    removed += 1;
                }
            }
        }

        match self.store().delete_orphan_dirs().await {
            Ok(0) => {}
            Ok(orphans) => info!(orphans, "dedup: removed orphaned directory nodes"),
            Err(e) => warn!(error = %e, "dedup: orphan dir cleanup"),
        }

        Ok(removed)
    }
}
