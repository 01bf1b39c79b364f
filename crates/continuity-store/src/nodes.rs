// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory tree node operations: CRUD, upsert with merge discipline, lazy
//! parent directories, retrieval touch, and relevance decay.

use std::collections::HashSet;

use continuity_core::types::{Category, MemNode, NodeType};
use continuity_core::{uri as mem_uri, ContinuityError, RELATIONAL_URI};
use rusqlite::{params, OptionalExtension};
use tracing::{debug, warn};

use crate::database::{now_ms, storage_err, Store};

/// 90-day half-life for relevance decay, in milliseconds.
const DECAY_HALF_LIFE_MS: f64 = 90.0 * 24.0 * 60.0 * 60.0 * 1000.0;

/// Relevance never decays below this floor.
const RELEVANCE_FLOOR: f64 = 0.1;

const NODE_COLUMNS: &str = "id, uri, parent_uri, node_type, category, l0_abstract, l1_overview, \
     l2_content, mergeable, merged_from, relevance, last_access, access_count, source_session, \
     created_at, updated_at";

/// True if two strings are >95% similar by shared character-bigram Jaccard.
/// Intentionally cheap; no embeddings at the store layer.
pub(crate) fn text_near_identical(a: &str, b: &str) -> bool {
    let a = a.trim();
    let b = b.trim();
    if a == b {
        return true;
    }
    if a.is_empty() || b.is_empty() {
        return false;
    }

    let bigrams_a = bigrams(a);
    let bigrams_b = bigrams(b);
    if bigrams_a.is_empty() || bigrams_b.is_empty() {
        return a == b;
    }

    let shared = bigrams_a.intersection(&bigrams_b).count();
    let union = bigrams_a.len() + bigrams_b.len() - shared;
    if union == 0 {
        return true;
    }

    shared as f64 / union as f64 > 0.95
}

fn bigrams(s: &str) -> HashSet<[u8; 2]> {
    s.as_bytes()
        .windows(2)
        .map(|w| [w[0], w[1]])
        .collect()
}

fn row_to_node(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemNode> {
    let node_type: String = row.get(3)?;
    let category: String = row.get(4)?;
    Ok(MemNode {
        id: row.get(0)?,
        uri: row.get(1)?,
        parent_uri: row.get(2)?,
        node_type: NodeType::parse(&node_type).unwrap_or(NodeType::Leaf),
        category: Category::parse(&category).unwrap_or(Category::Session),
        l0_abstract: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        l1_overview: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        l2_content: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        mergeable: row.get::<_, i64>(8)? != 0,
        merged_from: row.get(9)?,
        relevance: row.get(10)?,
        last_access: row.get(11)?,
        access_count: row.get(12)?,
        source_session: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn get_by_uri_sync(
    conn: &rusqlite::Connection,
    uri: &str,
) -> rusqlite::Result<Option<MemNode>> {
    conn.query_row(
        &format!("SELECT {NODE_COLUMNS} FROM mem_nodes WHERE uri = ?1"),
        [uri],
        row_to_node,
    )
    .optional()
}

/// Create directory nodes covering every ancestor of the given URI.
/// Idempotent; existing directories are left untouched.
fn ensure_parent_dirs_sync(
    conn: &rusqlite::Connection,
    uri: &str,
    category: Category,
) -> rusqlite::Result<()> {
    let segs = mem_uri::segments(uri);
    if segs.len() <= 1 {
        return Ok(());
    }

    let now = now_ms();
    for i in 1..segs.len() {
        let dir_uri = mem_uri::join(&segs[..i]);
        let parent = if i > 1 {
            Some(mem_uri::join(&segs[..i - 1]))
        } else {
            None
        };

        conn.execute(
            "INSERT OR IGNORE INTO mem_nodes (uri, parent_uri, node_type, category, relevance, created_at, updated_at)
             VALUES (?1, ?2, 'dir', ?3, 1.0, ?4, ?5)",
            params![dir_uri, parent, category.as_str(), now, now],
        )?;
    }
    Ok(())
}

fn create_node_sync(
    conn: &rusqlite::Connection,
    mut node: MemNode,
) -> rusqlite::Result<MemNode> {
    let now = now_ms();
    ensure_parent_dirs_sync(conn, &node.uri, node.category)?;

    let parent_uri = mem_uri::parent_of(&node.uri);
    let mergeable = node.category.is_mergeable();

    conn.execute(
        "INSERT INTO mem_nodes (uri, parent_uri, node_type, category, l0_abstract, l1_overview, l2_content,
             mergeable, merged_from, relevance, last_access, access_count, source_session, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1.0, ?10, 0, ?11, ?12, ?13)",
        params![
            node.uri,
            parent_uri,
            node.node_type.as_str(),
            node.category.as_str(),
            node.l0_abstract,
            node.l1_overview,
            node.l2_content,
            mergeable as i64,
            node.merged_from,
            now,
            node.source_session,
            now,
            now,
        ],
    )?;

    node.id = conn.last_insert_rowid();
    node.parent_uri = parent_uri;
    node.mergeable = mergeable;
    node.relevance = 1.0;
    node.last_access = Some(now);
    node.access_count = 0;
    node.created_at = now;
    node.updated_at = now;
    Ok(node)
}

fn update_node_sync(
    conn: &rusqlite::Connection,
    mut node: MemNode,
) -> rusqlite::Result<MemNode> {
    let now = now_ms();
    conn.execute(
        "UPDATE mem_nodes SET l0_abstract = ?1, l1_overview = ?2, l2_content = ?3,
             merged_from = ?4, source_session = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            node.l0_abstract,
            node.l1_overview,
            node.l2_content,
            node.merged_from,
            node.source_session,
            now,
            node.id,
        ],
    )?;
    node.updated_at = now;
    Ok(node)
}

impl Store {
    /// Insert a new node, lazily creating parent directories.
    pub async fn create_node(&self, node: MemNode) -> Result<MemNode, ContinuityError> {
        self.connection()
            .call(move |conn| Ok(create_node_sync(conn, node)?))
            .await
            .map_err(storage_err)
    }

    /// Update a node's content tiers and `updated_at` in place.
    pub async fn update_node(&self, node: MemNode) -> Result<MemNode, ContinuityError> {
        self.connection()
            .call(move |conn| Ok(update_node_sync(conn, node)?))
            .await
            .map_err(storage_err)
    }

    /// Create a new node or merge into an existing one at the same URI.
    ///
    /// Mergeable categories update in place unless the new `(l0, l1)` is
    /// near-identical to the stored values (churn suppression). Immutable
    /// categories get a fresh URI suffixed with the current millisecond
    /// timestamp. Returns the stored node with its final URI and id.
    pub async fn upsert_node(&self, node: MemNode) -> Result<MemNode, ContinuityError> {
        self.connection()
            .call(move |conn| {
                let existing = get_by_uri_sync(conn, &node.uri)?;

                let Some(existing) = existing else {
                    return Ok(create_node_sync(conn, node)?);
                };

                if existing.mergeable {
                    if text_near_identical(&existing.l1_overview, &node.l1_overview)
                        && text_near_identical(&existing.l0_abstract, &node.l0_abstract)
                    {
                        debug!(uri = existing.uri.as_str(), "upsert elided: near-identical content");
                        return Ok(existing);
                    }
                    let mut merged = existing;
                    merged.l0_abstract = node.l0_abstract;
                    merged.l1_overview = node.l1_overview;
                    merged.l2_content = node.l2_content;
                    merged.source_session = node.source_session;
                    return Ok(update_node_sync(conn, merged)?);
                }

                // Immutable: create as a new node with a deduplicated URI.
                let mut fresh = node;
                fresh.uri = format!("{}-{}", fresh.uri, now_ms());
                Ok(create_node_sync(conn, fresh)?)
            })
            .await
            .map_err(storage_err)
    }

    /// Node by URI, or `None` if not found.
    pub async fn get_node_by_uri(
        &self,
        uri: &str,
    ) -> Result<Option<MemNode>, ContinuityError> {
        let uri = uri.to_string();
        self.connection()
            .call(move |conn| Ok(get_by_uri_sync(conn, &uri)?))
            .await
            .map_err(storage_err)
    }

    /// Node by database id, or `None` if not found.
    pub async fn get_node_by_id(&self, id: i64) -> Result<Option<MemNode>, ContinuityError> {
        self.connection()
            .call(move |conn| {
                let node = conn
                    .query_row(
                        &format!("SELECT {NODE_COLUMNS} FROM mem_nodes WHERE id = ?1"),
                        [id],
                        row_to_node,
                    )
                    .optional()?;
                Ok(node)
            })
            .await
            .map_err(storage_err)
    }

    /// Batch node lookup after vector search.
    pub async fn get_nodes_by_ids(
        &self,
        ids: &[i64],
    ) -> Result<Vec<MemNode>, ContinuityError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();
        self.connection()
            .call(move |conn| {
                let placeholders: Vec<String> =
                    (1..=ids.len()).map(|i| format!("?{i}")).collect();
                let sql = format!(
                    "SELECT {NODE_COLUMNS} FROM mem_nodes WHERE id IN ({})",
                    placeholders.join(", ")
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(
                    rusqlite::params_from_iter(ids.iter()),
                    row_to_node,
                )?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(storage_err)
    }

    /// All leaf nodes for a category, ordered by relevance descending.
    pub async fn find_by_category(
        &self,
        category: Category,
    ) -> Result<Vec<MemNode>, ContinuityError> {
        self.connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {NODE_COLUMNS} FROM mem_nodes
                     WHERE category = ?1 AND node_type = 'leaf'
                     ORDER BY relevance DESC"
                ))?;
                let rows = stmt.query_map([category.as_str()], row_to_node)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(storage_err)
    }

    /// All leaf nodes, ordered by relevance descending.
    pub async fn list_leaves(&self) -> Result<Vec<MemNode>, ContinuityError> {
        self.connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {NODE_COLUMNS} FROM mem_nodes
                     WHERE node_type = 'leaf' ORDER BY relevance DESC"
                ))?;
                let rows = stmt.query_map([], row_to_node)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(storage_err)
    }

    /// Top-level nodes (no parent), ordered by URI.
    pub async fn list_roots(&self) -> Result<Vec<MemNode>, ContinuityError> {
        self.connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {NODE_COLUMNS} FROM mem_nodes
                     WHERE parent_uri IS NULL ORDER BY uri"
                ))?;
                let rows = stmt.query_map([], row_to_node)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(storage_err)
    }

    /// Direct children of a parent URI, ordered by URI.
    pub async fn get_children(
        &self,
        parent_uri: &str,
    ) -> Result<Vec<MemNode>, ContinuityError> {
        let parent_uri = parent_uri.to_string();
        self.connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {NODE_COLUMNS} FROM mem_nodes
                     WHERE parent_uri = ?1 ORDER BY uri"
                ))?;
                let rows = stmt.query_map([parent_uri], row_to_node)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(storage_err)
    }

    /// Number of direct children of a parent URI.
    pub async fn count_children(&self, parent_uri: &str) -> Result<i64, ContinuityError> {
        let parent_uri = parent_uri.to_string();
        self.connection()
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM mem_nodes WHERE parent_uri = ?1",
                    [parent_uri],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
            .map_err(storage_err)
    }

    /// Idempotent directory creation for all ancestors of a URI.
    pub async fn ensure_parent_dirs(
        &self,
        uri: &str,
        category: Category,
    ) -> Result<(), ContinuityError> {
        let uri = uri.to_string();
        self.connection()
            .call(move |conn| Ok(ensure_parent_dirs_sync(conn, &uri, category)?))
            .await
            .map_err(storage_err)
    }

    /// Retrieval boost: `last_access = now`, `access_count += 1`,
    /// `relevance = 1.0`, atomically.
    pub async fn touch_node(&self, uri: &str) -> Result<(), ContinuityError> {
        let uri = uri.to_string();
        self.connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE mem_nodes
                     SET last_access = ?1, access_count = access_count + 1, relevance = 1.0
                     WHERE uri = ?2",
                    params![now_ms(), uri],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Apply time-based decay to all non-exempt leaves.
    ///
    /// `new = max(0.1, 0.5^(elapsed / 90d))` from `last_access` (falling
    /// back to `created_at`); relevance only ever decreases here. The
    /// relational profile is exempt. Per-node failures are logged and
    /// skipped. Returns the number of nodes updated.
    pub async fn decay_all_nodes(&self) -> Result<usize, ContinuityError> {
        self.connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, relevance, last_access, created_at FROM mem_nodes
                     WHERE node_type = 'leaf' AND uri != ?1",
                )?;
                let targets = stmt
                    .query_map([RELATIONAL_URI], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, f64>(1)?,
                            row.get::<_, Option<i64>>(2)?,
                            row.get::<_, i64>(3)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                let now = now_ms();
                let mut updated = 0;

                for (id, relevance, last_access, created_at) in targets {
                    let reference = last_access.unwrap_or(created_at);
                    let elapsed = (now - reference) as f64;
                    if elapsed <= 0.0 {
                        continue;
                    }

                    let decayed = 0.5_f64.powf(elapsed / DECAY_HALF_LIFE_MS);
                    let new_relevance = decayed.max(RELEVANCE_FLOOR);
                    if new_relevance >= relevance {
                        continue; // relevance can only decrease via decay
                    }

                    match conn.execute(
                        "UPDATE mem_nodes SET relevance = ?1 WHERE id = ?2",
                        params![new_relevance, id],
                    ) {
                        Ok(_) => updated += 1,
                        Err(e) => warn!(node_id = id, error = %e, "decay update failed"),
                    }
                }

                Ok(updated)
            })
            .await
            .map_err(storage_err)
    }

    /// Remove a node and its embedding.
    pub async fn delete_node(&self, id: i64) -> Result<(), ContinuityError> {
        self.connection()
            .call(move |conn| {
                conn.execute("DELETE FROM mem_vectors WHERE node_id = ?1", [id])?;
                conn.execute("DELETE FROM mem_nodes WHERE id = ?1", [id])?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Remove directory nodes that have no remaining children.
    pub async fn delete_orphan_dirs(&self) -> Result<usize, ContinuityError> {
        self.connection()
            .call(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM mem_nodes WHERE node_type = 'dir'
                     AND id NOT IN (
                         SELECT DISTINCT p.id FROM mem_nodes p
                         JOIN mem_nodes c ON c.parent_uri = p.uri
                     )",
                    [],
                )?;
                Ok(removed)
            })
            .await
            .map_err(storage_err)
    }
}
