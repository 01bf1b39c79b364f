// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding vector storage: one BLOB row per node, keyed by node id, with
//! the producing model tag recorded alongside so model migration is
//! detectable.

use continuity_core::{ContinuityError, VectorRecord};
use rusqlite::{params, OptionalExtension};

use crate::database::{now_ms, storage_err, Store};

/// Encode a vector as a BLOB of 64-bit little-endian floats.
pub fn encode_embedding(vec: &[f64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(vec.len() * 8);
    for v in vec {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf
}

/// Decode a BLOB back into a vector. Trailing partial floats are dropped.
pub fn decode_embedding(buf: &[u8]) -> Vec<f64> {
    buf.chunks_exact(8)
        .map(|chunk| f64::from_le_bytes(chunk.try_into().expect("chunks_exact(8)")))
        .collect()
}

fn row_to_vector(row: &rusqlite::Row<'_>) -> rusqlite::Result<VectorRecord> {
    let blob: Vec<u8> = row.get(1)?;
    Ok(VectorRecord {
        node_id: row.get(0)?,
        embedding: decode_embedding(&blob),
        model: row.get(2)?,
        dimensions: row.get::<_, i64>(3)? as usize,
        created_at: row.get(4)?,
    })
}

impl Store {
    /// Store or replace the embedding for a node. Replacing swaps the whole
    /// tuple, including the model tag.
    pub async fn save_vector(
        &self,
        node_id: i64,
        embedding: &[f64],
        model: &str,
    ) -> Result<(), ContinuityError> {
        let blob = encode_embedding(embedding);
        let dimensions = embedding.len() as i64;
        let model = model.to_string();
        self.connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO mem_vectors (node_id, embedding, model, dimensions, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(node_id) DO UPDATE SET
                         embedding = excluded.embedding,
                         model = excluded.model,
                         dimensions = excluded.dimensions,
                         created_at = excluded.created_at",
                    params![node_id, blob, model, dimensions, now_ms()],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Embedding for a node, or `None` if not stored.
    pub async fn get_vector(
        &self,
        node_id: i64,
    ) -> Result<Option<VectorRecord>, ContinuityError> {
        self.connection()
            .call(move |conn| {
                let record = conn
                    .query_row(
                        "SELECT node_id, embedding, model, dimensions, created_at
                         FROM mem_vectors WHERE node_id = ?1",
                        [node_id],
                        row_to_vector,
                    )
                    .optional()?;
                Ok(record)
            })
            .await
            .map_err(storage_err)
    }

    /// Every stored vector record.
    pub async fn all_vectors(&self) -> Result<Vec<VectorRecord>, ContinuityError> {
        self.connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT node_id, embedding, model, dimensions, created_at FROM mem_vectors",
                )?;
                let rows = stmt.query_map([], row_to_vector)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(storage_err)
    }

    /// Remove the embedding for a node.
    pub async fn delete_vector(&self, node_id: i64) -> Result<(), ContinuityError> {
        self.connection()
            .call(move |conn| {
                conn.execute("DELETE FROM mem_vectors WHERE node_id = ?1", [node_id])?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use continuity_core::types::{Category, MemNode};

    #[test]
    fn blob_codec_roundtrip() {
        let original = vec![0.1_f64, -0.5, 1.0, 1e-300, 0.0];
        let blob = encode_embedding(&original);
        assert_eq!(blob.len(), original.len() * 8);
        let recovered = decode_embedding(&blob);
        assert_eq!(original, recovered);
    }

    #[test]
    fn decode_drops_trailing_partial() {
        let mut blob = encode_embedding(&[1.0, 2.0]);
        blob.push(0xFF);
        assert_eq!(decode_embedding(&blob), vec![1.0, 2.0]);
    }

    async fn seeded_node(store: &Store) -> MemNode {
        store
            .create_node(MemNode::leaf(
                "mem://user/preferences/vector-test",
                Category::Preferences,
                "Vector test fixture",
                "A fixture node used to exercise vector persistence",
                "",
                "sess-test",
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn save_and_get_vector() {
        let store = Store::open_in_memory().await.unwrap();
        let node = seeded_node(&store).await;

        let embedding: Vec<f64> = (0..64).map(|i| i as f64 / 64.0).collect();
        store
            .save_vector(node.id, &embedding, "tfidf")
            .await
            .unwrap();

        let record = store.get_vector(node.id).await.unwrap().unwrap();
        assert_eq!(record.embedding, embedding);
        assert_eq!(record.model, "tfidf");
        assert_eq!(record.dimensions, 64);
    }

    #[tokio::test]
    async fn save_replaces_whole_tuple() {
        let store = Store::open_in_memory().await.unwrap();
        let node = seeded_node(&store).await;

        store
            .save_vector(node.id, &[1.0, 0.0], "tfidf")
            .await
            .unwrap();
        store
            .save_vector(node.id, &[0.0, 1.0, 0.0], "ollama:nomic-embed-text")
            .await
            .unwrap();

        let record = store.get_vector(node.id).await.unwrap().unwrap();
        assert_eq!(record.model, "ollama:nomic-embed-text");
        assert_eq!(record.dimensions, 3);

        let all = store.all_vectors().await.unwrap();
        assert_eq!(all.len(), 1, "at most one vector per node");
    }

    #[tokio::test]
    async fn delete_vector_removes_record() {
        let store = Store::open_in_memory().await.unwrap();
        let node = seeded_node(&store).await;

        store.save_vector(node.id, &[1.0], "tfidf").await.unwrap();
        store.delete_vector(node.id).await.unwrap();
        assert!(store.get_vector(node.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_node_drops_its_vector() {
        let store = Store::open_in_memory().await.unwrap();
        let node = seeded_node(&store).await;
        store.save_vector(node.id, &[1.0], "tfidf").await.unwrap();

        store.delete_node(node.id).await.unwrap();
        assert!(store.get_vector(node.id).await.unwrap().is_none());
    }
}
