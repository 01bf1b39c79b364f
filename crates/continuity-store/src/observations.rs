// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only observation ledger for captured tool uses.

use continuity_core::{ContinuityError, Observation};
use rusqlite::params;

use crate::database::{now_ms, storage_err, Store};

/// Maximum stored size of `tool_response`. Extraction reads the full
/// transcript anyway, so anything larger is truncated at ingest.
const MAX_TOOL_RESPONSE_BYTES: usize = 10 * 1024;

/// Byte-truncate without splitting a UTF-8 code point.
fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn row_to_observation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Observation> {
    Ok(Observation {
        id: row.get(0)?,
        session_id: row.get(1)?,
        tool_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        tool_input: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        tool_response: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        created_at: row.get(5)?,
    })
}

impl Store {
    /// Record a tool use. `tool_response` is truncated to 10 KiB.
    pub async fn add_observation(
        &self,
        session_id: &str,
        tool_name: &str,
        tool_input: &str,
        tool_response: &str,
    ) -> Result<(), ContinuityError> {
        let session_id = session_id.to_string();
        let tool_name = tool_name.to_string();
        let tool_input = tool_input.to_string();
        let tool_response = truncate_utf8(tool_response, MAX_TOOL_RESPONSE_BYTES).to_string();
        self.connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO observations (session_id, tool_name, tool_input, tool_response, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![session_id, tool_name, tool_input, tool_response, now_ms()],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// All observations for a session, oldest first.
    pub async fn get_observations(
        &self,
        session_id: &str,
    ) -> Result<Vec<Observation>, ContinuityError> {
        let session_id = session_id.to_string();
        self.connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, session_id, tool_name, tool_input, tool_response, created_at
                     FROM observations WHERE session_id = ?1 ORDER BY created_at",
                )?;
                let rows = stmt.query_map([session_id], row_to_observation)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(storage_err)
    }

    /// Most recent observations across all sessions.
    pub async fn get_recent_observations(
        &self,
        limit: usize,
    ) -> Result<Vec<Observation>, ContinuityError> {
        self.connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, session_id, tool_name, tool_input, tool_response, created_at
                     FROM observations ORDER BY created_at DESC LIMIT ?1",
                )?;
                let rows = stmt.query_map([limit as i64], row_to_observation)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(storage_err)
    }

    /// Number of observations recorded for a session.
    pub async fn get_session_observation_count(
        &self,
        session_id: &str,
    ) -> Result<i64, ContinuityError> {
        let session_id = session_id.to_string();
        self.connection()
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM observations WHERE session_id = ?1",
                    [session_id],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
            .map_err(storage_err)
    }
}
