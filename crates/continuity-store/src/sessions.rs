// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session ledger: init/resume, completion, and the extraction gate.

use continuity_core::types::{Session, SessionStatus};
use continuity_core::ContinuityError;
use rusqlite::{params, OptionalExtension};

use crate::database::{now_ms, storage_err, Store};

const SESSION_COLUMNS: &str =
    "id, session_id, project, started_at, ended_at, status, message_count, tool_count, extracted_at";

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let status: String = row.get(5)?;
    Ok(Session {
        id: row.get(0)?,
        session_id: row.get(1)?,
        project: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        started_at: row.get(3)?,
        ended_at: row.get(4)?,
        status: SessionStatus::parse(&status).unwrap_or(SessionStatus::Active),
        message_count: row.get(6)?,
        tool_count: row.get(7)?,
        extracted_at: row.get(8)?,
    })
}

fn get_session_sync(
    conn: &rusqlite::Connection,
    session_id: &str,
) -> rusqlite::Result<Option<Session>> {
    conn.query_row(
        &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1"),
        [session_id],
        row_to_session,
    )
    .optional()
}

impl Store {
    /// Create or resume a session.
    ///
    /// An existing active session is returned as-is; a completed or failed
    /// one is reactivated (status back to active, `ended_at` cleared); a
    /// new row is created otherwise.
    pub async fn init_session(
        &self,
        session_id: &str,
        project: &str,
    ) -> Result<Session, ContinuityError> {
        let session_id = session_id.to_string();
        let project = project.to_string();
        self.connection()
            .call(move |conn| {
                if let Some(existing) = get_session_sync(conn, &session_id)? {
                    if existing.status == SessionStatus::Active {
                        return Ok(existing);
                    }
                    conn.execute(
                        "UPDATE sessions SET status = 'active', ended_at = NULL
                         WHERE session_id = ?1",
                        [&session_id],
                    )?;
                    let reactivated =
                        get_session_sync(conn, &session_id)?.ok_or_else(|| {
                            tokio_rusqlite::Error::Other(
                                format!("session {session_id} vanished during reactivation")
                                    .into(),
                            )
                        })?;
                    return Ok(reactivated);
                }

                let now = now_ms();
                conn.execute(
                    "INSERT INTO sessions (session_id, project, started_at, status)
                     VALUES (?1, ?2, ?3, 'active')",
                    params![session_id, project, now],
                )?;
                Ok(Session {
                    id: conn.last_insert_rowid(),
                    session_id,
                    project,
                    started_at: now,
                    ended_at: None,
                    status: SessionStatus::Active,
                    message_count: 0,
                    tool_count: 0,
                    extracted_at: None,
                })
            })
            .await
            .map_err(storage_err)
    }

    /// Session by its external id, or `None` if unknown.
    pub async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Session>, ContinuityError> {
        let session_id = session_id.to_string();
        self.connection()
            .call(move |conn| Ok(get_session_sync(conn, &session_id)?))
            .await
            .map_err(storage_err)
    }

    /// Mark a session as completed (Stop hook). Errors when no active
    /// session exists; the HTTP layer downgrades that to a soft success.
    pub async fn complete_session(&self, session_id: &str) -> Result<(), ContinuityError> {
        let session_id = session_id.to_string();
        self.connection()
            .call(move |conn| {
                let rows = conn.execute(
                    "UPDATE sessions SET status = 'completed', ended_at = ?1
                     WHERE session_id = ?2 AND status = 'active'",
                    params![now_ms(), session_id],
                )?;
                if rows == 0 {
                    return Err(tokio_rusqlite::Error::Other(
                        format!("no active session found for {session_id}").into(),
                    ));
                }
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Finalize a session (SessionEnd hook). Completes it if still active;
    /// a no-op otherwise.
    pub async fn end_session(&self, session_id: &str) -> Result<(), ContinuityError> {
        let session_id = session_id.to_string();
        self.connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE sessions SET status = 'completed', ended_at = COALESCE(ended_at, ?1)
                     WHERE session_id = ?2 AND status = 'active'",
                    params![now_ms(), session_id],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Most recent sessions by start time.
    pub async fn get_recent_sessions(
        &self,
        limit: usize,
    ) -> Result<Vec<Session>, ContinuityError> {
        self.connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions
                     ORDER BY started_at DESC LIMIT ?1"
                ))?;
                let rows = stmt.query_map([limit as i64], row_to_session)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(storage_err)
    }

    /// Set `extracted_at`, preventing duplicate extraction.
    pub async fn mark_extracted(&self, session_id: &str) -> Result<(), ContinuityError> {
        let session_id = session_id.to_string();
        self.connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE sessions SET extracted_at = ?1 WHERE session_id = ?2",
                    params![now_ms(), session_id],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Bump the tool counter of an active session.
    pub async fn increment_tool_count(&self, session_id: &str) -> Result<(), ContinuityError> {
        let session_id = session_id.to_string();
        self.connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE sessions SET tool_count = tool_count + 1
                     WHERE session_id = ?1 AND status = 'active'",
                    [session_id],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_creates_then_resumes() {
        let store = Store::open_in_memory().await.unwrap();
        let first = store.init_session("s1", "/tmp/project").await.unwrap();
        assert_eq!(first.status, SessionStatus::Active);
        assert_eq!(first.project, "/tmp/project");

        let resumed = store.init_session("s1", "/tmp/project").await.unwrap();
        assert_eq!(resumed.id, first.id);
        assert_eq!(resumed.started_at, first.started_at);
    }

    #[tokio::test]
    async fn init_reactivates_completed_session() {
        let store = Store::open_in_memory().await.unwrap();
        store.init_session("s1", "/tmp/p").await.unwrap();
        store.complete_session("s1").await.unwrap();

        let reactivated = store.init_session("s1", "/tmp/p").await.unwrap();
        assert_eq!(reactivated.status, SessionStatus::Active);
        assert!(reactivated.ended_at.is_none());
    }

    #[tokio::test]
    async fn complete_requires_active_session() {
        let store = Store::open_in_memory().await.unwrap();
        store.init_session("s1", "/tmp/p").await.unwrap();

        store.complete_session("s1").await.unwrap();
        let sess = store.get_session("s1").await.unwrap().unwrap();
        assert_eq!(sess.status, SessionStatus::Completed);
        assert!(sess.ended_at.is_some());

        // Second completion has no active session to act on.
        assert!(store.complete_session("s1").await.is_err());
        assert!(store.complete_session("never-existed").await.is_err());
    }

    #[tokio::test]
    async fn end_session_is_idempotent() {
        let store = Store::open_in_memory().await.unwrap();
        store.init_session("s1", "/tmp/p").await.unwrap();

        store.end_session("s1").await.unwrap();
        store.end_session("s1").await.unwrap();
        store.end_session("unknown").await.unwrap();

        let sess = store.get_session("s1").await.unwrap().unwrap();
        assert_eq!(sess.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn recent_sessions_ordered_by_start() {
        let store = Store::open_in_memory().await.unwrap();
        for i in 0..4 {
            store
                .init_session(&format!("s{i}"), "/tmp/p")
                .await
                .unwrap();
            // Spread the start timestamps.
            let id = format!("s{i}");
            let started = now_ms() + i;
            store
                .connection()
                .call(move |conn| {
                    conn.execute(
                        "UPDATE sessions SET started_at = ?1 WHERE session_id = ?2",
                        params![started, id],
                    )?;
                    Ok(())
                })
                .await
                .unwrap();
        }

        let recent = store.get_recent_sessions(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].session_id, "s3");
        assert_eq!(recent[1].session_id, "s2");
    }

    #[tokio::test]
    async fn extraction_gate() {
        let store = Store::open_in_memory().await.unwrap();
        store.init_session("s1", "/tmp/p").await.unwrap();

        let before = store.get_session("s1").await.unwrap().unwrap();
        assert!(before.extracted_at.is_none());

        store.mark_extracted("s1").await.unwrap();
        let after = store.get_session("s1").await.unwrap().unwrap();
        assert!(after.extracted_at.is_some());
    }

    #[tokio::test]
    async fn tool_count_only_increments_active() {
        let store = Store::open_in_memory().await.unwrap();
        store.init_session("s1", "/tmp/p").await.unwrap();

        store.increment_tool_count("s1").await.unwrap();
        store.increment_tool_count("s1").await.unwrap();
        store.complete_session("s1").await.unwrap();
        store.increment_tool_count("s1").await.unwrap();

        let sess = store.get_session("s1").await.unwrap().unwrap();
        assert_eq!(sess.tool_count, 2);
    }
}
