// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and
//! migrations.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use std::path::{Path, PathBuf};

use continuity_core::ContinuityError;
use tokio_rusqlite::Connection;

use crate::migrations;

/// Convert a tokio_rusqlite error into `ContinuityError::Storage`.
pub(crate) fn storage_err(e: tokio_rusqlite::Error) -> ContinuityError {
    ContinuityError::Storage {
        source: Box::new(e),
    }
}

/// Current time as epoch milliseconds. Every stored timestamp uses this.
pub(crate) fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Default database path: `~/.continuity/continuity.db`.
pub fn default_db_path() -> Result<PathBuf, ContinuityError> {
    let home = dirs::home_dir()
        .ok_or_else(|| ContinuityError::Config("cannot resolve home directory".into()))?;
    Ok(home.join(".continuity").join("continuity.db"))
}

/// Handle to the continuity SQLite database.
///
/// Cheap to clone; all clones share one serialized connection.
#[derive(Clone)]
pub struct Store {
    conn: Connection,
    path: String,
}

impl Store {
    /// Open (or create) the database at the given path, configure pragmas,
    /// and run migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Store, ContinuityError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| ContinuityError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = Connection::open(path.to_path_buf())
            .await
            .map_err(storage_err)?;
        let store = Store {
            conn,
            path: path.display().to_string(),
        };
        store.initialize().await?;
        Ok(store)
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Store, ContinuityError> {
        let conn = Connection::open_in_memory().await.map_err(storage_err)?;
        let store = Store {
            conn,
            path: ":memory:".to_string(),
        };
        store.initialize().await?;
        Ok(store)
    }

    async fn initialize(&self) -> Result<(), ContinuityError> {
        self.conn
            .call(|conn| {
                // journal_mode returns a row, so plain execute would balk.
                conn.pragma_update(None, "journal_mode", "WAL")?;
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                conn.pragma_update(None, "foreign_keys", "ON")?;
                conn.pragma_update(None, "busy_timeout", 5000)?;
                migrations::migrate(conn)?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Path of the underlying database file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Verify the connection is alive.
    pub async fn ping(&self) -> Result<(), ContinuityError> {
        self.conn
            .call(|conn| {
                conn.query_row("SELECT 1", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Current schema version.
    pub async fn schema_version(&self) -> Result<i64, ContinuityError> {
        self.conn
            .call(|conn| {
                let version: i64 = conn.query_row(
                    "SELECT COALESCE(MAX(version), 0) FROM schema_versions",
                    [],
                    |row| row.get(0),
                )?;
                Ok(version)
            })
            .await
            .map_err(storage_err)
    }

    /// Direct access to the serialized connection, for maintenance queries
    /// and test fixtures. Application code goes through the typed
    /// operations instead.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_parent_dirs_and_migrates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("continuity.db");
        let store = Store::open(&path).await.unwrap();

        assert!(path.exists());
        assert_eq!(
            store.schema_version().await.unwrap(),
            migrations::MIGRATIONS.last().unwrap().version
        );
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn in_memory_store_migrates() {
        let store = Store::open_in_memory().await.unwrap();
        assert_eq!(store.path(), ":memory:");
        assert!(store.schema_version().await.unwrap() >= 4);
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("continuity.db");
        {
            let store = Store::open(&path).await.unwrap();
            store.ping().await.unwrap();
        }
        let store = Store::open(&path).await.unwrap();
        store.ping().await.unwrap();
    }
}
