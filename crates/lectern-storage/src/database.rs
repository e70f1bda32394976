// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection management: PRAGMA setup, WAL mode, and migrations.
//!
//! All statements run on tokio-rusqlite's single background thread, which
//! makes [`Database`] the only writer. Do not open a second connection for
//! writes.

use std::path::Path;
use std::time::Duration;

use lectern_core::LecternError;
use tracing::debug;

use crate::migrations;

/// Handle to the SQLite database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path`, applies PRAGMAs
    /// and runs pending migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, LecternError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(LecternError::storage)?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| LecternError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.configure(wal_mode).await?;
        migrations::run(&db).await?;
        debug!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// Opens a private in-memory database with the full schema.
    pub async fn open_in_memory() -> Result<Self, LecternError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| LecternError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.configure(false).await?;
        migrations::run(&db).await?;
        Ok(db)
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    async fn configure(&self, wal_mode: bool) -> Result<(), LecternError> {
        self.conn
            .call(move |conn| {
                if wal_mode {
                    let mode: String = conn.pragma_update_and_check(
                        None,
                        "journal_mode",
                        "WAL",
                        |row| row.get(0),
                    )?;
                    debug!(%mode, "journal mode set");
                }
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                conn.pragma_update(None, "foreign_keys", "ON")?;
                conn.busy_timeout(Duration::from_secs(5))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Flushes the WAL into the main file.
    pub async fn checkpoint(&self) -> Result<(), LecternError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Maps a tokio-rusqlite failure to a storage error.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> LecternError {
    LecternError::Storage {
        source: Box::new(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_parent_dirs_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/lectern.db");
        let db = Database::open(path.to_str().unwrap(), true).await.unwrap();

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();

        for table in ["chats", "daily_limits", "messages", "users"] {
            assert!(tables.iter().any(|t| t == table), "missing {table}: {tables:?}");
        }
        assert!(path.exists());
    }

    #[tokio::test]
    async fn reopening_does_not_rerun_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lectern.db");
        let path = path.to_str().unwrap();
        drop(Database::open(path, true).await.unwrap());
        let db = Database::open(path, true).await.unwrap();
        db.checkpoint().await.unwrap();
    }
}
