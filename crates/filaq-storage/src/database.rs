// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. The [`Database`] struct IS the single writer: query modules accept
//! `&Database` and go through `connection().call()`. Do NOT create additional
//! Connection instances for writes.

use std::path::Path;

use serde::Serialize;
use tokio_rusqlite::Connection;
use tracing::debug;

use filaq_core::FilaqError;

/// Handle to the SQLite database.
///
/// Cloning the inner [`Connection`] is cheap; all clones share the same
/// background writer thread.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

/// Map a tokio-rusqlite error into the crate error type.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> FilaqError {
    FilaqError::Storage {
        source: Box::new(e),
    }
}

/// Schema presence report backing the storage health probe.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaReport {
    pub has_tickets: bool,
    pub has_counters: bool,
    pub has_ticket_number: bool,
}

impl SchemaReport {
    pub fn is_healthy(&self) -> bool {
        self.has_tickets && self.has_counters && self.has_ticket_number
    }
}

impl Database {
    /// Open (or create) the database at `path` with WAL mode enabled and run
    /// any pending migrations.
    pub async fn open(path: &str) -> Result<Self, FilaqError> {
        Self::open_with_options(path, true).await
    }

    /// Open (or create) the database at `path`, optionally in WAL mode.
    pub async fn open_with_options(path: &str, wal_mode: bool) -> Result<Self, FilaqError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| FilaqError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = Connection::open(path).await.map_err(|e| FilaqError::Storage {
            source: Box::new(e),
        })?;
        conn.call(move |conn| {
            let journal_mode = if wal_mode { "WAL" } else { "DELETE" };
            conn.pragma_update(None, "journal_mode", journal_mode)?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            Ok(crate::migrations::run_migrations(conn))
        })
        .await
        .map_err(map_tr_err)??;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Re-run embedded migrations on the live connection.
    ///
    /// Used by the self-healing join path when a statement fails against a
    /// missing or truncated schema.
    pub async fn repair_schema(&self) -> Result<(), FilaqError> {
        self.conn
            .call(|conn| Ok(crate::migrations::run_migrations(conn)))
            .await
            .map_err(map_tr_err)??;
        debug!("schema repair pass complete");
        Ok(())
    }

    /// Probe the schema for the tables and columns the engine depends on.
    pub async fn schema_report(&self) -> Result<SchemaReport, FilaqError> {
        self.conn
            .call(|conn| {
                let table_exists = |name: &str| -> rusqlite::Result<bool> {
                    conn.query_row(
                        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                        [name],
                        |row| row.get::<_, i64>(0),
                    )
                    .map(|n| n > 0)
                };
                let has_tickets = table_exists("tickets")?;
                let has_counters = table_exists("counters")?;
                let has_ticket_number = if has_tickets {
                    let mut stmt = conn.prepare("PRAGMA table_info(tickets)")?;
                    let mut found = false;
                    let mut rows = stmt.query([])?;
                    while let Some(row) = rows.next()? {
                        let column: String = row.get(1)?;
                        if column == "ticket_number" {
                            found = true;
                        }
                    }
                    found
                } else {
                    false
                };
                Ok(SchemaReport {
                    has_tickets,
                    has_counters,
                    has_ticket_number,
                })
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), FilaqError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn
            .close()
            .await
            .map_err(map_tr_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_database_file_and_schema() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested/dir/open.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        assert!(db_path.exists());

        let report = db.schema_report().await.unwrap();
        assert!(report.is_healthy(), "fresh schema should be healthy: {report:?}");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("reopen.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();

        // Migrations already applied; open must not fail.
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn repair_schema_recreates_dropped_table() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("repair.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch(
                    "DROP TABLE counters; DELETE FROM refinery_schema_history;",
                )?;
                Ok(())
            })
            .await
            .unwrap();
        let report = db.schema_report().await.unwrap();
        assert!(!report.has_counters);

        db.repair_schema().await.unwrap();
        let report = db.schema_report().await.unwrap();
        assert!(report.is_healthy());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_without_wal_mode() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("rollback.db");
        let db = Database::open_with_options(db_path.to_str().unwrap(), false)
            .await
            .unwrap();
        let report = db.schema_report().await.unwrap();
        assert!(report.is_healthy());
        db.close().await.unwrap();
    }
}
