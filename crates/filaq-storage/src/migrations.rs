// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded database migrations using refinery.
//!
//! SQL migration files are compiled into the binary at build time via
//! `embed_migrations!`. Migrations run automatically on database open.

use filaq_core::FilaqError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Run all pending migrations against the given connection.
///
/// Refinery tracks applied migrations in its own `refinery_schema_history`
/// table, so re-running on an already-migrated database is a no-op. This is
/// also the recovery path after a detected schema failure: callers may run
/// it once more and retry the failing statement.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), FilaqError> {
    embedded::migrations::runner()
        .run(conn)
        .map_err(|e| FilaqError::Storage {
            source: Box::new(e),
        })?;
    Ok(())
}
