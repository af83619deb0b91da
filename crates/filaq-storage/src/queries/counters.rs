// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-(shop, service day) sequence counters.
//!
//! The counter is the committed high-water mark for ticket numbers. The
//! sequencer never trusts it alone: the join transaction reconciles it
//! against the numbers actually observed on ticket rows in the current
//! service-day window, so a deleted or stale counter row can only slow a
//! join down, never cause a duplicate number.

use rusqlite::{params, Connection, OptionalExtension};

use filaq_core::{FilaqError, ServiceDayWindow};

use crate::database::{map_tr_err, Database};

/// Create the counter row for (shop, day) if it does not exist yet.
pub(crate) fn ensure_row(conn: &Connection, shop_code: &str, date: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO counters (shop_code, counter_date, last_number) VALUES (?1, ?2, 0)",
        params![shop_code, date],
    )?;
    Ok(())
}

/// Committed high-water mark for (shop, day); 0 when no row exists.
pub(crate) fn last_number(conn: &Connection, shop_code: &str, date: &str) -> rusqlite::Result<i64> {
    let n = conn
        .query_row(
            "SELECT last_number FROM counters WHERE shop_code = ?1 AND counter_date = ?2",
            params![shop_code, date],
            |row| row.get(0),
        )
        .optional()?;
    Ok(n.unwrap_or(0))
}

pub(crate) fn set_last_number(
    conn: &Connection,
    shop_code: &str,
    date: &str,
    number: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE counters SET last_number = ?3 WHERE shop_code = ?1 AND counter_date = ?2",
        params![shop_code, date, number],
    )?;
    Ok(())
}

/// Highest ticket number observed in the shop's current service-day
/// window, looking at the ticket's own day stamp and at every lifecycle
/// timestamp that can fall inside the window.
pub(crate) fn max_number_in_window(
    conn: &Connection,
    shop_code: &str,
    window: &ServiceDayWindow,
) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(ticket_number), 0) FROM tickets
         WHERE shop_code = ?1
           AND (ticket_date = ?2
                OR (created_at >= ?3 AND created_at < ?4)
                OR (called_at >= ?3 AND called_at < ?4)
                OR (served_at >= ?3 AND served_at < ?4))",
        params![shop_code, window.date, window.start, window.end],
        |row| row.get(0),
    )
}

/// Read the committed counter value for (shop, day).
pub async fn last_number_for_day(
    db: &Database,
    shop_code: &str,
    date: &str,
) -> Result<i64, FilaqError> {
    let shop_code = shop_code.to_string();
    let date = date.to_string();
    db.connection()
        .call(move |conn| Ok(last_number(conn, &shop_code, &date)?))
        .await
        .map_err(map_tr_err)
}

/// Delete the counter row for (shop, day).
///
/// Simulates counter loss; the sequencer must keep issuing strictly
/// increasing numbers from ticket-row reconciliation alone.
pub async fn delete_for_day(db: &Database, shop_code: &str, date: &str) -> Result<(), FilaqError> {
    let shop_code = shop_code.to_string();
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM counters WHERE shop_code = ?1 AND counter_date = ?2",
                params![shop_code, date],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
