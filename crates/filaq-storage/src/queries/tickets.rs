// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket lifecycle queries.
//!
//! Every multi-step operation here runs inside one transaction on the
//! single writer thread, so two overlapping joins or call-nexts can never
//! interleave: number assignment and the waiting->called transition are
//! atomic by construction.

use rusqlite::{params, OptionalExtension, Transaction};

use filaq_core::{FilaqError, PublicEntry, ServiceDayWindow, Ticket, TicketStatus};

use crate::database::{map_tr_err, Database};
use crate::models::{ticket_from_row, JoinOutcome, NewTicket, TransitionOutcome, TICKET_COLUMNS};
use crate::queries::counters;

/// Atomically assign the next ticket number and insert the ticket row.
///
/// The candidate number is `max(committed counter, max observed in the
/// service-day window) + 1`. If that exceeds `cap` the transaction rolls
/// back untouched and `JoinOutcome::Full` is returned.
pub async fn create_with_number(
    db: &Database,
    new: NewTicket,
    window: ServiceDayWindow,
    cap: u32,
) -> Result<JoinOutcome, FilaqError> {
    let id = uuid::Uuid::new_v4().to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            counters::ensure_row(&tx, &new.shop_code, &window.date)?;
            let committed = counters::last_number(&tx, &new.shop_code, &window.date)?;
            let observed = counters::max_number_in_window(&tx, &new.shop_code, &window)?;
            let candidate = committed.max(observed) + 1;
            if candidate > i64::from(cap) {
                // Dropping the transaction rolls back, including ensure_row.
                return Ok(JoinOutcome::Full);
            }
            counters::set_last_number(&tx, &new.shop_code, &window.date, candidate)?;
            tx.execute(
                "INSERT INTO tickets (id, shop_code, customer_name, phone, service_label, \
                 status, ticket_number, ticket_date) \
                 VALUES (?1, ?2, ?3, ?4, ?5, 'waiting', ?6, ?7)",
                params![
                    id,
                    new.shop_code,
                    new.customer_name,
                    new.phone,
                    new.service_label,
                    candidate,
                    window.date
                ],
            )?;
            tx.commit()?;
            Ok(JoinOutcome::Created {
                ticket_id: id,
                ticket_number: candidate,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Atomically select the oldest waiting ticket and mark it called.
///
/// Returns the ticket in its post-transition state, or `None` when nobody
/// is waiting. Ties on `created_at` break by insertion order (rowid).
pub async fn call_next(db: &Database, shop_code: &str) -> Result<Option<Ticket>, FilaqError> {
    let shop_code = shop_code.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let next = tx
                .query_row(
                    &format!(
                        "SELECT {TICKET_COLUMNS} FROM tickets \
                         WHERE shop_code = ?1 AND status = 'waiting' \
                         ORDER BY created_at ASC, rowid ASC LIMIT 1"
                    ),
                    params![shop_code],
                    ticket_from_row,
                )
                .optional()?;
            let Some(ticket) = next else {
                tx.commit()?;
                return Ok(None);
            };
            tx.execute(
                "UPDATE tickets SET status = 'called', \
                 called_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), \
                 grace_expires_at = NULL \
                 WHERE id = ?1",
                params![ticket.id],
            )?;
            let updated = get_in_tx(&tx, &ticket.id)?;
            tx.commit()?;
            Ok(updated)
        })
        .await
        .map_err(map_tr_err)
}

/// called -> served. Any other state is reported, not mutated.
pub async fn complete(db: &Database, ticket_id: &str) -> Result<TransitionOutcome, FilaqError> {
    let ticket_id = ticket_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some((shop_code, status)) = shop_and_status(&tx, &ticket_id)? else {
                return Ok(TransitionOutcome::Missing);
            };
            if status != TicketStatus::Called {
                return Ok(TransitionOutcome::WrongState(status));
            }
            tx.execute(
                "UPDATE tickets SET status = 'served', \
                 served_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
                 WHERE id = ?1",
                params![ticket_id],
            )?;
            tx.commit()?;
            Ok(TransitionOutcome::Applied { shop_code })
        })
        .await
        .map_err(map_tr_err)
}

/// Staff cancel: waiting or called -> canceled.
pub async fn cancel_admin(db: &Database, ticket_id: &str) -> Result<TransitionOutcome, FilaqError> {
    let ticket_id = ticket_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some((shop_code, status)) = shop_and_status(&tx, &ticket_id)? else {
                return Ok(TransitionOutcome::Missing);
            };
            if status.is_terminal() {
                return Ok(TransitionOutcome::WrongState(status));
            }
            tx.execute(
                "UPDATE tickets SET status = 'canceled', grace_expires_at = NULL WHERE id = ?1",
                params![ticket_id],
            )?;
            tx.commit()?;
            Ok(TransitionOutcome::Applied { shop_code })
        })
        .await
        .map_err(map_tr_err)
}

/// Customer self-cancel: only a waiting ticket may leave.
pub async fn leave(db: &Database, ticket_id: &str) -> Result<TransitionOutcome, FilaqError> {
    let ticket_id = ticket_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some((shop_code, status)) = shop_and_status(&tx, &ticket_id)? else {
                return Ok(TransitionOutcome::Missing);
            };
            if status != TicketStatus::Waiting {
                return Ok(TransitionOutcome::WrongState(status));
            }
            tx.execute(
                "UPDATE tickets SET status = 'canceled', grace_expires_at = NULL WHERE id = ?1",
                params![ticket_id],
            )?;
            tx.commit()?;
            Ok(TransitionOutcome::Applied { shop_code })
        })
        .await
        .map_err(map_tr_err)
}

/// Record the customer's arrival and disarm any pending grace timer.
///
/// Idempotent: the first arrival timestamp is kept on repeat calls.
/// Returns the ticket in its post-update state, or `None` if unknown.
pub async fn arrive(db: &Database, ticket_id: &str) -> Result<Option<Ticket>, FilaqError> {
    let ticket_id = ticket_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE tickets SET \
                 arrived_at = COALESCE(arrived_at, strftime('%Y-%m-%dT%H:%M:%fZ', 'now')), \
                 grace_expires_at = NULL \
                 WHERE id = ?1",
                params![ticket_id],
            )?;
            let ticket = get_in_tx(&tx, &ticket_id)?;
            tx.commit()?;
            Ok(ticket)
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch one ticket by id.
pub async fn get_ticket(db: &Database, ticket_id: &str) -> Result<Option<Ticket>, FilaqError> {
    let ticket_id = ticket_id.to_string();
    db.connection()
        .call(move |conn| {
            let ticket = conn
                .query_row(
                    &format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?1"),
                    params![ticket_id],
                    ticket_from_row,
                )
                .optional()?;
            Ok(ticket)
        })
        .await
        .map_err(map_tr_err)
}

/// All waiting tickets for a shop in queue order.
pub async fn waiting_list(db: &Database, shop_code: &str) -> Result<Vec<Ticket>, FilaqError> {
    let shop_code = shop_code.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TICKET_COLUMNS} FROM tickets \
                 WHERE shop_code = ?1 AND status = 'waiting' \
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let tickets = stmt
                .query_map(params![shop_code], ticket_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tickets)
        })
        .await
        .map_err(map_tr_err)
}

/// The first `limit` waiting entries in queue order, reduced to the
/// fields the public board may see.
pub async fn public_list(
    db: &Database,
    shop_code: &str,
    limit: u32,
) -> Result<Vec<PublicEntry>, FilaqError> {
    let shop_code = shop_code.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT ticket_number, created_at FROM tickets \
                 WHERE shop_code = ?1 AND status = 'waiting' \
                 ORDER BY created_at ASC, rowid ASC LIMIT ?2",
            )?;
            let entries = stmt
                .query_map(params![shop_code, limit], |row| {
                    Ok(PublicEntry {
                        ticket_number: row.get(0)?,
                        created_at: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}

/// Highest ticket number called or served inside the service-day window;
/// 0 before the first call of the day.
pub async fn current_number(
    db: &Database,
    shop_code: &str,
    window: &ServiceDayWindow,
) -> Result<i64, FilaqError> {
    let shop_code = shop_code.to_string();
    let window = window.clone();
    db.connection()
        .call(move |conn| {
            let n = conn.query_row(
                "SELECT COALESCE(MAX(ticket_number), 0) FROM tickets \
                 WHERE shop_code = ?1 AND status IN ('called', 'served') \
                   AND ((called_at >= ?2 AND called_at < ?3) \
                        OR (served_at >= ?2 AND served_at < ?3))",
                params![shop_code, window.start, window.end],
                |row| row.get(0),
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)
}

/// Arm the grace timer on the waiting ticket at 0-based `offset`, if that
/// ticket is unarrived and was never armed before. Returns the armed
/// ticket's id, or `None` when no arming happened.
pub async fn arm_grace(
    db: &Database,
    shop_code: &str,
    offset: u32,
    expires_at: &str,
) -> Result<Option<String>, FilaqError> {
    let shop_code = shop_code.to_string();
    let expires_at = expires_at.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let candidate = tx
                .query_row(
                    "SELECT id, arrived_at, grace_expires_at FROM tickets \
                     WHERE shop_code = ?1 AND status = 'waiting' \
                     ORDER BY created_at ASC, rowid ASC LIMIT 1 OFFSET ?2",
                    params![shop_code, offset],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, Option<String>>(1)?,
                            row.get::<_, Option<String>>(2)?,
                        ))
                    },
                )
                .optional()?;
            let armed = match candidate {
                Some((id, None, None)) => {
                    tx.execute(
                        "UPDATE tickets SET grace_expires_at = ?1 \
                         WHERE id = ?2 AND status = 'waiting' \
                           AND arrived_at IS NULL AND grace_expires_at IS NULL",
                        params![expires_at, id],
                    )?;
                    Some(id)
                }
                _ => None,
            };
            tx.commit()?;
            Ok(armed)
        })
        .await
        .map_err(map_tr_err)
}

/// Arm the grace timer on one specific ticket, guarded the same way as
/// [`arm_grace`]. Returns whether a timer was actually set.
pub async fn arm_grace_for(
    db: &Database,
    ticket_id: &str,
    expires_at: &str,
) -> Result<bool, FilaqError> {
    let ticket_id = ticket_id.to_string();
    let expires_at = expires_at.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE tickets SET grace_expires_at = ?1 \
                 WHERE id = ?2 AND status = 'waiting' \
                   AND arrived_at IS NULL AND grace_expires_at IS NULL",
                params![expires_at, ticket_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Cancel every waiting, unarrived ticket whose grace deadline is at or
/// before `now`. Returns the canceled ids.
pub async fn expire_overdue(
    db: &Database,
    shop_code: &str,
    now: &str,
) -> Result<Vec<String>, FilaqError> {
    let shop_code = shop_code.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "UPDATE tickets SET status = 'canceled' \
                 WHERE shop_code = ?1 AND status = 'waiting' \
                   AND arrived_at IS NULL \
                   AND grace_expires_at IS NOT NULL AND grace_expires_at <= ?2 \
                 RETURNING id",
            )?;
            let ids = stmt
                .query_map(params![shop_code, now], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
        .await
        .map_err(map_tr_err)
}

/// Shops that currently have at least one waiting ticket. Drives the
/// background sweep so idle shops cost nothing.
pub async fn shops_with_waiting(db: &Database) -> Result<Vec<String>, FilaqError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn
                .prepare("SELECT DISTINCT shop_code FROM tickets WHERE status = 'waiting'")?;
            let shops = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(shops)
        })
        .await
        .map_err(map_tr_err)
}

fn get_in_tx(tx: &Transaction<'_>, ticket_id: &str) -> rusqlite::Result<Option<Ticket>> {
    tx.query_row(
        &format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?1"),
        params![ticket_id],
        ticket_from_row,
    )
    .optional()
}

fn shop_and_status(
    tx: &Transaction<'_>,
    ticket_id: &str,
) -> rusqlite::Result<Option<(String, TicketStatus)>> {
    tx.query_row(
        "SELECT shop_code, status FROM tickets WHERE id = ?1",
        params![ticket_id],
        |row| {
            let shop_code: String = row.get(0)?;
            let status_text: String = row.get(1)?;
            let status = status_text.parse::<TicketStatus>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    1,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;
            Ok((shop_code, status))
        },
    )
    .optional()
}
