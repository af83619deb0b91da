// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage-side models and row mapping.
//!
//! Domain types live in `filaq-core`; this module re-exports them and adds
//! the request/outcome structs that only the query layer needs.

use rusqlite::Row;

pub use filaq_core::{PublicEntry, Service, ShopSettings, Ticket, TicketStatus, WaitingEntry};

/// Input to ticket creation. The id, number, date, and timestamps are
/// assigned inside the join transaction.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub shop_code: String,
    pub customer_name: String,
    pub phone: Option<String>,
    pub service_label: Option<String>,
}

/// Result of the atomic join transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A number was assigned and the ticket row committed.
    Created {
        ticket_id: String,
        ticket_number: i64,
    },
    /// The next number would exceed the daily cap; nothing was written.
    Full,
}

/// Result of a guarded status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The transition committed; carries the shop so the caller can refresh
    /// that shop's channels.
    Applied { shop_code: String },
    /// The ticket exists but is not in a state the transition allows.
    WrongState(TicketStatus),
    /// No ticket with that id.
    Missing,
}

/// One stored web-push subscription handle.
#[derive(Debug, Clone)]
pub struct PushSubscription {
    pub id: String,
    pub shop_code: String,
    pub ticket_id: String,
    pub endpoint: String,
    /// Opaque subscription JSON exactly as the browser produced it.
    pub subscription: String,
}

/// Column list matching [`ticket_from_row`]. Keep the two in sync.
pub(crate) const TICKET_COLUMNS: &str = "id, shop_code, customer_name, phone, service_label, \
     status, ticket_number, ticket_date, created_at, called_at, served_at, arrived_at, \
     grace_expires_at";

/// Map a row selected with [`TICKET_COLUMNS`] into a [`Ticket`].
pub(crate) fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    let status_text: String = row.get(5)?;
    let status = status_text.parse::<TicketStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Ticket {
        id: row.get(0)?,
        shop_code: row.get(1)?,
        customer_name: row.get(2)?,
        phone: row.get(3)?,
        service_label: row.get(4)?,
        status,
        ticket_number: row.get(6)?,
        ticket_date: row.get(7)?,
        created_at: row.get(8)?,
        called_at: row.get(9)?,
        served_at: row.get(10)?,
        arrived_at: row.get(11)?,
        grace_expires_at: row.get(12)?,
    })
}
