// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the filaq queue coordination engine.

use thiserror::Error;

/// The primary error type used across all filaq crates.
///
/// Every engine operation returns these as typed results; nothing in the
/// engine panics or throws past this enum. Background failures (sweep,
/// fanout push, notification delivery) are logged at their origin and do
/// not surface here.
#[derive(Debug, Error)]
pub enum FilaqError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migration failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The daily ticket cap was reached; no ticket was created.
    #[error("daily ticket cap reached ({cap})")]
    QueueFull { cap: u32 },

    /// The shop is intentionally not accepting joins.
    #[error("queue is paused")]
    QueuePaused { message: Option<String> },

    /// State-machine violation (e.g. Leave on a non-waiting ticket).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Operation on an unknown ticket, service, or shop record.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Gateway/transport errors (bind failure, stream setup).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FilaqError {
    /// Shorthand for a `NotFound` over a ticket id.
    pub fn ticket_not_found(ticket_id: &str) -> Self {
        FilaqError::NotFound {
            what: format!("ticket {ticket_id}"),
        }
    }
}
