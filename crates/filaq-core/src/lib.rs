// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the filaq queue coordination engine.
//!
//! This crate provides the error taxonomy, domain types, broadcast event
//! types, and the service-day clock shared by every filaq crate. It holds
//! no IO of its own.

pub mod error;
pub mod service_day;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::FilaqError;
pub use service_day::{
    now_timestamp, service_day, service_day_at, to_storage_timestamp, ServiceDayWindow,
};
pub use types::{
    ChannelKind, PublicEntry, QueueEvent, Service, ShopSettings, Ticket, TicketSnapshot,
    TicketStatus, WaitingEntry,
};
