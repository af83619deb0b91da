// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the filaq workspace.
//!
//! Timestamps are RFC 3339 UTC strings end to end; the storage layer
//! writes them with millisecond precision and the engine compares them
//! lexicographically or via chrono, never as local time.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle status of a ticket.
///
/// Transitions only move forward: waiting -> called -> served, or
/// waiting/called -> canceled. `served` and `canceled` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Waiting,
    Called,
    Served,
    Canceled,
}

impl TicketStatus {
    /// Whether this status permits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, TicketStatus::Served | TicketStatus::Canceled)
    }
}

/// One customer's place in a shop's queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    /// Opaque unique id, assigned at creation and never reused.
    pub id: String,
    pub shop_code: String,
    pub customer_name: String,
    pub phone: Option<String>,
    pub service_label: Option<String>,
    pub status: TicketStatus,
    /// Integer in [1, daily_cap], unique per (shop, service day).
    pub ticket_number: i64,
    /// Service day the number belongs to, as YYYY-MM-DD.
    pub ticket_date: String,
    pub created_at: String,
    pub called_at: Option<String>,
    pub served_at: Option<String>,
    pub arrived_at: Option<String>,
    /// Set at most once, only while waiting and unarrived.
    pub grace_expires_at: Option<String>,
}

/// Per-shop pause state shown to customers attempting to join.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopSettings {
    pub paused: bool,
    pub pause_message: Option<String>,
}

/// A service offered by a shop. Read-only input to the queue; affects
/// display only, never ordering or ETA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub shop_code: String,
    pub name: String,
    pub duration_minutes: Option<i64>,
    pub active: bool,
}

/// Logical broadcast channels of the fanout hub, excluding the
/// per-ticket channel which is keyed by ticket id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum ChannelKind {
    CurrentNumber,
    WaitingList,
    PublicList,
    Settings,
}

/// Waiting-list row pushed on the privileged `waiting-list` channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitingEntry {
    pub id: String,
    pub customer_name: String,
    pub service_label: Option<String>,
    pub created_at: String,
    pub ticket_number: i64,
    pub arrived: bool,
}

/// Truncated, position-agnostic row pushed on the public board channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicEntry {
    pub ticket_number: i64,
    pub created_at: String,
}

/// Everything a customer's status page needs about one ticket.
///
/// `position` is `None` whenever the ticket is not currently waiting;
/// `ahead` and `estimate_minutes` default to 0 in that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSnapshot {
    pub ticket_id: String,
    pub shop_code: String,
    pub status: TicketStatus,
    pub position: Option<u32>,
    pub ahead: u32,
    pub estimate_minutes: u32,
    pub ticket_number: i64,
    pub ticket_date: String,
    pub current_number: i64,
    pub grace_expires_at: Option<String>,
    pub grace_seconds_left: Option<i64>,
}

/// A complete, self-consistent snapshot pushed to subscribers.
///
/// Subscribers never receive deltas: a late joiner is fully correct on
/// its very first event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    Current { current_number: i64 },
    WaitingList { entries: Vec<WaitingEntry> },
    PublicList { entries: Vec<PublicEntry> },
    Settings(ShopSettings),
    Ticket(TicketSnapshot),
}

impl QueueEvent {
    /// SSE event name for this snapshot kind.
    pub fn event_name(&self) -> &'static str {
        match self {
            QueueEvent::Current { .. } => "current",
            QueueEvent::WaitingList { .. } => "list",
            QueueEvent::PublicList { .. } => "public_list",
            QueueEvent::Settings(_) => "settings",
            QueueEvent::Ticket(_) => "ticket",
        }
    }
}
