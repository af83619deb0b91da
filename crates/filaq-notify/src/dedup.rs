// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification dedup cache.
//!
//! Tracks, per ticket, whether the "you're up" alert already fired and the
//! last waiting rank a "almost your turn" alert fired for. Entries for
//! terminal tickets are kept for a retention window so a late sweep or
//! stale snapshot cannot re-fire, then evicted.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// How long a terminal ticket's dedup entry survives before eviction.
pub const TERMINAL_RETENTION: Duration = Duration::from_secs(30 * 60);

#[derive(Default)]
struct DedupEntry {
    called_fired: bool,
    near_rank: Option<u32>,
    terminal_at: Option<Instant>,
}

/// In-memory, per-process dedup state. A restart clears it; the worst case
/// is one repeated alert, never a missed one.
#[derive(Default)]
pub struct DedupCache {
    entries: DashMap<String, DedupEntry>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record intent to fire the "called" alert. Returns true exactly once
    /// per ticket.
    pub fn try_fire_called(&self, ticket_id: &str) -> bool {
        let mut entry = self.entries.entry(ticket_id.to_string()).or_default();
        if entry.called_fired {
            return false;
        }
        entry.called_fired = true;
        true
    }

    /// Record intent to fire the "almost your turn" alert at `rank`.
    /// Returns true once per (ticket, rank); a rank change re-arms.
    pub fn try_fire_near(&self, ticket_id: &str, rank: u32) -> bool {
        let mut entry = self.entries.entry(ticket_id.to_string()).or_default();
        if entry.near_rank == Some(rank) {
            return false;
        }
        entry.near_rank = Some(rank);
        true
    }

    /// Start the retention clock for a ticket that reached a terminal state.
    pub fn mark_terminal(&self, ticket_id: &str) {
        if let Some(mut entry) = self.entries.get_mut(ticket_id) {
            entry.terminal_at.get_or_insert_with(Instant::now);
        }
    }

    /// Drop entries whose retention window has elapsed. Returns how many
    /// were evicted.
    pub fn evict_expired(&self, retention: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            entry
                .terminal_at
                .is_none_or(|t| t.elapsed() < retention)
        });
        before - self.entries.len()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}
