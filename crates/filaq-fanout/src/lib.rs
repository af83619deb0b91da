// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process snapshot fanout.
//!
//! The hub holds per-shop sets of subscriber channels, one set per
//! [`ChannelKind`] plus a per-ticket set keyed by ticket id. Publishing
//! never blocks the engine: events go out with `try_send`, a full buffer
//! drops the event for that subscriber (the next snapshot supersedes it),
//! and a closed receiver prunes the sender on the spot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::trace;

use filaq_core::{ChannelKind, QueueEvent};

/// Buffered events per subscriber. Snapshots are small and self-contained,
/// so a short buffer is enough.
const SUBSCRIBER_BUFFER: usize = 32;

type Senders = HashMap<u64, mpsc::Sender<QueueEvent>>;

#[derive(Default)]
struct ShopChannels {
    current_number: Senders,
    waiting_list: Senders,
    public_list: Senders,
    settings: Senders,
    /// Per-ticket subscribers: id -> (ticket id, sender).
    tickets: HashMap<u64, (String, mpsc::Sender<QueueEvent>)>,
}

impl ShopChannels {
    fn kind_mut(&mut self, kind: ChannelKind) -> &mut Senders {
        match kind {
            ChannelKind::CurrentNumber => &mut self.current_number,
            ChannelKind::WaitingList => &mut self.waiting_list,
            ChannelKind::PublicList => &mut self.public_list,
            ChannelKind::Settings => &mut self.settings,
        }
    }

    fn is_empty(&self) -> bool {
        self.current_number.is_empty()
            && self.waiting_list.is_empty()
            && self.public_list.is_empty()
            && self.settings.is_empty()
            && self.tickets.is_empty()
    }
}

/// One live subscription. Dropping the receiver lets the hub prune the
/// sender on the next publish; callers should still call
/// [`FanoutHub::unsubscribe`] for prompt cleanup.
pub struct Subscription {
    pub id: u64,
    pub rx: mpsc::Receiver<QueueEvent>,
}

/// Shared fanout hub. Cheap to clone behind an `Arc`.
#[derive(Default)]
pub struct FanoutHub {
    shops: DashMap<String, ShopChannels>,
    next_id: AtomicU64,
}

impl FanoutHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one of a shop's broadcast channels.
    pub fn subscribe(&self, shop_code: &str, kind: ChannelKind) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.shops
            .entry(shop_code.to_string())
            .or_default()
            .kind_mut(kind)
            .insert(id, tx);
        trace!(shop_code, %kind, id, "subscribed");
        Subscription { id, rx }
    }

    /// Subscribe to one ticket's status channel.
    pub fn subscribe_ticket(&self, shop_code: &str, ticket_id: &str) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.shops
            .entry(shop_code.to_string())
            .or_default()
            .tickets
            .insert(id, (ticket_id.to_string(), tx));
        trace!(shop_code, ticket_id, id, "ticket subscribed");
        Subscription { id, rx }
    }

    /// Drop one subscription. Removes the shop's entry entirely when its
    /// last subscriber disconnects.
    pub fn unsubscribe(&self, shop_code: &str, id: u64) {
        if let Some(mut channels) = self.shops.get_mut(shop_code) {
            channels.current_number.remove(&id);
            channels.waiting_list.remove(&id);
            channels.public_list.remove(&id);
            channels.settings.remove(&id);
            channels.tickets.remove(&id);
            let empty = channels.is_empty();
            drop(channels);
            if empty {
                self.shops
                    .remove_if(shop_code, |_, channels| channels.is_empty());
            }
        }
        trace!(shop_code, id, "unsubscribed");
    }

    /// Publish a snapshot on one of a shop's broadcast channels.
    pub fn publish(&self, shop_code: &str, kind: ChannelKind, event: &QueueEvent) {
        if let Some(mut channels) = self.shops.get_mut(shop_code) {
            let senders = channels.kind_mut(kind);
            let mut dead = Vec::new();
            for (&id, tx) in senders.iter() {
                match tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        trace!(shop_code, %kind, id, "subscriber buffer full, event dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => dead.push(id),
                }
            }
            for id in dead {
                senders.remove(&id);
            }
        }
    }

    /// Publish a snapshot to every subscriber of one ticket.
    pub fn publish_ticket(&self, shop_code: &str, ticket_id: &str, event: &QueueEvent) {
        if let Some(mut channels) = self.shops.get_mut(shop_code) {
            let mut dead = Vec::new();
            for (&id, (subscribed_ticket, tx)) in channels.tickets.iter() {
                if subscribed_ticket != ticket_id {
                    continue;
                }
                match tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        trace!(shop_code, ticket_id, id, "subscriber buffer full, event dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => dead.push(id),
                }
            }
            for id in dead {
                channels.tickets.remove(&id);
            }
        }
    }

    /// Distinct ticket ids with at least one live subscriber in this shop.
    pub fn subscribed_ticket_ids(&self, shop_code: &str) -> Vec<String> {
        let Some(channels) = self.shops.get(shop_code) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = channels
            .tickets
            .values()
            .map(|(ticket_id, _)| ticket_id.clone())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Whether anyone is listening on the given channel. Lets the engine
    /// skip building snapshots nobody would receive.
    pub fn has_subscribers(&self, shop_code: &str, kind: ChannelKind) -> bool {
        self.shops
            .get(shop_code)
            .is_some_and(|channels| match kind {
                ChannelKind::CurrentNumber => !channels.current_number.is_empty(),
                ChannelKind::WaitingList => !channels.waiting_list.is_empty(),
                ChannelKind::PublicList => !channels.public_list.is_empty(),
                ChannelKind::Settings => !channels.settings.is_empty(),
            })
    }
}
