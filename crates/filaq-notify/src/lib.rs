// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification layer: dedup plus pluggable push delivery.
//!
//! Notification failures are logged where they happen and never surface
//! into engine results; a broken push endpoint cannot fail a CallNext.

pub mod dedup;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use filaq_core::{FilaqError, Ticket};
use filaq_storage::queries::subscriptions;
use filaq_storage::Database;

pub use dedup::{DedupCache, TERMINAL_RETENTION};

/// What an alert says, independent of transport.
#[derive(Debug, Clone, Serialize)]
pub struct AlertPayload {
    pub title: String,
    pub body: String,
    /// Stable tag so a client can collapse repeated alerts for one ticket.
    pub tag: String,
}

/// Transport seam for delivering one alert to one stored subscription.
#[async_trait]
pub trait PushDelivery: Send + Sync {
    async fn deliver(
        &self,
        subscription_json: &str,
        payload: &AlertPayload,
    ) -> Result<(), FilaqError>;
}

/// Delivery backend that only logs. The default until a real web-push
/// transport is configured; keeps the rest of the pipeline honest.
pub struct LogDelivery;

#[async_trait]
impl PushDelivery for LogDelivery {
    async fn deliver(
        &self,
        _subscription_json: &str,
        payload: &AlertPayload,
    ) -> Result<(), FilaqError> {
        debug!(title = %payload.title, tag = %payload.tag, "push delivery (log backend)");
        Ok(())
    }
}

/// Dedup-guarded notifier over the stored subscriptions of a ticket.
pub struct Notifier {
    db: Database,
    delivery: Arc<dyn PushDelivery>,
    dedup: DedupCache,
}

impl Notifier {
    pub fn new(db: Database, delivery: Arc<dyn PushDelivery>) -> Self {
        Self {
            db,
            delivery,
            dedup: DedupCache::new(),
        }
    }

    /// Fire the "you're up" alert, at most once per ticket.
    pub async fn notify_called(&self, ticket: &Ticket) {
        if !self.dedup.try_fire_called(&ticket.id) {
            return;
        }
        let payload = AlertPayload {
            title: "It's your turn!".to_string(),
            body: format!("Ticket #{} is being called now.", ticket.ticket_number),
            tag: format!("called-{}", ticket.id),
        };
        self.deliver_all(&ticket.id, &payload).await;
    }

    /// Fire the "almost your turn" alert, at most once per waiting rank.
    pub async fn notify_near(&self, ticket: &Ticket, rank: u32) {
        if !self.dedup.try_fire_near(&ticket.id, rank) {
            return;
        }
        let payload = AlertPayload {
            title: "Almost your turn".to_string(),
            body: format!(
                "Ticket #{}: {} ahead of you. Please head over.",
                ticket.ticket_number,
                rank.saturating_sub(1)
            ),
            tag: format!("near-{}", ticket.id),
        };
        self.deliver_all(&ticket.id, &payload).await;
    }

    /// Start dedup retention for a ticket that left the queue.
    pub fn mark_terminal(&self, ticket_id: &str) {
        self.dedup.mark_terminal(ticket_id);
    }

    /// Periodic maintenance, called from the background sweep.
    pub fn evict_expired(&self) {
        let evicted = self.dedup.evict_expired(TERMINAL_RETENTION);
        if evicted > 0 {
            debug!(evicted, "dedup cache eviction");
        }
    }

    async fn deliver_all(&self, ticket_id: &str, payload: &AlertPayload) {
        let subs = match subscriptions::for_ticket(&self.db, ticket_id).await {
            Ok(subs) => subs,
            Err(e) => {
                warn!(ticket_id, error = %e, "could not load push subscriptions");
                return;
            }
        };
        for sub in subs {
            if let Err(e) = self.delivery.deliver(&sub.subscription, payload).await {
                warn!(
                    ticket_id,
                    endpoint = %sub.endpoint,
                    error = %e,
                    "push delivery failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    use filaq_core::TicketStatus;

    struct RecordingDelivery {
        sent: Mutex<Vec<AlertPayload>>,
    }

    #[async_trait]
    impl PushDelivery for RecordingDelivery {
        async fn deliver(
            &self,
            _subscription_json: &str,
            payload: &AlertPayload,
        ) -> Result<(), FilaqError> {
            self.sent.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    struct FailingDelivery;

    #[async_trait]
    impl PushDelivery for FailingDelivery {
        async fn deliver(
            &self,
            _subscription_json: &str,
            _payload: &AlertPayload,
        ) -> Result<(), FilaqError> {
            Err(FilaqError::Channel {
                message: "endpoint gone".to_string(),
                source: None,
            })
        }
    }

    fn ticket(id: &str, number: i64) -> Ticket {
        Ticket {
            id: id.to_string(),
            shop_code: "shop".to_string(),
            customer_name: "ana".to_string(),
            phone: None,
            service_label: None,
            status: TicketStatus::Waiting,
            ticket_number: number,
            ticket_date: "2026-08-25".to_string(),
            created_at: "2026-08-25T10:00:00.000Z".to_string(),
            called_at: None,
            served_at: None,
            arrived_at: None,
            grace_expires_at: None,
        }
    }

    async fn setup() -> (Database, Arc<RecordingDelivery>, Notifier, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        let delivery = Arc::new(RecordingDelivery {
            sent: Mutex::new(Vec::new()),
        });
        let notifier = Notifier::new(db.clone(), delivery.clone());
        (db, delivery, notifier, dir)
    }

    #[tokio::test]
    async fn called_alert_fires_once_per_subscription() {
        let (db, delivery, notifier, _dir) = setup().await;
        subscriptions::save(&db, "shop", "t-1", "https://push/a", "{}")
            .await
            .unwrap();
        subscriptions::save(&db, "shop", "t-1", "https://push/b", "{}")
            .await
            .unwrap();

        let t = ticket("t-1", 7);
        notifier.notify_called(&t).await;
        notifier.notify_called(&t).await;

        let sent = delivery.sent.lock().unwrap();
        assert_eq!(sent.len(), 2, "two devices, one alert each");
        assert!(sent[0].body.contains("#7"));
    }

    #[tokio::test]
    async fn near_alert_refires_on_rank_change_only() {
        let (db, delivery, notifier, _dir) = setup().await;
        subscriptions::save(&db, "shop", "t-1", "https://push/a", "{}")
            .await
            .unwrap();

        let t = ticket("t-1", 3);
        notifier.notify_near(&t, 2).await;
        notifier.notify_near(&t, 2).await;
        notifier.notify_near(&t, 1).await;

        assert_eq!(delivery.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        subscriptions::save(&db, "shop", "t-1", "https://push/a", "{}")
            .await
            .unwrap();
        let notifier = Notifier::new(db, Arc::new(FailingDelivery));

        // Must not panic or error.
        notifier.notify_called(&ticket("t-1", 1)).await;
    }

    #[tokio::test]
    async fn no_subscriptions_is_a_quiet_noop() {
        let (_db, delivery, notifier, _dir) = setup().await;
        notifier.notify_called(&ticket("t-ghost", 1)).await;
        assert!(delivery.sent.lock().unwrap().is_empty());
    }
}
