// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background sweep: grace expiry, grace arming, near-turn alerts, and
//! dedup cache maintenance.
//!
//! The sweep is a safety net over the inline paths. Everything it does is
//! idempotent, so running it concurrently with live operations only costs
//! a redundant snapshot.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use filaq_core::now_timestamp;
use filaq_storage::queries::tickets;

use crate::engine::QueueEngine;

impl QueueEngine {
    /// One full sweep over every shop with waiting tickets.
    pub async fn sweep_once(&self) {
        let shops = match tickets::shops_with_waiting(self.db()).await {
            Ok(shops) => shops,
            Err(e) => {
                warn!(error = %e, "sweep could not list shops");
                return;
            }
        };

        for shop_code in shops {
            self.sweep_shop(&shop_code).await;
        }
        self.notifier().evict_expired();
    }

    async fn sweep_shop(&self, shop_code: &str) {
        let now = now_timestamp();
        match tickets::expire_overdue(self.db(), shop_code, &now).await {
            Ok(expired) if !expired.is_empty() => {
                info!(
                    shop_code,
                    count = expired.len(),
                    "grace expired, tickets canceled"
                );
                for ticket_id in &expired {
                    self.notifier().mark_terminal(ticket_id);
                }
                // Everyone behind the expired tickets moved up, so every
                // subscribed ticket needs a fresh snapshot, not just the
                // canceled ones.
                self.refresh_lists(shop_code).await;
                self.refresh_tickets(shop_code).await;
            }
            Ok(_) => {}
            Err(e) => warn!(shop_code, error = %e, "grace expiry pass failed"),
        }

        self.ensure_grace(shop_code).await;

        // Near-turn alert for the ticket that reached the trigger rank;
        // dedup keeps each (ticket, rank) pair to one alert.
        match tickets::waiting_list(self.db(), shop_code).await {
            Ok(list) => {
                let trigger = self.config().grace_trigger_position;
                if let Some(ticket) = list.get(trigger as usize - 1) {
                    self.notifier().notify_near(ticket, trigger).await;
                }
            }
            Err(e) => warn!(shop_code, error = %e, "near-alert pass failed"),
        }
    }
}

/// Run the sweep on a fixed interval until cancellation.
pub fn spawn_sweeper(
    engine: Arc<QueueEngine>,
    interval_secs: u64,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(interval_secs, "sweeper started");
        loop {
            tokio::select! {
                _ = ticker.tick() => engine.sweep_once().await,
                _ = cancel.cancelled() => {
                    debug!("sweeper stopped");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use filaq_config::model::QueueConfig;
    use filaq_core::{FilaqError, QueueEvent, TicketStatus};
    use filaq_fanout::FanoutHub;
    use filaq_notify::{AlertPayload, LogDelivery, Notifier, PushDelivery};
    use filaq_storage::queries::subscriptions;
    use filaq_storage::Database;
    use tempfile::tempdir;

    use crate::engine::JoinRequest;

    const SHOP: &str = "fade-factory";

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

    async fn setup_with_delivery(
        delivery: Arc<dyn PushDelivery>,
    ) -> (Arc<QueueEngine>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        let hub = Arc::new(FanoutHub::new());
        let notifier = Arc::new(Notifier::new(db.clone(), delivery));
        let engine = Arc::new(QueueEngine::new(
            db,
            QueueConfig::default(),
            hub,
            notifier,
        ));
        (engine, dir)
    }

    async fn setup() -> (Arc<QueueEngine>, tempfile::TempDir) {
        setup_with_delivery(Arc::new(LogDelivery)).await
    }

    fn join_req(name: &str) -> JoinRequest {
        JoinRequest {
            shop_code: SHOP.to_string(),
            customer_name: name.to_string(),
            phone: None,
            service_label: None,
        }
    }

    #[tokio::test]
    async fn sweep_cancels_overdue_and_rearms_successor() {
        let (engine, _dir) = setup().await;
        engine.join(join_req("ana")).await.unwrap();
        let b = engine.join(join_req("bo")).await.unwrap();
        let c = engine.join(join_req("carla")).await.unwrap();

        // Put bo's deadline firmly in the past.
        engine
            .db()
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "UPDATE tickets SET grace_expires_at = '2020-01-01T00:00:00.000Z' \
                     WHERE ticket_number = 2",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        engine.sweep_once().await;

        let b_snap = engine.position_snapshot(&b.ticket_id).await.unwrap();
        assert_eq!(b_snap.status, TicketStatus::Canceled);

        // Carla slid into the trigger rank and got armed by the sweep.
        let c_snap = engine.position_snapshot(&c.ticket_id).await.unwrap();
        assert_eq!(c_snap.position, Some(2));
        assert!(c_snap.grace_expires_at.is_some());
    }

    #[tokio::test]
    async fn expiry_sweep_refreshes_subscribers_behind_the_trigger() {
        let (engine, _dir) = setup().await;
        engine.join(join_req("ana")).await.unwrap();
        engine.join(join_req("bo")).await.unwrap();
        engine.join(join_req("carla")).await.unwrap();
        let d = engine.join(join_req("dan")).await.unwrap();

        engine
            .db()
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "UPDATE tickets SET grace_expires_at = '2020-01-01T00:00:00.000Z' \
                     WHERE ticket_number = 2",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        // Dan sits at rank 4, well past the trigger rank.
        let mut sub = engine.hub().subscribe_ticket(SHOP, &d.ticket_id);

        engine.sweep_once().await;

        let event = tokio::time::timeout(Duration::from_secs(1), sub.rx.recv())
            .await
            .expect("no snapshot pushed to dan after the expiry sweep")
            .expect("channel closed");
        match event {
            QueueEvent::Ticket(snap) => {
                assert_eq!(snap.ticket_id, d.ticket_id);
                assert_eq!(snap.position, Some(3));
            }
            other => panic!("expected ticket snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn near_alert_fires_only_at_the_trigger_rank() {
        let delivery = Arc::new(RecordingDelivery {
            sent: Mutex::new(Vec::new()),
        });
        let (engine, _dir) = setup_with_delivery(delivery.clone()).await;

        let a = engine.join(join_req("ana")).await.unwrap();
        let b = engine.join(join_req("bo")).await.unwrap();
        let c = engine.join(join_req("carla")).await.unwrap();
        for t in [&a, &b, &c] {
            subscriptions::save(engine.db(), SHOP, &t.ticket_id, "https://push/a", "{}")
                .await
                .unwrap();
        }

        engine.sweep_once().await;
        engine.sweep_once().await;

        // Only bo, at the trigger rank of 2, gets the heads-up; the head
        // of the queue and everyone further back stay quiet.
        let sent = delivery.sent.lock().unwrap();
        assert_eq!(sent.len(), 1, "alerts: {sent:?}");
        assert_eq!(sent[0].tag, format!("near-{}", b.ticket_id));
    }

    #[tokio::test]
    async fn sweep_with_no_waiting_shops_is_a_noop() {
        let (engine, _dir) = setup().await;
        engine.sweep_once().await;
    }

    #[tokio::test]
    async fn sweeper_task_stops_on_cancel() {
        let (engine, _dir) = setup().await;
        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(engine, 3600, cancel.clone());
        cancel.cancel();
        handle.await.unwrap();
    }
}
