// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The engine proper: typed operations over one shop-sharded queue.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use filaq_config::model::QueueConfig;
use filaq_core::{
    service_day, to_storage_timestamp, ChannelKind, FilaqError, PublicEntry, QueueEvent,
    ShopSettings, Ticket, TicketSnapshot, TicketStatus, WaitingEntry,
};
use filaq_fanout::FanoutHub;
use filaq_notify::Notifier;
use filaq_storage::queries::{services, settings, tickets};
use filaq_storage::{Database, JoinOutcome, NewTicket, Service, TransitionOutcome};

/// Input to [`QueueEngine::join`].
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub shop_code: String,
    pub customer_name: String,
    pub phone: Option<String>,
    pub service_label: Option<String>,
}

/// Shared engine handle. All state lives in the database, the hub, and
/// the notifier; the engine itself is cheap to clone behind an `Arc`.
pub struct QueueEngine {
    db: Database,
    cfg: QueueConfig,
    hub: Arc<FanoutHub>,
    notifier: Arc<Notifier>,
}

impl QueueEngine {
    pub fn new(
        db: Database,
        cfg: QueueConfig,
        hub: Arc<FanoutHub>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            db,
            cfg,
            hub,
            notifier,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn hub(&self) -> &Arc<FanoutHub> {
        &self.hub
    }

    pub fn config(&self) -> &QueueConfig {
        &self.cfg
    }

    // --- Operations ---

    /// Join the queue: assign the next ticket number atomically and return
    /// the customer's first position snapshot.
    ///
    /// A paused shop refuses before any write. A storage failure triggers
    /// one schema-repair pass and a single retry.
    pub async fn join(&self, req: JoinRequest) -> Result<TicketSnapshot, FilaqError> {
        let shop_settings = settings::get(&self.db, &req.shop_code).await?;
        if shop_settings.paused {
            return Err(FilaqError::QueuePaused {
                message: shop_settings.pause_message,
            });
        }

        let new = NewTicket {
            shop_code: req.shop_code.clone(),
            customer_name: req.customer_name,
            phone: req.phone,
            service_label: req.service_label,
        };
        let window = service_day(self.cfg.shift_start_hour);
        let outcome = match tickets::create_with_number(
            &self.db,
            new.clone(),
            window.clone(),
            self.cfg.daily_cap,
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(shop_code = %req.shop_code, error = %e, "join failed, attempting schema repair");
                self.db.repair_schema().await?;
                tickets::create_with_number(&self.db, new, window, self.cfg.daily_cap).await?
            }
        };

        let ticket_id = match outcome {
            JoinOutcome::Created {
                ticket_id,
                ticket_number,
            } => {
                info!(shop_code = %req.shop_code, ticket_number, "ticket created");
                ticket_id
            }
            JoinOutcome::Full => {
                return Err(FilaqError::QueueFull {
                    cap: self.cfg.daily_cap,
                })
            }
        };

        self.refresh_lists(&req.shop_code).await;
        self.ensure_grace(&req.shop_code).await;

        let ticket = tickets::get_ticket(&self.db, &ticket_id)
            .await?
            .ok_or_else(|| FilaqError::ticket_not_found(&ticket_id))?;
        self.build_snapshot(&ticket).await
    }

    /// Advance the queue: oldest waiting ticket becomes called.
    ///
    /// Returns `None` when nobody is waiting. Fires the (deduped) "called"
    /// alert and refreshes every affected channel.
    pub async fn call_next(&self, shop_code: &str) -> Result<Option<Ticket>, FilaqError> {
        let Some(ticket) = tickets::call_next(&self.db, shop_code).await? else {
            return Ok(None);
        };
        info!(shop_code, ticket_number = ticket.ticket_number, "ticket called");

        self.notifier.notify_called(&ticket).await;
        self.refresh_current(shop_code).await;
        self.refresh_lists(shop_code).await;
        self.refresh_tickets(shop_code).await;
        self.ensure_grace(shop_code).await;
        Ok(Some(ticket))
    }

    /// called -> served.
    pub async fn complete(&self, ticket_id: &str) -> Result<(), FilaqError> {
        match tickets::complete(&self.db, ticket_id).await? {
            TransitionOutcome::Applied { shop_code } => {
                self.notifier.mark_terminal(ticket_id);
                self.refresh_tickets(&shop_code).await;
                Ok(())
            }
            TransitionOutcome::WrongState(status) => Err(FilaqError::Conflict(format!(
                "cannot complete a {status} ticket"
            ))),
            TransitionOutcome::Missing => Err(FilaqError::ticket_not_found(ticket_id)),
        }
    }

    /// Staff cancel: waiting or called -> canceled.
    pub async fn cancel_admin(&self, ticket_id: &str) -> Result<(), FilaqError> {
        match tickets::cancel_admin(&self.db, ticket_id).await? {
            TransitionOutcome::Applied { shop_code } => {
                self.notifier.mark_terminal(ticket_id);
                self.refresh_lists(&shop_code).await;
                self.refresh_tickets(&shop_code).await;
                self.ensure_grace(&shop_code).await;
                Ok(())
            }
            TransitionOutcome::WrongState(status) => Err(FilaqError::Conflict(format!(
                "cannot cancel a {status} ticket"
            ))),
            TransitionOutcome::Missing => Err(FilaqError::ticket_not_found(ticket_id)),
        }
    }

    /// Customer self-cancel. Anything but a waiting ticket is a conflict,
    /// including an unknown id: the caller learns nothing about whether
    /// the id ever existed.
    pub async fn leave(&self, ticket_id: &str) -> Result<(), FilaqError> {
        match tickets::leave(&self.db, ticket_id).await? {
            TransitionOutcome::Applied { shop_code } => {
                self.notifier.mark_terminal(ticket_id);
                self.refresh_lists(&shop_code).await;
                self.refresh_tickets(&shop_code).await;
                self.ensure_grace(&shop_code).await;
                Ok(())
            }
            TransitionOutcome::WrongState(status) => Err(FilaqError::Conflict(format!(
                "cannot leave from state {status}"
            ))),
            TransitionOutcome::Missing => {
                Err(FilaqError::Conflict("ticket is not waiting".to_string()))
            }
        }
    }

    /// Record arrival (idempotent) and disarm any grace timer.
    pub async fn arrive(&self, ticket_id: &str) -> Result<TicketSnapshot, FilaqError> {
        let Some(ticket) = tickets::arrive(&self.db, ticket_id).await? else {
            return Err(FilaqError::ticket_not_found(ticket_id));
        };
        self.refresh_lists(&ticket.shop_code).await;
        self.refresh_tickets(&ticket.shop_code).await;
        self.build_snapshot(&ticket).await
    }

    /// Compute one ticket's live position snapshot.
    ///
    /// Reading a snapshot is also the moment the grace timer arms: a
    /// waiting, unarrived, never-armed ticket at exactly the trigger rank
    /// gets its deadline set here, so customers who watch their status
    /// are put on the clock the instant they are near the front.
    pub async fn position_snapshot(&self, ticket_id: &str) -> Result<TicketSnapshot, FilaqError> {
        let mut ticket = tickets::get_ticket(&self.db, ticket_id)
            .await?
            .ok_or_else(|| FilaqError::ticket_not_found(ticket_id))?;

        if ticket.status == TicketStatus::Waiting
            && ticket.arrived_at.is_none()
            && ticket.grace_expires_at.is_none()
        {
            let snapshot = self.build_snapshot(&ticket).await?;
            if snapshot.position == Some(self.cfg.grace_trigger_position) {
                let expires = self.grace_deadline();
                if tickets::arm_grace_for(&self.db, ticket_id, &expires).await? {
                    debug!(ticket_id, %expires, "grace timer armed via snapshot read");
                    ticket = tickets::get_ticket(&self.db, ticket_id)
                        .await?
                        .ok_or_else(|| FilaqError::ticket_not_found(ticket_id))?;
                }
            }
        }

        self.build_snapshot(&ticket).await
    }

    /// Pause or resume a shop, broadcasting the new settings.
    pub async fn set_pause(
        &self,
        shop_code: &str,
        paused: bool,
        message: Option<String>,
    ) -> Result<ShopSettings, FilaqError> {
        let stored = settings::set(&self.db, shop_code, paused, message).await?;
        info!(shop_code, paused, "pause state changed");
        self.hub.publish(
            shop_code,
            ChannelKind::Settings,
            &QueueEvent::Settings(stored.clone()),
        );
        Ok(stored)
    }

    pub async fn settings(&self, shop_code: &str) -> Result<ShopSettings, FilaqError> {
        settings::get(&self.db, shop_code).await
    }

    /// Highest number called or served in the current service day.
    pub async fn current_number(&self, shop_code: &str) -> Result<i64, FilaqError> {
        let window = service_day(self.cfg.shift_start_hour);
        tickets::current_number(&self.db, shop_code, &window).await
    }

    pub async fn waiting_entries(&self, shop_code: &str) -> Result<Vec<WaitingEntry>, FilaqError> {
        let list = tickets::waiting_list(&self.db, shop_code).await?;
        Ok(list.iter().map(waiting_entry).collect())
    }

    pub async fn public_entries(&self, shop_code: &str) -> Result<Vec<PublicEntry>, FilaqError> {
        tickets::public_list(&self.db, shop_code, self.cfg.public_list_limit).await
    }

    pub async fn active_services(&self, shop_code: &str) -> Result<Vec<Service>, FilaqError> {
        services::list_active(&self.db, shop_code).await
    }

    // --- Snapshot builders (also the SSE initial events) ---

    pub async fn snapshot_current(&self, shop_code: &str) -> Result<QueueEvent, FilaqError> {
        Ok(QueueEvent::Current {
            current_number: self.current_number(shop_code).await?,
        })
    }

    pub async fn snapshot_waiting(&self, shop_code: &str) -> Result<QueueEvent, FilaqError> {
        Ok(QueueEvent::WaitingList {
            entries: self.waiting_entries(shop_code).await?,
        })
    }

    pub async fn snapshot_public(&self, shop_code: &str) -> Result<QueueEvent, FilaqError> {
        Ok(QueueEvent::PublicList {
            entries: self.public_entries(shop_code).await?,
        })
    }

    pub async fn snapshot_settings(&self, shop_code: &str) -> Result<QueueEvent, FilaqError> {
        Ok(QueueEvent::Settings(self.settings(shop_code).await?))
    }

    pub async fn snapshot_ticket(&self, ticket_id: &str) -> Result<QueueEvent, FilaqError> {
        Ok(QueueEvent::Ticket(self.position_snapshot(ticket_id).await?))
    }

    // --- Internal ---

    pub(crate) async fn build_snapshot(
        &self,
        ticket: &Ticket,
    ) -> Result<TicketSnapshot, FilaqError> {
        let current_number = self.current_number(&ticket.shop_code).await?;
        let (position, ahead) = if ticket.status == TicketStatus::Waiting {
            let list = tickets::waiting_list(&self.db, &ticket.shop_code).await?;
            match list.iter().position(|t| t.id == ticket.id) {
                Some(i) => (Some(i as u32 + 1), i as u32),
                // Raced into a terminal state between the two reads.
                None => (None, 0),
            }
        } else {
            (None, 0)
        };

        let grace_seconds_left = if ticket.status == TicketStatus::Waiting {
            ticket
                .grace_expires_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|exp| {
                    (exp.with_timezone(&Utc) - Utc::now())
                        .num_seconds()
                        .max(0)
                })
        } else {
            None
        };

        Ok(TicketSnapshot {
            ticket_id: ticket.id.clone(),
            shop_code: ticket.shop_code.clone(),
            status: ticket.status,
            position,
            ahead,
            estimate_minutes: ahead * self.cfg.per_customer_minutes,
            ticket_number: ticket.ticket_number,
            ticket_date: ticket.ticket_date.clone(),
            current_number,
            grace_expires_at: ticket.grace_expires_at.clone(),
            grace_seconds_left,
        })
    }

    fn grace_deadline(&self) -> String {
        to_storage_timestamp(Utc::now() + Duration::minutes(i64::from(self.cfg.grace_minutes)))
    }

    /// Arm the grace timer on the ticket at the trigger rank, if eligible.
    pub(crate) async fn ensure_grace(&self, shop_code: &str) {
        let offset = self.cfg.grace_trigger_position - 1;
        let expires = self.grace_deadline();
        match tickets::arm_grace(&self.db, shop_code, offset, &expires).await {
            Ok(Some(ticket_id)) => {
                debug!(shop_code, ticket_id, %expires, "grace timer armed");
                self.refresh_one_ticket(shop_code, &ticket_id).await;
            }
            Ok(None) => {}
            Err(e) => warn!(shop_code, error = %e, "grace arming failed"),
        }
    }

    pub(crate) async fn refresh_current(&self, shop_code: &str) {
        if !self.hub.has_subscribers(shop_code, ChannelKind::CurrentNumber) {
            return;
        }
        match self.snapshot_current(shop_code).await {
            Ok(event) => self.hub.publish(shop_code, ChannelKind::CurrentNumber, &event),
            Err(e) => warn!(shop_code, error = %e, "current-number snapshot failed"),
        }
    }

    pub(crate) async fn refresh_lists(&self, shop_code: &str) {
        if self.hub.has_subscribers(shop_code, ChannelKind::WaitingList) {
            match self.snapshot_waiting(shop_code).await {
                Ok(event) => self.hub.publish(shop_code, ChannelKind::WaitingList, &event),
                Err(e) => warn!(shop_code, error = %e, "waiting-list snapshot failed"),
            }
        }
        if self.hub.has_subscribers(shop_code, ChannelKind::PublicList) {
            match self.snapshot_public(shop_code).await {
                Ok(event) => self.hub.publish(shop_code, ChannelKind::PublicList, &event),
                Err(e) => warn!(shop_code, error = %e, "public-list snapshot failed"),
            }
        }
    }

    /// Push a fresh snapshot to every subscribed ticket of the shop.
    pub(crate) async fn refresh_tickets(&self, shop_code: &str) {
        for ticket_id in self.hub.subscribed_ticket_ids(shop_code) {
            self.refresh_one_ticket(shop_code, &ticket_id).await;
        }
    }

    pub(crate) async fn refresh_one_ticket(&self, shop_code: &str, ticket_id: &str) {
        match self.snapshot_ticket(ticket_id).await {
            Ok(event) => self.hub.publish_ticket(shop_code, ticket_id, &event),
            Err(e) => warn!(shop_code, ticket_id, error = %e, "ticket snapshot failed"),
        }
    }

    pub(crate) fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }
}

fn waiting_entry(ticket: &Ticket) -> WaitingEntry {
    WaitingEntry {
        id: ticket.id.clone(),
        customer_name: ticket.customer_name.clone(),
        service_label: ticket.service_label.clone(),
        created_at: ticket.created_at.clone(),
        ticket_number: ticket.ticket_number,
        arrived: ticket.arrived_at.is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filaq_notify::LogDelivery;
    use filaq_storage::queries::counters;
    use tempfile::tempdir;

    const SHOP: &str = "fade-factory";

    async fn setup() -> (QueueEngine, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        let hub = Arc::new(FanoutHub::new());
        let notifier = Arc::new(Notifier::new(db.clone(), Arc::new(LogDelivery)));
        let engine = QueueEngine::new(db, QueueConfig::default(), hub, notifier);
        (engine, dir)
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
    async fn join_sequence_and_positions() {
        let (engine, _dir) = setup().await;
        let a = engine.join(join_req("ana")).await.unwrap();
        let b = engine.join(join_req("bo")).await.unwrap();
        let c = engine.join(join_req("carla")).await.unwrap();

        assert_eq!(a.ticket_number, 1);
        assert_eq!(b.ticket_number, 2);
        assert_eq!(c.ticket_number, 3);
        assert_eq!(c.position, Some(3));
        assert_eq!(c.ahead, 2);
        assert_eq!(c.estimate_minutes, 30);
        assert_eq!(c.current_number, 0);
    }

    #[tokio::test]
    async fn call_next_advances_everyone() {
        let (engine, _dir) = setup().await;
        let a = engine.join(join_req("ana")).await.unwrap();
        let b = engine.join(join_req("bo")).await.unwrap();

        let called = engine.call_next(SHOP).await.unwrap().unwrap();
        assert_eq!(called.id, a.ticket_id);
        assert_eq!(called.status, TicketStatus::Called);

        // A is no longer positioned; B moved to the front.
        let a_snap = engine.position_snapshot(&a.ticket_id).await.unwrap();
        assert_eq!(a_snap.position, None);
        assert_eq!(a_snap.ahead, 0);
        assert_eq!(a_snap.current_number, 1);

        let b_snap = engine.position_snapshot(&b.ticket_id).await.unwrap();
        assert_eq!(b_snap.position, Some(1));
        assert_eq!(b_snap.estimate_minutes, 0);
    }

    #[tokio::test]
    async fn call_next_on_empty_queue() {
        let (engine, _dir) = setup().await;
        assert!(engine.call_next(SHOP).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn paused_shop_refuses_joins() {
        let (engine, _dir) = setup().await;
        engine
            .set_pause(SHOP, true, Some("lunch".to_string()))
            .await
            .unwrap();

        let err = engine.join(join_req("ana")).await.unwrap_err();
        assert!(
            matches!(err, FilaqError::QueuePaused { message: Some(ref m) } if m == "lunch"),
            "got {err:?}"
        );

        engine.set_pause(SHOP, false, None).await.unwrap();
        assert!(engine.join(join_req("ana")).await.is_ok());
    }

    #[tokio::test]
    async fn full_queue_reports_cap() {
        let (engine, _dir) = setup().await;
        let mut cfg = QueueConfig::default();
        cfg.daily_cap = 2;
        let engine = QueueEngine::new(
            engine.db.clone(),
            cfg,
            engine.hub.clone(),
            engine.notifier.clone(),
        );

        engine.join(join_req("ana")).await.unwrap();
        engine.join(join_req("bo")).await.unwrap();
        let err = engine.join(join_req("carla")).await.unwrap_err();
        assert!(matches!(err, FilaqError::QueueFull { cap: 2 }), "got {err:?}");
    }

    #[tokio::test]
    async fn counter_loss_does_not_reissue_numbers() {
        let (engine, _dir) = setup().await;
        engine.join(join_req("ana")).await.unwrap();
        engine.join(join_req("bo")).await.unwrap();

        let window = service_day(engine.cfg.shift_start_hour);
        counters::delete_for_day(engine.db(), SHOP, &window.date)
            .await
            .unwrap();

        let c = engine.join(join_req("carla")).await.unwrap();
        assert_eq!(c.ticket_number, 3);
    }

    #[tokio::test]
    async fn complete_and_cancel_enforce_the_state_machine() {
        let (engine, _dir) = setup().await;
        let a = engine.join(join_req("ana")).await.unwrap();

        // Waiting ticket cannot complete.
        let err = engine.complete(&a.ticket_id).await.unwrap_err();
        assert!(matches!(err, FilaqError::Conflict(_)));

        engine.call_next(SHOP).await.unwrap().unwrap();
        engine.complete(&a.ticket_id).await.unwrap();

        // Served is terminal for both verbs.
        assert!(matches!(
            engine.complete(&a.ticket_id).await.unwrap_err(),
            FilaqError::Conflict(_)
        ));
        assert!(matches!(
            engine.cancel_admin(&a.ticket_id).await.unwrap_err(),
            FilaqError::Conflict(_)
        ));

        // Unknown ids differ: staff verbs say NotFound.
        assert!(matches!(
            engine.complete("no-such-id").await.unwrap_err(),
            FilaqError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn leave_conflicts_hide_existence() {
        let (engine, _dir) = setup().await;
        let a = engine.join(join_req("ana")).await.unwrap();
        engine.call_next(SHOP).await.unwrap().unwrap();

        // Called ticket and unknown id produce the same error kind.
        assert!(matches!(
            engine.leave(&a.ticket_id).await.unwrap_err(),
            FilaqError::Conflict(_)
        ));
        assert!(matches!(
            engine.leave("no-such-id").await.unwrap_err(),
            FilaqError::Conflict(_)
        ));

        let b = engine.join(join_req("bo")).await.unwrap();
        engine.leave(&b.ticket_id).await.unwrap();
        let snap = engine.position_snapshot(&b.ticket_id).await.unwrap();
        assert_eq!(snap.status, TicketStatus::Canceled);
    }

    #[tokio::test]
    async fn grace_arms_at_trigger_rank_and_arrival_disarms() {
        let (engine, _dir) = setup().await;
        let a = engine.join(join_req("ana")).await.unwrap();
        assert!(a.grace_expires_at.is_none(), "rank 1 of 1 must not arm");

        // Second join puts bo at the trigger rank (2); join runs the
        // arming pass.
        let b = engine.join(join_req("bo")).await.unwrap();
        let b_snap = engine.position_snapshot(&b.ticket_id).await.unwrap();
        assert_eq!(b_snap.position, Some(2));
        assert!(b_snap.grace_expires_at.is_some());
        let left = b_snap.grace_seconds_left.unwrap();
        assert!(left > 0 && left <= 600, "10 minute window, got {left}");

        // Arrival disarms and sticks.
        let after = engine.arrive(&b.ticket_id).await.unwrap();
        assert!(after.grace_expires_at.is_none());
        let again = engine.position_snapshot(&b.ticket_id).await.unwrap();
        assert!(again.grace_expires_at.is_none(), "arrived ticket never re-arms");
    }

    #[tokio::test]
    async fn snapshot_read_arms_grace_opportunistically() {
        let (engine, _dir) = setup().await;
        engine.join(join_req("ana")).await.unwrap();
        let b = engine.join(join_req("bo")).await.unwrap();

        // Wipe the join-time arming to isolate the read path.
        engine
            .db()
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute("UPDATE tickets SET grace_expires_at = NULL", [])?;
                Ok(())
            })
            .await
            .unwrap();

        let snap = engine.position_snapshot(&b.ticket_id).await.unwrap();
        assert!(snap.grace_expires_at.is_some());
    }

    #[tokio::test]
    async fn join_publishes_list_snapshots() {
        let (engine, _dir) = setup().await;
        let mut sub = engine.hub().subscribe(SHOP, ChannelKind::WaitingList);

        engine.join(join_req("ana")).await.unwrap();
        let event = sub.rx.recv().await.unwrap();
        match event {
            QueueEvent::WaitingList { entries } => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].customer_name, "ana");
                assert!(!entries[0].arrived);
            }
            other => panic!("expected waiting list snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ticket_subscribers_get_updates_on_call_next() {
        let (engine, _dir) = setup().await;
        let a = engine.join(join_req("ana")).await.unwrap();
        let mut sub = engine.hub().subscribe_ticket(SHOP, &a.ticket_id);

        engine.call_next(SHOP).await.unwrap().unwrap();
        let event = sub.rx.recv().await.unwrap();
        match event {
            QueueEvent::Ticket(snap) => {
                assert_eq!(snap.status, TicketStatus::Called);
                assert_eq!(snap.position, None);
            }
            other => panic!("expected ticket snapshot, got {other:?}"),
        }
    }
}
