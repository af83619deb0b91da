// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Web-push subscription handles, keyed by (ticket, endpoint) so one
//! customer on several devices gets one row per device.

use rusqlite::params;

use filaq_core::FilaqError;

use crate::database::{map_tr_err, Database};
use crate::models::PushSubscription;

/// Store or refresh a subscription handle for a ticket.
pub async fn save(
    db: &Database,
    shop_code: &str,
    ticket_id: &str,
    endpoint: &str,
    subscription_json: &str,
) -> Result<(), FilaqError> {
    let shop_code = shop_code.to_string();
    let ticket_id = ticket_id.to_string();
    let endpoint = endpoint.to_string();
    let subscription_json = subscription_json.to_string();
    let id = uuid::Uuid::new_v4().to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO push_subscriptions (id, shop_code, ticket_id, endpoint, subscription) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(ticket_id, endpoint) DO UPDATE SET \
                   subscription = excluded.subscription",
                params![id, shop_code, ticket_id, endpoint, subscription_json],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Remove one device's subscription for a ticket.
pub async fn remove(db: &Database, ticket_id: &str, endpoint: &str) -> Result<(), FilaqError> {
    let ticket_id = ticket_id.to_string();
    let endpoint = endpoint.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM push_subscriptions WHERE ticket_id = ?1 AND endpoint = ?2",
                params![ticket_id, endpoint],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// All stored subscriptions for a ticket.
pub async fn for_ticket(
    db: &Database,
    ticket_id: &str,
) -> Result<Vec<PushSubscription>, FilaqError> {
    let ticket_id = ticket_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, shop_code, ticket_id, endpoint, subscription \
                 FROM push_subscriptions WHERE ticket_id = ?1",
            )?;
            let subs = stmt
                .query_map(params![ticket_id], |row| {
                    Ok(PushSubscription {
                        id: row.get(0)?,
                        shop_code: row.get(1)?,
                        ticket_id: row.get(2)?,
                        endpoint: row.get(3)?,
                        subscription: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(subs)
        })
        .await
        .map_err(map_tr_err)
}
