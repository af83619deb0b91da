// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-shop settings (pause state).

use rusqlite::{params, OptionalExtension};

use filaq_core::{FilaqError, ShopSettings};

use crate::database::{map_tr_err, Database};

/// Read the shop's settings. A shop with no stored row is unpaused.
pub async fn get(db: &Database, shop_code: &str) -> Result<ShopSettings, FilaqError> {
    let shop_code = shop_code.to_string();
    db.connection()
        .call(move |conn| {
            let settings = conn
                .query_row(
                    "SELECT paused, pause_message FROM shop_settings WHERE shop_code = ?1",
                    params![shop_code],
                    |row| {
                        Ok(ShopSettings {
                            paused: row.get::<_, i64>(0)? != 0,
                            pause_message: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(settings.unwrap_or_default())
        })
        .await
        .map_err(map_tr_err)
}

/// Upsert the shop's pause state and return the stored value.
pub async fn set(
    db: &Database,
    shop_code: &str,
    paused: bool,
    pause_message: Option<String>,
) -> Result<ShopSettings, FilaqError> {
    let shop_code = shop_code.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO shop_settings (shop_code, paused, pause_message) \
                 VALUES (?1, ?2, ?3) \
                 ON CONFLICT(shop_code) DO UPDATE SET \
                   paused = excluded.paused, \
                   pause_message = excluded.pause_message, \
                   updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![shop_code, paused as i64, pause_message],
            )?;
            Ok(ShopSettings {
                paused,
                pause_message,
            })
        })
        .await
        .map_err(map_tr_err)
}
